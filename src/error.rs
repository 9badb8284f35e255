//! 実行時エラー型。
//!
//! どのエラーもインタプリタを止めない。executor は [`ExecError::exit_status`] で
//! 終了ステータスに変換し、メッセージを stderr に出して次の文へ進む。

use std::io;

use thiserror::Error;

/// プロセス生成・パイプ作成・待機の失敗。
#[derive(Debug, Error)]
pub enum ExecError {
    /// PATH 検索でコマンドが見つからない。
    #[error("{command}: command not found")]
    NotFound { command: String },
    /// 実行権限がない。
    #[error("{command}: permission denied")]
    PermissionDenied { command: String },
    /// その他の起動失敗。
    #[error("{command}: {source}")]
    Spawn { command: String, source: io::Error },
    /// 引数に NUL バイトが含まれ、C 文字列に変換できない。
    #[error("{command}: argument contains a NUL byte")]
    NulByte { command: String },
    #[error("pipe: {0}")]
    Pipe(#[source] io::Error),
    #[error("fork: {0}")]
    Fork(#[source] io::Error),
    #[error("wait: {0}")]
    Wait(#[source] io::Error),
}

impl ExecError {
    /// `posix_spawnp` / `execvp` の errno からエラーを作る。
    pub fn from_errno(errno: i32, command: &str) -> Self {
        let command = command.to_string();
        match errno {
            libc::ENOENT => Self::NotFound { command },
            libc::EACCES => Self::PermissionDenied { command },
            _ => Self::Spawn {
                command,
                source: io::Error::from_raw_os_error(errno),
            },
        }
    }

    /// エラーに対応する終了ステータスを返す。
    /// 127 = command not found, 126 = permission denied, 1 = その他。
    pub fn exit_status(&self) -> i32 {
        match self {
            Self::NotFound { .. } => 127,
            Self::PermissionDenied { .. } => 126,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errno_mapping() {
        let e = ExecError::from_errno(libc::ENOENT, "nosuch");
        assert_eq!(e.exit_status(), 127);
        assert_eq!(e.to_string(), "nosuch: command not found");

        let e = ExecError::from_errno(libc::EACCES, "/etc/passwd");
        assert_eq!(e.exit_status(), 126);
        assert_eq!(e.to_string(), "/etc/passwd: permission denied");

        let e = ExecError::from_errno(libc::E2BIG, "ls");
        assert_eq!(e.exit_status(), 1);
        assert!(e.to_string().starts_with("ls: "));
    }

    #[test]
    fn resource_errors_are_status_one() {
        let e = ExecError::Pipe(io::Error::from_raw_os_error(libc::EMFILE));
        assert_eq!(e.exit_status(), 1);
        assert!(e.to_string().starts_with("pipe: "));
    }
}
