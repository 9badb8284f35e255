//! ビルトインコマンドの実装。
//!
//! ビルトインはプロセス内で直接実行される（パイプライン中では fork 後の子プロセス内）。
//! `try_exec()` が `Some(status)` を返せばビルトインとして処理済み、
//! `None` なら外部コマンドとして executor に委ねる。
//!
//! 出力先は呼び出し側が渡す。fork 後の子では std の stdout/stderr を使わない。

use std::env;
use std::io::Write;
use std::path::Path;

/// ビルトインコマンドの実行を試みる。
///
/// 通常出力は `out`、エラーメッセージは `err` に書く。
///
/// 戻り値:
/// - `Some(status)` — ビルトインとして実行済み
/// - `None` — 該当するビルトインなし（外部コマンドとして実行すべき）。`args` が空の場合も `None`。
pub fn try_exec(args: &[&str], out: &mut dyn Write, err: &mut dyn Write) -> Option<i32> {
    match *args.first()? {
        "cd" => Some(builtin_cd(args, err)),
        "pwd" => Some(builtin_pwd(out, err)),
        _ => None,
    }
}

/// `cd [dir]` — カレントディレクトリを変更する。引数省略時は `$HOME` に移動。
fn builtin_cd(args: &[&str], err: &mut dyn Write) -> i32 {
    let target = match args.get(1) {
        Some(dir) => dir.to_string(),
        None => match env::var("HOME") {
            Ok(home) => home,
            Err(_) => {
                let _ = writeln!(err, "sluice: cd: HOME not set");
                return 1;
            }
        },
    };

    if let Err(e) = env::set_current_dir(Path::new(&target)) {
        let _ = writeln!(err, "sluice: cd: {}: {}", target, e);
        1
    } else {
        0
    }
}

/// `pwd` — カレントディレクトリの絶対パスを出力する。引数は無視する。
fn builtin_pwd(out: &mut dyn Write, err: &mut dyn Write) -> i32 {
    let cwd = match env::current_dir() {
        Ok(p) => p,
        Err(e) => {
            let _ = writeln!(err, "sluice: pwd: {}", e);
            return 1;
        }
    };
    if let Err(e) = writeln!(out, "{}", cwd.display()).and_then(|_| out.flush()) {
        let _ = writeln!(err, "sluice: pwd: {}", e);
        return 1;
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `try_exec` を呼び、(ステータス, stdout, stderr) を返す。
    fn exec(args: &[&str]) -> (Option<i32>, String, String) {
        let mut out = Vec::new();
        let mut err = Vec::new();
        let status = try_exec(args, &mut out, &mut err);
        (
            status,
            String::from_utf8(out).unwrap(),
            String::from_utf8(err).unwrap(),
        )
    }

    #[test]
    fn unknown_command_is_not_builtin() {
        assert_eq!(exec(&["ls", "-l"]), (None, String::new(), String::new()));
        assert_eq!(exec(&[]), (None, String::new(), String::new()));
    }

    #[test]
    fn exact_match_on_first_token() {
        assert_eq!(exec(&["PWD"]).0, None);
        assert_eq!(exec(&["cd2"]).0, None);
        assert_eq!(exec(&["echo", "pwd"]).0, None);
    }

    #[test]
    fn pwd_prints_current_dir() {
        let (status, out, err) = exec(&["pwd"]);
        assert_eq!(status, Some(0));
        assert_eq!(out, format!("{}\n", env::current_dir().unwrap().display()));
        assert!(err.is_empty());
    }

    #[test]
    fn pwd_ignores_arguments() {
        let (status, out, _) = exec(&["pwd", "-P", "extra"]);
        assert_eq!(status, Some(0));
        assert_eq!(out.lines().count(), 1);
    }

    #[test]
    fn cd_to_missing_dir_fails_without_moving() {
        let before = env::current_dir().unwrap();
        let (status, out, err) = exec(&["cd", "/nonexistent/sluice/path"]);
        assert_eq!(status, Some(1));
        assert_eq!(env::current_dir().unwrap(), before);
        assert!(out.is_empty());
        assert!(err.starts_with("sluice: cd: /nonexistent/sluice/path: "));
    }
}
