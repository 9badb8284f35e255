//! 実行時設定。コマンドライン引数は取らず、環境変数と端末状態から決める。
//!
//! | 項目 | 由来 |
//! |------|------|
//! | `interactive` | stdin が端末なら `true`（プロンプトを表示する） |
//! | `color` | 対話モードかつ `NO_COLOR` 未設定なら `true` |
//!
//! ログレベルは `RUST_LOG`、`cd` の移動先既定値は実行時の `HOME` を使う。

use std::env;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub interactive: bool,
    pub color: bool,
}

impl Config {
    pub fn from_env() -> Self {
        let interactive = unsafe { libc::isatty(libc::STDIN_FILENO) } == 1;
        Self::resolve(interactive, env::var_os("NO_COLOR").is_some())
    }

    fn resolve(interactive: bool, no_color: bool) -> Self {
        Self {
            interactive,
            color: interactive && !no_color,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_requires_terminal() {
        assert_eq!(
            Config::resolve(false, false),
            Config { interactive: false, color: false },
        );
        assert_eq!(
            Config::resolve(true, false),
            Config { interactive: true, color: true },
        );
    }

    #[test]
    fn no_color_disables_color() {
        assert!(!Config::resolve(true, true).color);
    }
}
