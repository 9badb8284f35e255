//! プロンプト表示。カレントディレクトリを表示し、色付きなら太字の青にする。

use std::env;
use std::io::{self, Write};

use crate::config::Config;

/// プロンプト文字列を組み立てる。カレントディレクトリが取れなければ `$ `。
pub fn render(config: &Config) -> String {
    match env::current_dir() {
        Ok(cwd) if config.color => format!("\x1b[1;34m{}\x1b[0m$ ", cwd.display()),
        Ok(cwd) => format!("{}$ ", cwd.display()),
        Err(_) => "$ ".to_string(),
    }
}

pub fn display(config: &Config) {
    let mut stdout = io::stdout();
    let _ = write!(stdout, "{}", render(config));
    let _ = stdout.flush();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_prompt_shows_cwd() {
        let config = Config::default();
        let cwd = env::current_dir().unwrap();
        assert_eq!(render(&config), format!("{}$ ", cwd.display()));
    }

    #[test]
    fn colored_prompt_wraps_cwd() {
        let config = Config { interactive: true, color: true };
        let prompt = render(&config);
        assert!(prompt.starts_with("\x1b[1;34m"));
        assert!(prompt.ends_with("\x1b[0m$ "));
    }
}
