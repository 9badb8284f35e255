//! sluice — 演算子チェーンとパイプラインを扱う小さな対話シェル
//!
//! REPL ループ: 回収の後始末 → プロンプト表示 → stdin から 1 行読み取り → 分割 → 実行 → ループ
//!
//! `exit` の行または EOF で終了コード 0 で終わる。文の失敗でループが止まることはない。
//!
//! 入力は UTF-8 として扱う。UTF-8 でない行は実行せず、行番号を添えて stderr に報告し、
//! 次の行へ進む（引数はバイト列のままでは渡さない）。

use std::io::{self, BufRead};
use std::process::ExitCode;

use tracing::{debug, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sluice::config::Config;
use sluice::shell::Shell;
use sluice::{executor, prompt, reaper};

fn main() -> ExitCode {
    // RUST_LOG でログレベルを指定する。未指定ならエラーのみ。
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    if let Err(e) = reaper::install() {
        eprintln!("sluice: sigaction: {}", e);
    }

    let mut shell = Shell::new(Config::from_env());
    debug!(config = ?shell.config, "starting");

    let stdin = io::stdin();
    let mut raw = Vec::new();
    let mut line_no: u64 = 0;

    loop {
        shell.settle_background();

        if shell.config.interactive {
            prompt::display(&shell.config);
        }

        raw.clear();
        match stdin.lock().read_until(b'\n', &mut raw) {
            Ok(0) => {
                // EOF (Ctrl+D)
                if shell.config.interactive {
                    println!();
                }
                break;
            }
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!(error = %e, "stdin read failed");
                break;
            }
        }
        line_no += 1;

        let line = match std::str::from_utf8(&raw) {
            Ok(line) => line,
            Err(e) => {
                eprintln!(
                    "sluice: line {}: input is not valid UTF-8 (byte {}), skipped",
                    line_no,
                    e.valid_up_to()
                );
                continue;
            }
        };

        let input = line.strip_suffix('\n').unwrap_or(line);
        let trimmed = input.trim();
        if trimmed == "exit" {
            break;
        }
        if trimmed.is_empty() {
            continue;
        }

        let status = executor::execute_line(&mut shell, input);
        debug!(status, "line done");
    }

    ExitCode::SUCCESS
}
