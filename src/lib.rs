//! sluice ライブラリ — テスト・ベンチマーク用にモジュールを公開する。
//!
//! バイナリ本体は `main.rs` の REPL ループ。
//! この `lib.rs` は `benches/bench_main.rs` や `tests/` から
//! パーサー・ビルトイン・executor に直接アクセスするために存在する。
//!
//! ## モジュール構成
//!
//! | モジュール | 役割 |
//! |-----------|------|
//! | [`parser`] | トークナイザ（`;` / `&&` / `\|\|` / `\|` / 空白の逐次分割、上限付き）とコマンドリスト |
//! | [`executor`] | コマンド実行（接続子による条件付き実行、パイプライン接続、バックグラウンド起動） |
//! | [`builtins`] | ビルトイン（`cd`, `pwd`） |
//! | [`spawn`] | `posix_spawnp` ラッパーとパイプライン段の `fork` / `execvp` |
//! | [`reaper`] | SIGCHLD によるバックグラウンドプロセス回収、フォアグラウンド待機 |
//! | [`shell`] | シェルの状態（終了ステータス、設定、登録待ち PID） |
//! | [`config`] | 環境変数と端末状態から決まる実行時設定 |
//! | [`prompt`] | プロンプト表示 |
//! | [`error`] | 実行時エラー型 |

pub mod builtins;
pub mod config;
pub mod error;
pub mod executor;
pub mod parser;
pub mod prompt;
pub mod reaper;
pub mod shell;
pub mod spawn;
