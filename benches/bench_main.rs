//! sluice ベンチマーク: トークナイザ、ビルトイン、spawn、パイプライン実行の計測。
//!
//! `std::time::Instant` による手動計測（外部クレート不要）。
//!
//! 実行: `cargo bench`

use std::time::{Duration, Instant};

// ── ベンチマークインフラ ──────────────────────────────────────────

struct BenchResult {
    category: &'static str,
    name: &'static str,
    avg: Duration,
    iters: u64,
}

impl BenchResult {
    fn print(&self) {
        let avg_us = self.avg.as_nanos() as f64 / 1000.0;
        println!(
            "[{:<8}] {:<40}: avg {:>10.2}µs  ({} iters)",
            self.category, self.name, avg_us, self.iters,
        );
    }
}

fn bench<F: FnMut()>(category: &'static str, name: &'static str, iters: u64, mut f: F) -> BenchResult {
    // ウォームアップ
    for _ in 0..iters.min(100) {
        f();
    }

    let start = Instant::now();
    for _ in 0..iters {
        f();
    }
    let elapsed = start.elapsed();

    BenchResult {
        category,
        name,
        avg: elapsed / iters as u32,
        iters,
    }
}

// ── メイン ────────────────────────────────────────────────────────

fn main() {
    println!("sluice benchmark suite");
    println!("{}", "=".repeat(80));

    let mut results = Vec::new();

    // ── パーサーベンチマーク ──
    println!("\n--- Parser ---");

    results.push(bench("parser", "echo hello", 10_000, || {
        let _ = sluice::parser::parse("echo hello");
    }));

    results.push(bench("parser", "ls | grep Cargo | head -1", 10_000, || {
        let _ = sluice::parser::parse("ls | grep Cargo | head -1");
    }));

    results.push(bench("parser", "sleep 1 &", 10_000, || {
        let _ = sluice::parser::parse("sleep 1 &");
    }));

    results.push(bench("parser", "echo hello && echo world", 10_000, || {
        let _ = sluice::parser::parse("echo hello && echo world");
    }));

    results.push(bench("parser", "a || b ; c && d | e", 10_000, || {
        let _ = sluice::parser::parse("a || b ; c && d | e");
    }));

    for r in &results {
        r.print();
    }
    results.clear();

    // ── ビルトインベンチマーク ──
    println!("\n--- Builtins ---");

    results.push(bench("builtin", "pwd", 10_000, || {
        let mut buf = Vec::new();
        let mut err = Vec::new();
        sluice::builtins::try_exec(&["pwd"], &mut buf, &mut err);
    }));

    for r in &results {
        r.print();
    }
    results.clear();

    // ── spawn ベンチマーク ──
    println!("\n--- Spawn (posix_spawnp) ---");

    results.push(bench("spawn", "/bin/true (posix_spawnp)", 1_000, || {
        let block = sluice::reaper::SigchldBlock::new();
        if let Ok(pid) = sluice::spawn::spawn(&["/bin/true"], block.previous()) {
            drop(block);
            let _ = sluice::reaper::wait_for(pid);
        }
    }));

    for r in &results {
        r.print();
    }
    results.clear();

    // ── フル実行 (parse → execute) ──
    println!("\n--- Full (parse + spawn + wait) ---");

    let mut shell = sluice::shell::Shell::new(sluice::config::Config::default());

    results.push(bench("full", "/bin/true && /bin/true", 1_000, || {
        sluice::executor::execute_line(&mut shell, "/bin/true && /bin/true");
    }));

    results.push(bench("full", "/bin/true | /bin/true", 1_000, || {
        sluice::executor::execute_line(&mut shell, "/bin/true | /bin/true");
    }));

    for r in &results {
        r.print();
    }

    println!("\n{}", "=".repeat(80));
    println!("done.");
}
