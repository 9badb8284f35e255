//! インタプリタの状態を保持するモジュール。
//!
//! 終了ステータスは executor 内では戻り値として受け渡し、文の実行後にだけ
//! [`Shell::last_status`] へ書き込む。SIGCHLD ハンドラはこの構造体に触れない。

use libc::pid_t;
use tracing::warn;

use crate::config::Config;
use crate::reaper;

/// シェルの実行状態。REPL ループ全体で共有される。
pub struct Shell {
    /// 直前に実行した文の終了ステータス。
    pub last_status: i32,
    pub config: Config,
    /// 登録テーブルが満杯で reaper に渡せなかったバックグラウンド PID。
    pending: Vec<pid_t>,
}

impl Shell {
    pub fn new(config: Config) -> Self {
        Self {
            last_status: 0,
            config,
            pending: Vec::new(),
        }
    }

    /// バックグラウンドで起動した PID を reaper に登録する。
    ///
    /// 呼び出し側は SIGCHLD をブロックした状態で呼ぶこと。
    pub fn adopt_background(&mut self, pids: &[pid_t]) {
        for &pid in pids {
            if !reaper::adopt(pid) {
                warn!(pid, "reaper table full, deferring registration");
                self.pending.push(pid);
            }
        }
    }

    /// プロンプト表示前に呼ぶ。保留中の PID の登録を再試行し、終了済みを回収する。
    pub fn settle_background(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let _block = reaper::SigchldBlock::new();
        self.pending.retain(|&pid| !reaper::adopt(pid));
        // 登録前に終了していた分はシグナルが過ぎているのでここで回収する
        reaper::drain();
    }

    /// 登録待ちの PID 数。
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}
