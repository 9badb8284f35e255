//! バックグラウンドプロセスの回収（reap）とフォアグラウンド待機ヘルパー。
//!
//! SIGCHLD ハンドラ（[`install`]）がシグナル到着のたびに、登録済みの
//! バックグラウンド PID のうち終了済みのものを非ブロッキングで回収する。
//! 登録は [`adopt`] で行う。登録テーブルは `AtomicI32` の固定長配列で、
//! ハンドラ内ではロックもメモリ確保も行わない（async-signal-safe）。
//!
//! ハンドラは未登録の PID を決して `waitpid` しないので、executor が
//! [`wait_for`] で特定の子を待つ処理と衝突しない。[`wait_for`] は
//! シグナル割り込み（`EINTR`）を受けても対象を観測するまで再試行する。
//!
//! spawn から [`adopt`] までの間に子が終了すると SIGCHLD を取りこぼすため、
//! その区間は [`SigchldBlock`] で SIGCHLD をブロックする。保留されたシグナルは
//! ガードの drop 時に配送され、その時点では PID は登録済みになっている。

use std::io;
use std::ptr;
use std::sync::atomic::{AtomicI32, Ordering};

use libc::pid_t;

/// 同時に追跡できるバックグラウンドプロセス数。
pub const SLOT_COUNT: usize = 256;

#[allow(clippy::declare_interior_mutable_const)]
const EMPTY_SLOT: AtomicI32 = AtomicI32::new(0);

/// 登録済みバックグラウンド PID。0 は空きスロット。
static SLOTS: [AtomicI32; SLOT_COUNT] = [EMPTY_SLOT; SLOT_COUNT];

// ── ハンドラ ─────────────────────────────────────────────────────────

/// SIGCHLD ハンドラを `SA_RESTART | SA_NOCLDSTOP` で登録する。複数回呼んでも害はない。
pub fn install() -> io::Result<()> {
    unsafe {
        let mut sa: libc::sigaction = std::mem::zeroed();
        sa.sa_sigaction = on_sigchld as extern "C" fn(libc::c_int) as libc::sighandler_t;
        libc::sigemptyset(&mut sa.sa_mask);
        sa.sa_flags = libc::SA_RESTART | libc::SA_NOCLDSTOP;
        if libc::sigaction(libc::SIGCHLD, &sa, ptr::null_mut()) != 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

extern "C" fn on_sigchld(_sig: libc::c_int) {
    // 割り込まれた側の errno を壊さない
    let saved = unsafe { *errno_location() };
    drain();
    unsafe { *errno_location() = saved };
}

#[cfg(any(target_os = "linux", target_os = "android"))]
unsafe fn errno_location() -> *mut libc::c_int {
    libc::__errno_location()
}

#[cfg(any(target_os = "macos", target_os = "ios", target_os = "freebsd"))]
unsafe fn errno_location() -> *mut libc::c_int {
    libc::__error()
}

// ── 登録と回収 ───────────────────────────────────────────────────────

/// バックグラウンド PID を登録する。空きスロットがなければ `false`。
pub fn adopt(pid: pid_t) -> bool {
    SLOTS.iter().any(|slot| {
        slot.compare_exchange(0, pid, Ordering::AcqRel, Ordering::Relaxed)
            .is_ok()
    })
}

/// 登録済み PID のうち終了済みのものを非ブロッキングで回収し、回収数を返す。
///
/// 終了ステータスは捨てる。シグナルハンドラからも呼ばれるため、
/// ここではメモリ確保・ロック・ログ出力をしない。
pub fn drain() -> usize {
    let mut reaped = 0;
    for slot in SLOTS.iter() {
        let pid = slot.load(Ordering::Acquire);
        if pid <= 0 {
            continue;
        }
        let ret = unsafe { libc::waitpid(pid, ptr::null_mut(), libc::WNOHANG) };
        // ECHILD: 別経路で回収済み
        let gone = ret == pid || (ret == -1 && unsafe { *errno_location() } == libc::ECHILD);
        if gone
            && slot
                .compare_exchange(pid, 0, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
        {
            reaped += 1;
        }
    }
    reaped
}

/// 現在登録されている PID 数。
pub fn tracked() -> usize {
    SLOTS
        .iter()
        .filter(|slot| slot.load(Ordering::Acquire) > 0)
        .count()
}

// ── SIGCHLD ブロック ─────────────────────────────────────────────────

/// 生存中は呼び出しスレッドの SIGCHLD をブロックする RAII ガード。
///
/// [`previous`](Self::previous) はブロック前のシグナルマスク。
/// 子プロセスはこのマスクを復元してから exec する。
pub struct SigchldBlock {
    previous: libc::sigset_t,
}

impl SigchldBlock {
    pub fn new() -> Self {
        unsafe {
            let mut set: libc::sigset_t = std::mem::zeroed();
            let mut previous: libc::sigset_t = std::mem::zeroed();
            libc::sigemptyset(&mut set);
            libc::sigaddset(&mut set, libc::SIGCHLD);
            libc::pthread_sigmask(libc::SIG_BLOCK, &set, &mut previous);
            Self { previous }
        }
    }

    pub fn previous(&self) -> &libc::sigset_t {
        &self.previous
    }
}

impl Default for SigchldBlock {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SigchldBlock {
    fn drop(&mut self) {
        unsafe {
            libc::pthread_sigmask(libc::SIG_SETMASK, &self.previous, ptr::null_mut());
        }
    }
}

// ── フォアグラウンド待機 ─────────────────────────────────────────────

/// 特定の子プロセスの終了をブロッキングで待ち、`waitpid` の raw status を返す。
///
/// SIGCHLD ハンドラによる割り込み（`EINTR`）は透過的に再試行する。
pub fn wait_for(pid: pid_t) -> io::Result<i32> {
    loop {
        let mut raw_status: i32 = 0;
        let ret = unsafe { libc::waitpid(pid, &mut raw_status, 0) };
        if ret == pid {
            return Ok(raw_status);
        }
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::Interrupted {
            continue;
        }
        return Err(err);
    }
}

/// raw status を終了コードに変換する。正常終了ならそのコード、シグナル終了などは 1。
pub fn exit_code(raw_status: i32) -> i32 {
    if libc::WIFEXITED(raw_status) {
        libc::WEXITSTATUS(raw_status)
    } else {
        1
    }
}
