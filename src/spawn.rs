//! 子プロセス起動のラッパー。
//!
//! - [`spawn`]: `posix_spawnp` で外部コマンドを 1 つ起動する（単独コマンド用）
//! - [`fork_stage`]: `fork` でパイプラインの 1 段を起動する。子側でパイプを接続し、
//!   ビルトインならその場で実行して終了、そうでなければ `execvp` する
//!
//! ## 構成
//!
//! | 型 | 役割 |
//! |-----|------|
//! | [`SpawnAttr`] | `posix_spawnattr_t` の RAII ラッパー（シグナルマスク、シグナル設定） |
//! | [`CStringVec`] | argv 用の NULL 終端ポインタ配列 |
//! | [`StageFds`] | パイプライン 1 段の stdin/stdout と、子で閉じる fd の一覧 |

use std::ffi::CString;
use std::io::{self, Write};
use std::os::unix::io::RawFd;

use crate::builtins;
use crate::error::ExecError;

// ── SpawnAttr ─────────────────────────────────────────────────────

/// `posix_spawnattr_t` の RAII ラッパー。Drop で自動 destroy。
struct SpawnAttr {
    inner: libc::posix_spawnattr_t,
}

impl SpawnAttr {
    /// `posix_spawnattr_init` で初期化する。
    fn new() -> Self {
        unsafe {
            let mut attr: libc::posix_spawnattr_t = std::mem::zeroed();
            libc::posix_spawnattr_init(&mut attr);
            Self { inner: attr }
        }
    }

    fn add_flags(&mut self, flag: libc::c_int) {
        unsafe {
            let mut flags: libc::c_short = 0;
            libc::posix_spawnattr_getflags(&self.inner, &mut flags);
            flags |= flag as libc::c_short;
            libc::posix_spawnattr_setflags(&mut self.inner, flags);
        }
    }

    /// 子プロセスのシグナルマスクを `mask` にする。
    ///
    /// 親は spawn 中 SIGCHLD をブロックしているので、ブロック前のマスクを渡して子では解除する。
    fn set_sigmask(&mut self, mask: &libc::sigset_t) {
        self.add_flags(libc::POSIX_SPAWN_SETSIGMASK);
        unsafe {
            libc::posix_spawnattr_setsigmask(&mut self.inner, mask);
        }
    }

    /// SIGPIPE をデフォルトに戻す。
    ///
    /// Rust ランタイムは SIGPIPE を無視に設定しており、無視設定は exec 後も引き継がれる。
    /// `yes | head -n 1` の `yes` が SIGPIPE で終了できるよう子では `SIG_DFL` にする。
    fn set_sigdefault(&mut self) {
        self.add_flags(libc::POSIX_SPAWN_SETSIGDEF);
        unsafe {
            let mut sigset: libc::sigset_t = std::mem::zeroed();
            libc::sigemptyset(&mut sigset);
            libc::sigaddset(&mut sigset, libc::SIGPIPE);
            libc::posix_spawnattr_setsigdefault(&mut self.inner, &sigset);
        }
    }

    fn as_ptr(&self) -> *const libc::posix_spawnattr_t {
        &self.inner
    }
}

impl Drop for SpawnAttr {
    fn drop(&mut self) {
        unsafe {
            libc::posix_spawnattr_destroy(&mut self.inner);
        }
    }
}

// ── CStringVec ────────────────────────────────────────────────────

/// argv 用の CString ベクタ。NULL 終端のポインタ配列を構築する。
///
/// fork 後の子プロセスでメモリ確保しないよう、パイプラインでは fork 前に全段分を作っておく。
pub struct CStringVec {
    _strings: Vec<CString>,
    ptrs: Vec<*mut libc::c_char>,
}

impl CStringVec {
    /// 引数リストから構築する。NUL バイトを含む引数があればエラー。
    pub fn from_args(args: &[&str]) -> Result<Self, ExecError> {
        let strings = args
            .iter()
            .map(|s| CString::new(*s))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| ExecError::NulByte {
                command: args.first().unwrap_or(&"").to_string(),
            })?;
        let mut ptrs: Vec<*mut libc::c_char> = strings
            .iter()
            .map(|s| s.as_ptr() as *mut libc::c_char)
            .collect();
        ptrs.push(std::ptr::null_mut()); // NULL 終端
        Ok(Self {
            _strings: strings,
            ptrs,
        })
    }

    /// NULL 終端ポインタ配列を返す。
    fn as_ptr(&self) -> *const *mut libc::c_char {
        self.ptrs.as_ptr()
    }

    /// `argv[0]`。空の引数リストなら NULL。
    fn program(&self) -> *const libc::c_char {
        self.ptrs[0]
    }
}

// ── spawn 関数 ────────────────────────────────────────────────────

extern "C" {
    static environ: *const *mut libc::c_char;
}

/// `posix_spawnp` で子プロセスを起動する。成功時は子 PID を返す。
///
/// - `args`: コマンドと引数（`args[0]` がコマンド名、PATH 検索付き）
/// - `sigmask`: 子プロセスに設定するシグナルマスク
///
/// 環境変数はそのまま継承する。コマンドが見つからない場合は
/// [`ExecError::NotFound`] を返し、子プロセスは残らない。
pub fn spawn(args: &[&str], sigmask: &libc::sigset_t) -> Result<libc::pid_t, ExecError> {
    let Some(&command) = args.first() else {
        return Err(ExecError::NotFound {
            command: String::new(),
        });
    };
    let argv = CStringVec::from_args(args)?;

    let mut attr = SpawnAttr::new();
    attr.set_sigmask(sigmask);
    attr.set_sigdefault();

    let mut pid: libc::pid_t = 0;

    let ret = unsafe {
        libc::posix_spawnp(
            &mut pid,
            argv.program(),
            std::ptr::null(),
            attr.as_ptr(),
            argv.as_ptr(),
            environ as *const *mut libc::c_char,
        )
    };

    if ret != 0 {
        return Err(ExecError::from_errno(ret, command));
    }

    Ok(pid)
}

// ── fork パス ─────────────────────────────────────────────────────

/// パイプライン 1 段の fd 配線。
pub struct StageFds<'f> {
    /// stdin に接続する fd（前段パイプの read end）。`None` なら継承。
    pub stdin: Option<RawFd>,
    /// stdout に接続する fd（次段パイプの write end）。`None` なら継承。
    pub stdout: Option<RawFd>,
    /// 子プロセスで閉じる fd。パイプライン中の全パイプの両端。
    pub close: &'f [RawFd],
}

/// fd に直接 `write(2)` する Writer。
///
/// `io::stdout()` / `io::stderr()` はプロセス共通のロックを取る。fork 時に別スレッドが
/// 握っていたロックは子では解放されないので、fork 後の子ではこちらを使う。
struct FdWriter(RawFd);

impl Write for FdWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = unsafe { libc::write(self.0, buf.as_ptr() as *const libc::c_void, buf.len()) };
        if n < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(n as usize)
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// `execvp` 失敗時に子が書き出すメッセージ。fork 前に組み立てる。
struct ExecFailure {
    not_found: Vec<u8>,
    denied: Vec<u8>,
    other: Vec<u8>,
}

impl ExecFailure {
    fn new(command: &str) -> Self {
        let render = |errno: i32| {
            format!("sluice: {}\n", ExecError::from_errno(errno, command)).into_bytes()
        };
        Self {
            not_found: render(libc::ENOENT),
            denied: render(libc::EACCES),
            other: format!("sluice: {}: cannot execute\n", command).into_bytes(),
        }
    }

    /// errno に対応する (メッセージ, 終了ステータス)。ステータスは [`ExecError::exit_status`] と同じ。
    fn select(&self, errno: i32) -> (&[u8], i32) {
        match errno {
            libc::ENOENT => (self.not_found.as_slice(), 127),
            libc::EACCES => (self.denied.as_slice(), 126),
            _ => (self.other.as_slice(), 1),
        }
    }
}

/// `fork` でパイプラインの 1 段を起動し、子 PID を返す。
///
/// 子プロセスでは順に:
/// 1. シグナルマスクを `sigmask` に戻し、SIGPIPE をデフォルトに戻す
/// 2. `dup2` で stdin/stdout をパイプに接続する
/// 3. `fds.close` の fd をすべて閉じる（下流の EOF 検出のため、未使用の write end を残さない）
/// 4. ビルトインなら実行してその終了ステータスで `_exit`、それ以外は `execvp`
///
/// `execvp` に失敗した場合はエラーを表示して 127 / 126 / 1 で `_exit` する。
/// 子は std の stdout/stderr ロックを取らず、fd 1 / 2 に直接書く。
/// 呼び出し前に親の stdout バッファを flush しておくこと（子で二重出力されるため）。
pub fn fork_stage(
    argv: &CStringVec,
    args: &[&str],
    fds: &StageFds<'_>,
    sigmask: &libc::sigset_t,
) -> Result<libc::pid_t, ExecError> {
    let failure = args.first().map(|command| ExecFailure::new(command));

    let pid = unsafe { libc::fork() };
    if pid < 0 {
        return Err(ExecError::Fork(io::Error::last_os_error()));
    }
    if pid > 0 {
        return Ok(pid);
    }

    // ── 子プロセス ──
    unsafe {
        libc::pthread_sigmask(libc::SIG_SETMASK, sigmask, std::ptr::null_mut());
        libc::signal(libc::SIGPIPE, libc::SIG_DFL);
        if let Some(fd) = fds.stdin {
            libc::dup2(fd, libc::STDIN_FILENO);
        }
        if let Some(fd) = fds.stdout {
            libc::dup2(fd, libc::STDOUT_FILENO);
        }
        for &fd in fds.close {
            libc::close(fd);
        }
    }

    let Some(failure) = failure else {
        unsafe { libc::_exit(0) };
    };

    let mut stdout = FdWriter(libc::STDOUT_FILENO);
    let mut stderr = FdWriter(libc::STDERR_FILENO);
    if let Some(status) = builtins::try_exec(args, &mut stdout, &mut stderr) {
        unsafe { libc::_exit(status) };
    }

    unsafe {
        libc::execvp(argv.program(), argv.as_ptr() as *const *const libc::c_char);
    }
    let errno = io::Error::last_os_error().raw_os_error().unwrap_or(0);
    let (message, status) = failure.select(errno);
    let _ = stderr.write_all(message);
    unsafe { libc::_exit(status) }
}
