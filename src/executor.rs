//! コマンド実行: 演算子チェーンの条件付き評価、パイプライン接続、ビルトイン判定、
//! バックグラウンド起動。
//!
//! - [`execute`]: コマンドリスト（`&&`/`||`/`;`）全体を左から条件付きで実行
//!   - `&&` の次: 直前に実行した要素が成功 (status == 0) したときだけ実行
//!   - `||` の次: 直前に実行した要素が失敗 (status != 0) したときだけ実行
//!   - `;` の次: 無条件に実行
//! - 単独コマンド: ビルトインはプロセス内で実行、それ以外は `posix_spawnp`
//! - 複数段パイプライン: N-1 本のパイプを先に作り、各段を `fork` で起動
//!
//! 終了ステータスは評価関数の戻り値として受け渡す。スキップされた要素は
//! ステータスを変えない。

use std::io::{self, Write};
use std::os::unix::io::{AsRawFd, FromRawFd, OwnedFd, RawFd};

use libc::pid_t;
use tracing::{debug, warn};

use crate::builtins;
use crate::error::ExecError;
use crate::parser::{self, CommandList, Connector, Pipeline, Segment};
use crate::reaper::{self, SigchldBlock};
use crate::shell::Shell;
use crate::spawn::{self, CStringVec, StageFds};

/// 1 行を実行し、最後に実行したパイプラインの終了ステータスを返す。
///
/// 実行する要素がなければ直前のステータスをそのまま返す。
pub fn execute_line(shell: &mut Shell, input: &str) -> i32 {
    let list = parser::parse(input);
    if !list.items.is_empty() {
        shell.last_status = execute(shell, &list);
    }
    shell.last_status
}

/// コマンドリスト全体を実行し、終了ステータスを返す。
///
/// 各パイプラインを直前の接続子（`&&`, `||`, `;`）に基づいて条件付きで実行する。
/// スキップした要素はステータスを変えないので、`false && a || b` では `b` が実行される。
pub fn execute(shell: &mut Shell, list: &CommandList<'_>) -> i32 {
    let mut last_status = shell.last_status;

    for (i, item) in list.items.iter().enumerate() {
        // 前の接続子に基づく条件判定
        if i > 0 {
            match list.items[i - 1].connector {
                Connector::And if last_status != 0 => continue,
                Connector::Or if last_status == 0 => continue,
                _ => {}
            }
        }

        last_status = execute_pipeline(shell, &item.pipeline);
    }

    last_status
}

/// パイプラインを実行し、終了ステータスを返す。
///
/// 起動に失敗した場合はエラーを表示し、対応するステータスを返す（ループは継続する）。
fn execute_pipeline(shell: &mut Shell, pipeline: &Pipeline<'_>) -> i32 {
    // 子プロセスに親の出力バッファを複製させない
    let _ = io::stdout().flush();

    let result = match pipeline.segments.as_slice() {
        [] => Ok(0),
        [segment] => run_command(shell, segment, pipeline.background),
        segments => run_pipeline(shell, segments, pipeline.background),
    };

    result.unwrap_or_else(|e| {
        eprintln!("sluice: {}", e);
        e.exit_status()
    })
}

// ── 単独コマンド ─────────────────────────────────────────────────────

/// パイプなしの単独コマンドを実行する。
///
/// ビルトインを先に試し、該当しなければ `posix_spawnp` で起動する。
/// ビルトインは `&` 付きでもプロセス内で同期実行する。
/// `&` 付きの外部コマンドは起動に失敗してもエラーを表示して 0 を返す。
fn run_command(
    shell: &mut Shell,
    segment: &Segment<'_>,
    background: bool,
) -> Result<i32, ExecError> {
    let args = &segment.args;
    if args.is_empty() {
        return Ok(0);
    }

    if let Some(status) = builtins::try_exec(args, &mut io::stdout(), &mut io::stderr()) {
        debug!(command = args[0], status, "builtin");
        return Ok(status);
    }

    let block = SigchldBlock::new();
    let pid = match spawn::spawn(args, block.previous()) {
        Ok(pid) => pid,
        // `&` 付きは起動の成否にかかわらずステータス 0
        Err(e) if background => {
            eprintln!("sluice: {}", e);
            debug!(command = args[0], status = e.exit_status(), "background spawn failed");
            return Ok(0);
        }
        Err(e) => return Err(e),
    };
    debug!(command = args[0], pid, background, "spawned");

    if background {
        shell.adopt_background(&[pid]);
        drop(block);
        report_background(shell, &[pid]);
        return Ok(0);
    }
    drop(block);

    let raw = reaper::wait_for(pid).map_err(ExecError::Wait)?;
    Ok(reaper::exit_code(raw))
}

// ── パイプライン ─────────────────────────────────────────────────────

/// パイプ 1 本分。両端とも drop で close される。
struct Pipe {
    read: OwnedFd,
    write: OwnedFd,
}

impl Pipe {
    fn new() -> io::Result<Self> {
        let mut fds = [-1 as RawFd; 2];
        if unsafe { libc::pipe(fds.as_mut_ptr()) } != 0 {
            return Err(io::Error::last_os_error());
        }
        // pipe(2) が返した fd はここでのみ所有される
        unsafe {
            Ok(Self {
                read: OwnedFd::from_raw_fd(fds[0]),
                write: OwnedFd::from_raw_fd(fds[1]),
            })
        }
    }
}

/// N 段 (N >= 2) のパイプラインを実行する。
///
/// 処理の流れ:
/// 1. 全段の argv を C 文字列に変換する（fork 後に確保しない）
/// 2. N-1 本のパイプを作る。1 本でも失敗したらどの段も起動しない
/// 3. 各段を `fork` で起動する。子は自分の段で使わない fd をすべて閉じる
/// 4. 親は全段を起動した直後にすべてのパイプ端を閉じる
/// 5. foreground: 全段を待ち、最終段のステータスを返す。background: 待たずに 0 を返す
fn run_pipeline(
    shell: &mut Shell,
    segments: &[Segment<'_>],
    background: bool,
) -> Result<i32, ExecError> {
    let n = segments.len();

    let argvs = segments
        .iter()
        .map(|s| CStringVec::from_args(&s.args))
        .collect::<Result<Vec<_>, _>>()?;

    let pipes = (0..n - 1)
        .map(|_| Pipe::new())
        .collect::<io::Result<Vec<_>>>()
        .map_err(ExecError::Pipe)?;
    let all_fds: Vec<RawFd> = pipes
        .iter()
        .flat_map(|p| [p.read.as_raw_fd(), p.write.as_raw_fd()])
        .collect();

    let block = SigchldBlock::new();
    let mut pids: Vec<pid_t> = Vec::with_capacity(n);

    for (i, segment) in segments.iter().enumerate() {
        let fds = StageFds {
            stdin: (i > 0).then(|| pipes[i - 1].read.as_raw_fd()),
            stdout: (i < n - 1).then(|| pipes[i].write.as_raw_fd()),
            close: &all_fds,
        };
        match spawn::fork_stage(&argvs[i], &segment.args, &fds, block.previous()) {
            Ok(pid) => {
                debug!(stage = i, pid, "spawned stage");
                pids.push(pid);
            }
            Err(e) => {
                // 起動済みの段は EOF / SIGPIPE で終わるので回収してから中断する
                drop(pipes);
                drop(block);
                for &pid in &pids {
                    let _ = reaper::wait_for(pid);
                }
                return Err(e);
            }
        }
    }

    // 親側の全パイプ端を閉じる。残すと下流が EOF を検出できない
    drop(pipes);

    if background {
        shell.adopt_background(&pids);
        drop(block);
        report_background(shell, &pids);
        return Ok(0);
    }
    drop(block);

    let mut status = 0;
    for (i, &pid) in pids.iter().enumerate() {
        let waited = reaper::wait_for(pid);
        if i + 1 < n {
            continue;
        }
        status = match waited {
            Ok(raw) => reaper::exit_code(raw),
            Err(e) => {
                warn!(pid, error = %e, "lost track of final stage");
                1
            }
        };
    }
    Ok(status)
}

/// バックグラウンドで起動した PID を stderr に表示する。
fn report_background(shell: &Shell, pids: &[pid_t]) {
    let list = pids
        .iter()
        .map(|pid| pid.to_string())
        .collect::<Vec<_>>()
        .join(" ");
    eprintln!("[bg] {}", list);
    debug!(
        tracked = reaper::tracked(),
        pending = shell.pending(),
        "background registered"
    );
}
