// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subprocess launch: three piped stdio streams, a fresh session, a
//! scrubbed environment, and a non-blocking parent-side stdin.
//!
//! Child-side setup that fails after the fork exits with
//! [`SPAWN_FAILURE_CODE`] so operators can tell a launch failure apart from
//! a failing user program.

use std::fs::File;
use std::io;
use std::os::fd::{AsRawFd, OwnedFd};
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::{Command, Stdio};

use tracing::warn;

use crate::engine::EngineConfig;
use crate::job::{Job, OutputFn, Transport};
use gn_core::{Jid, JobError};

/// Exit status of a child that failed to prepare or exec.
pub const SPAWN_FAILURE_CODE: i32 = 0xEE;

/// Environment variables never passed to job children: the node's own
/// configuration, terminal state that would mislead the program, and SSH
/// details that would leak the operator's address.
pub const ENV_DENYLIST: &[&str] = &[
    "GRID_HOST",
    "GRID_PORT",
    "GRID_TLS",
    "GRID_USERNAME",
    "GRID_PASSWORD",
    "GRID_NODE_NAME",
    "GRID_JOB_CWD",
    "TERM",
    "TERM_PROGRAM",
    "TERM_PROGRAM_VERSION",
    "TMUX_PANE",
    "COLUMNS",
    "SSH_CLIENT",
    "SSH_CONNECTION",
    "SSH_TTY",
];

/// Launch the job shell on `script` and wire the slot.
///
/// On success the slot holds the child handle, the three parent-side
/// descriptors (stdin non-blocking), and `running = true`. On failure the
/// slot is left untouched for the caller to reset.
pub(crate) fn spawn_into(
    job: &mut Job,
    jid: Jid,
    on_output: OutputFn,
    script: &Path,
    config: &EngineConfig,
) -> Result<(), JobError> {
    let mut cmd = Command::new(&config.job_shell);
    cmd.arg(script)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .current_dir(&config.job_cwd);
    for key in ENV_DENYLIST {
        cmd.env_remove(key);
    }

    let proc_limit = config.proc_limit;
    // SAFETY: the hook runs between fork and exec, so it is restricted to
    // async-signal-safe calls; setsid/signal/getrlimit/setrlimit/_exit all
    // qualify.
    unsafe {
        cmd.pre_exec(move || {
            // Fresh session: the job and its descendants form their own
            // process group, which is what signal delivery targets.
            if libc::setsid() == -1 {
                libc::_exit(SPAWN_FAILURE_CODE);
            }
            // The Rust runtime ignores SIGPIPE process-wide; restore the
            // default so jobs die when the node closes their output.
            libc::signal(libc::SIGPIPE, libc::SIG_DFL);
            if let Some(limit) = proc_limit {
                clamp_proc_limit(limit as libc::rlim_t);
            }
            Ok(())
        });
    }

    let mut child = cmd.spawn().map_err(classify_spawn_error)?;

    // The Child keeps only the pid; the parent-side pipe ends move into the
    // slot so the pump can poll them. Orphaning the child-side ends is
    // handled by the runtime, which guarantees EOF once the child exits.
    let stdin = child.stdin.take().map(|fd| File::from(OwnedFd::from(fd)));
    let stdout = child.stdout.take().map(|fd| File::from(OwnedFd::from(fd)));
    let stderr = child.stderr.take().map(|fd| File::from(OwnedFd::from(fd)));

    if let Some(ref stdin) = stdin {
        if let Err(e) = set_nonblocking(stdin) {
            warn!(%jid, error = %e, "could not make job stdin non-blocking");
            // The child is useless without a safe stdin path; take it down
            // and reap it so no zombie lingers.
            let _ = child.kill();
            let _ = child.wait();
            return Err(JobError::Fcntl(e));
        }
    }

    job.jid = jid;
    job.transport = Transport::Pipe;
    job.child = Some(child);
    job.stdin = stdin;
    job.stdout = stdout;
    job.stderr = stderr;
    job.running = true;
    job.on_output = on_output;
    Ok(())
}

/// Child-side `RLIMIT_NPROC` clamp; only ever lowers the limit.
///
/// # Safety
/// Must only be called between fork and exec.
unsafe fn clamp_proc_limit(limit: libc::rlim_t) {
    let mut rl = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };
    if libc::getrlimit(libc::RLIMIT_NPROC, &mut rl) != 0 {
        libc::_exit(SPAWN_FAILURE_CODE);
    }
    if rl.rlim_max > limit {
        rl.rlim_cur = limit;
        rl.rlim_max = limit;
        if libc::setrlimit(libc::RLIMIT_NPROC, &rl) != 0 {
            libc::_exit(SPAWN_FAILURE_CODE);
        }
    }
}

fn set_nonblocking(file: &File) -> io::Result<()> {
    let fd = file.as_raw_fd();
    // SAFETY: `fd` is owned by `file`, which outlives both calls.
    unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFL);
        if flags == -1 {
            return Err(io::Error::last_os_error());
        }
        if libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) == -1 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

/// Sort a spawn failure into the error taxonomy.
///
/// The runtime reports pipe, fork, and exec failures through one channel;
/// descriptor exhaustion points at the pipes, a missing or unrunnable shell
/// at exec, and everything else at the fork.
fn classify_spawn_error(e: io::Error) -> JobError {
    match e.raw_os_error() {
        Some(libc::EMFILE) | Some(libc::ENFILE) => JobError::Pipe(e),
        _ => match e.kind() {
            io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => JobError::Exec(e),
            _ => JobError::Fork(e),
        },
    }
}

#[cfg(test)]
#[path = "spawn_tests.rs"]
mod tests;
