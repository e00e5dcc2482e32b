// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The job lifecycle engine.
//!
//! All operations run on the node's single executor. The pump drains
//! output before it reaps and reaps before it collects, so readers always
//! see a job's final bytes before its `stopped` notification fires.

use std::fmt;
use std::io::{self, Read, Write};
use std::os::fd::AsFd;
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};

use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use nix::sys::signal::{kill, killpg, Signal};
use nix::unistd::{getpgrp, Pid};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::job::OutputFn;
use crate::scripts::ScriptStore;
use crate::spawn;
use crate::table::JobTable;
use gn_core::{GridConfig, Jid, JobError, OutputStream};

/// First jid handed out when a submitter asks the node to allocate one.
const JID_COUNTER_START: u32 = 777;

/// Callback fired when a job has been reaped and its output fully drained.
/// Receives the jid and the raw wait-status word.
pub type StoppedFn = Box<dyn FnMut(Jid, i32)>;

/// The slice of node configuration the engine acts on.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub job_shell: PathBuf,
    pub job_cwd: PathBuf,
    pub max_jobs: usize,
    pub buffer_size: usize,
    pub poll_delay_ms: u16,
    pub script_limit: usize,
    pub stdout_limit: Option<u64>,
    pub proc_limit: Option<u64>,
}

impl From<&GridConfig> for EngineConfig {
    fn from(cfg: &GridConfig) -> Self {
        Self {
            job_shell: cfg.job_shell.clone(),
            job_cwd: cfg.job_cwd.clone(),
            max_jobs: cfg.max_jobs,
            buffer_size: cfg.buffer_size,
            poll_delay_ms: cfg.poll_delay_ms,
            script_limit: cfg.script_limit,
            stdout_limit: cfg.stdout_limit,
            proc_limit: cfg.proc_limit,
        }
    }
}

/// A failed submission, carrying the jid the reply should be addressed to.
#[derive(Debug)]
pub struct SubmitError {
    pub jid: Jid,
    pub kind: JobError,
}

impl SubmitError {
    fn new(jid: Jid, kind: JobError) -> Self {
        Self { jid, kind }
    }
}

impl fmt::Display for SubmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl std::error::Error for SubmitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

/// Roll-call announcement: which jobs this node is running.
#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct RollCall {
    pub node: String,
    pub jobs: Vec<Jid>,
}

pub struct JobEngine {
    config: EngineConfig,
    table: JobTable,
    scripts: ScriptStore,
    next_jid: u32,
    on_stopped: StoppedFn,
}

impl JobEngine {
    /// Build an engine with an empty table and a fresh scripts directory.
    ///
    /// `on_stopped` fires once per job after reap and drain, with the raw
    /// wait status.
    pub fn new(config: EngineConfig, on_stopped: StoppedFn) -> Result<Self, JobError> {
        let scripts = ScriptStore::new().map_err(JobError::TempScript)?;
        Ok(Self {
            table: JobTable::new(config.max_jobs),
            scripts,
            next_jid: JID_COUNTER_START,
            on_stopped,
            config,
        })
    }

    /// Where this instance keeps its job scripts.
    pub fn script_dir(&self) -> &Path {
        self.scripts.dir()
    }

    pub fn any_active(&self) -> bool {
        self.table.any_active()
    }

    /// Submit a shell command as a job.
    ///
    /// A `jid` of 0 asks the node to allocate one. The command is truncated
    /// at the configured script limit, written to a temp script, and handed
    /// to the job shell in a fresh session. On any failure after the jid is
    /// resolved, the slot returns to empty and the script is unlinked.
    pub fn submit(
        &mut self,
        jid: Jid,
        on_output: OutputFn,
        command: &[u8],
    ) -> Result<Jid, SubmitError> {
        let jid = self.resolve_jid(jid)?;

        let script = match self.scripts.write(command, self.config.script_limit) {
            Ok(path) => path,
            Err(e) => return Err(SubmitError::new(jid, JobError::TempScript(e))),
        };

        let Some(idx) = self.table.allocate() else {
            self.scripts.remove(&script);
            return Err(SubmitError::new(jid, JobError::CapacityExhausted));
        };

        let slot = &mut self.table.slots_mut()[idx];
        match spawn::spawn_into(slot, jid, on_output, &script, &self.config) {
            Ok(()) => {
                slot.temp_path = Some(script);
                debug!(%jid, "job spawned");
                Ok(jid)
            }
            Err(kind) => {
                slot.reset();
                self.scripts.remove(&script);
                warn!(%jid, error = %kind, "could not spawn job");
                Err(SubmitError::new(jid, kind))
            }
        }
    }

    fn resolve_jid(&mut self, requested: Jid) -> Result<Jid, SubmitError> {
        if requested.is_unassigned() {
            loop {
                let candidate = Jid::new(self.next_jid);
                self.next_jid = self.next_jid.wrapping_add(1);
                if self.next_jid == 0 {
                    self.next_jid = 1;
                }
                if !self.table.contains(candidate) {
                    return Ok(candidate);
                }
            }
        }
        if self.table.contains(requested) {
            return Err(SubmitError::new(requested, JobError::JidInUse));
        }
        Ok(requested)
    }

    /// Write bytes to a job's stdin.
    ///
    /// There is no write-behind buffer: a short write reports
    /// [`JobError::WouldBlock`] and the caller retries the whole payload.
    pub fn stdin_write(&mut self, jid: Jid, data: &[u8]) -> Result<(), JobError> {
        let Some(job) = self.table.find(jid) else {
            return Err(JobError::NotFound);
        };
        let Some(stdin) = job.stdin.as_mut() else {
            return Err(JobError::Closed);
        };
        match stdin.write(data) {
            Ok(n) if n == data.len() => Ok(()),
            Ok(_) => Err(JobError::WouldBlock),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Err(JobError::WouldBlock),
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Err(JobError::Closed),
            Err(e) => Err(JobError::Internal(format!("stdin write failed: {e}"))),
        }
    }

    /// Close a job's stdin so it sees EOF. Idempotence: the second call
    /// reports [`JobError::Closed`].
    pub fn stdin_eof(&mut self, jid: Jid) -> Result<(), JobError> {
        let Some(job) = self.table.find(jid) else {
            return Err(JobError::NotFound);
        };
        if job.stdin.take().is_none() {
            return Err(JobError::Closed);
        }
        Ok(())
    }

    /// Send a signal to the job's whole process group; signalling only the
    /// shell would leave its children running.
    pub fn signal(&mut self, jid: Jid, signum: i32) -> Result<(), JobError> {
        let signal = Signal::try_from(signum)
            .map_err(|_| JobError::BadArg(format!("bad signal number {signum}")))?;
        let Some(job) = self.table.find(jid) else {
            return Err(JobError::NotFound);
        };
        let Some(child) = job.child.as_ref() else {
            return Err(JobError::NotFound);
        };
        let pgid = Pid::from_raw(child.id() as i32);
        info!(%jid, %signal, "signalling job process group");
        kill_pgroup(pgid, signal)
    }

    /// Close a job's output descriptors, inducing SIGPIPE on its next
    /// write. Used by the output-cap enforcer and available to operators.
    pub fn output_close(&mut self, jid: Jid) -> Result<(), JobError> {
        let Some(job) = self.table.find(jid) else {
            return Err(JobError::NotFound);
        };
        job.stdout = None;
        job.stderr = None;
        Ok(())
    }

    /// Emergency stop: SIGKILL every active job's process group. Safe to
    /// repeat; a group is never killed twice.
    pub fn scram(&mut self) {
        info!("scram: killing all job process groups");
        for job in self.table.slots_mut() {
            if !job.is_active() || job.killed {
                continue;
            }
            let Some(child) = job.child.as_ref() else {
                continue;
            };
            let pgid = Pid::from_raw(child.id() as i32);
            match kill_pgroup(pgid, Signal::SIGKILL) {
                Ok(()) => job.killed = true,
                Err(e) => warn!(jid = %job.jid, error = %e, "scram could not kill job"),
            }
        }
    }

    /// Enumerate active jobs for publication.
    pub fn roll_call(&self, node: &str) -> RollCall {
        RollCall {
            node: node.to_string(),
            jobs: self.table.active_jids(),
        }
    }

    /// One tick of the engine: drain ready output, reap exited children,
    /// retire finished slots.
    pub fn pump_once(&mut self) {
        self.drain_output();
        self.reap();
        self.collect();
    }

    /// Poll every active output descriptor once, then read the ready ones
    /// in slot order, stdout before stderr within a slot.
    fn drain_output(&mut self) {
        let mut targets: Vec<(usize, OutputStream)> = Vec::new();
        {
            let slots = self.table.slots();
            let mut keys: Vec<(usize, OutputStream)> = Vec::new();
            let mut pollfds: Vec<PollFd> = Vec::new();
            for (idx, job) in slots.iter().enumerate() {
                if !job.is_active() {
                    continue;
                }
                if let Some(f) = &job.stdout {
                    keys.push((idx, OutputStream::Stdout));
                    pollfds.push(PollFd::new(f.as_fd(), PollFlags::POLLIN));
                }
                if let Some(f) = &job.stderr {
                    keys.push((idx, OutputStream::Stderr));
                    pollfds.push(PollFd::new(f.as_fd(), PollFlags::POLLIN));
                }
            }
            if pollfds.is_empty() {
                return;
            }
            match poll(&mut pollfds, PollTimeout::from(self.config.poll_delay_ms)) {
                Ok(0) => return,
                Ok(_) => {}
                Err(Errno::EINTR) | Err(Errno::EAGAIN) => return,
                Err(e) => {
                    warn!(error = %e, "could not poll job output");
                    return;
                }
            }
            for (key, pfd) in keys.iter().zip(&pollfds) {
                let ready = pfd
                    .revents()
                    .is_some_and(|r| r.intersects(PollFlags::POLLIN | PollFlags::POLLHUP));
                if ready {
                    targets.push(*key);
                }
            }
        }

        let mut buf = vec![0u8; self.config.buffer_size];
        for (idx, stream) in targets {
            self.read_chunk(idx, stream, &mut buf);
        }
    }

    /// Read one buffer from a job stream. A zero-length read is EOF: the
    /// callback still fires (with an empty slice) and the descriptor
    /// closes.
    fn read_chunk(&mut self, idx: usize, stream: OutputStream, buf: &mut [u8]) {
        let stdout_limit = self.config.stdout_limit;
        let job = &mut self.table.slots_mut()[idx];
        let Some(file) = job.stream_mut(stream).as_mut() else {
            return;
        };
        match file.read(buf) {
            Ok(0) => {
                (job.on_output)(job.jid, stream, &[]);
                *job.stream_mut(stream) = None;
            }
            Ok(n) => {
                (job.on_output)(job.jid, stream, &buf[..n]);
                job.stdout_sent += n as u64;
                if let Some(limit) = stdout_limit {
                    if job.stdout_sent > limit {
                        info!(
                            jid = %job.jid,
                            sent = job.stdout_sent,
                            limit,
                            "output cap exceeded; closing job output"
                        );
                        job.stdout = None;
                        job.stderr = None;
                    }
                }
            }
            Err(e) if matches!(e.kind(), io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock) => {
            }
            Err(e) => {
                warn!(jid = %job.jid, %stream, error = %e, "error reading job output");
            }
        }
    }

    /// Non-blocking reap. On exit the pid is dropped, the raw status is
    /// kept, and stdin closes; output descriptors stay open to drain.
    fn reap(&mut self) {
        for job in self.table.slots_mut() {
            if !job.is_active() {
                continue;
            }
            let Some(child) = job.child.as_mut() else {
                continue;
            };
            match child.try_wait() {
                Ok(Some(status)) => {
                    debug!(jid = %job.jid, %status, "job subprocess exited");
                    job.exit_status = status.into_raw();
                    job.child = None;
                    job.stdin = None;
                }
                Ok(None) => {}
                Err(e) => warn!(jid = %job.jid, error = %e, "could not reap job subprocess"),
            }
        }
    }

    /// Retire slots whose subprocess is reaped and whose output has
    /// drained: report `stopped`, unlink the script, empty the slot.
    fn collect(&mut self) {
        for job in self.table.slots_mut() {
            if !job.is_active() || !job.is_dead() {
                continue;
            }
            let jid = job.jid;
            let status = job.exit_status;
            info!(%jid, status, "job done");
            if let Some(path) = job.temp_path.take() {
                self.scripts.remove(&path);
            }
            job.reset();
            (self.on_stopped)(jid, status);
        }
    }
}

/// Signal a job's process group, refusing to touch the node's own group.
///
/// The group id equals the child's pid (`setsid` makes every job a session
/// leader), so no pgid lookup is needed. Between fork and the child's
/// `setsid` that group does not exist yet, but the child also cannot have
/// descendants before exec, so signalling the pid alone covers the whole
/// job.
fn kill_pgroup(pgid: Pid, signal: Signal) -> Result<(), JobError> {
    if pgid == getpgrp() {
        warn!(%pgid, "job shares the node's process group; refusing to signal");
        return Err(JobError::Internal(
            "job shares the node's process group".to_string(),
        ));
    }
    match killpg(pgid, signal) {
        Ok(()) => Ok(()),
        Err(Errno::ESRCH) => kill(pgid, signal).map_err(|e| match e {
            Errno::ESRCH => JobError::NotFound,
            e => JobError::Internal(format!("kill failed: {e}")),
        }),
        Err(e) => Err(JobError::Internal(format!("killpg failed: {e}"))),
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
