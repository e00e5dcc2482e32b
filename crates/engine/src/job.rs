// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job slot records.
//!
//! A slot cycles EMPTY → SPAWNED/RUNNING → DRAINING → REAPED → EMPTY. The
//! empty form (`running == false`, no child, all descriptors closed) is the
//! only one eligible for allocation. A record whose child is gone but whose
//! output descriptors are still open is draining: buffered output remains
//! to be delivered before the slot can retire.

use std::fs::File;
use std::path::PathBuf;
use std::process::Child;

use gn_core::{Jid, OutputStream};

/// Callback invoked once per non-empty read of job output, and once with an
/// empty slice when a stream reaches EOF.
pub type OutputFn = Box<dyn FnMut(Jid, OutputStream, &[u8])>;

/// How the job's stdio is wired to the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    /// Empty slot; nothing wired.
    None,
    /// Three anonymous pipes, the only transport currently spawned.
    Pipe,
    /// Reserved for interactive jobs behind a pseudo-terminal.
    Pty,
}

/// One slot in the job table.
pub struct Job {
    /// External identity; 0 only while the slot is empty.
    pub jid: Jid,
    pub transport: Transport,
    /// Handle on the immediate child (the job shell); `None` once reaped.
    pub child: Option<Child>,
    /// Parent-side write end of the job's stdin; `None` once closed.
    pub stdin: Option<File>,
    /// Parent-side read end of the job's stdout; `None` once at EOF.
    pub stdout: Option<File>,
    /// Parent-side read end of the job's stderr; `None` once at EOF.
    pub stderr: Option<File>,
    /// True between successful spawn and slot retirement.
    pub running: bool,
    /// Raw wait-status word; meaningful only after reap.
    pub exit_status: i32,
    pub on_output: OutputFn,
    /// Cumulative bytes forwarded from stdout and stderr.
    pub stdout_sent: u64,
    /// The job's process group has already been scrammed.
    pub killed: bool,
    /// Script to unlink when the slot retires.
    pub temp_path: Option<PathBuf>,
}

impl Job {
    pub(crate) fn empty() -> Self {
        Self {
            jid: Jid::UNASSIGNED,
            transport: Transport::None,
            child: None,
            stdin: None,
            stdout: None,
            stderr: None,
            running: false,
            exit_status: 0,
            on_output: Box::new(|_, _, _| {}),
            stdout_sent: 0,
            killed: false,
            temp_path: None,
        }
    }

    /// Return the slot to the empty form, closing anything still open.
    pub(crate) fn reset(&mut self) {
        *self = Self::empty();
    }

    /// True iff this slot holds a live or draining job.
    pub fn is_active(&self) -> bool {
        self.running
    }

    /// True iff the subprocess is gone and both output pipes have drained.
    pub(crate) fn is_dead(&self) -> bool {
        self.child.is_none() && self.stdout.is_none() && self.stderr.is_none()
    }

    pub(crate) fn stream_mut(&mut self, stream: OutputStream) -> &mut Option<File> {
        match stream {
            OutputStream::Stdout => &mut self.stdout,
            OutputStream::Stderr => &mut self.stderr,
        }
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
