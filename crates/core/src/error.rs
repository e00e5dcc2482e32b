// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy for job operations.
//!
//! These are the kinds surfaced to submitters as `reject` payloads or
//! `node/announce` narration. Per-request failures never terminate the
//! agent; they are reported and the node keeps serving.

use std::io;
use thiserror::Error;

/// Everything that can go wrong with a single job request.
#[derive(Debug, Error)]
pub enum JobError {
    /// The job table has no empty slot.
    #[error("capacity exhausted")]
    CapacityExhausted,

    /// No active job with the given jid.
    #[error("no such job")]
    NotFound,

    /// The submitter supplied a jid that already names a live job.
    #[error("jid already in use")]
    JidInUse,

    /// The descriptor was already closed.
    #[error("stream already closed")]
    Closed,

    /// A stdin write was fully or partially blocked; the caller retries.
    #[error("write would block")]
    WouldBlock,

    #[error("bad argument: {0}")]
    BadArg(String),

    #[error("could not create pipe: {0}")]
    Pipe(#[source] io::Error),

    #[error("could not set descriptor flags: {0}")]
    Fcntl(#[source] io::Error),

    #[error("could not fork subprocess: {0}")]
    Fork(#[source] io::Error),

    #[error("could not exec job shell: {0}")]
    Exec(#[source] io::Error),

    #[error("could not write job script: {0}")]
    TempScript(#[source] io::Error),

    #[error("broker error: {0}")]
    Broker(String),

    #[error("internal error: {0}")]
    Internal(String),
}
