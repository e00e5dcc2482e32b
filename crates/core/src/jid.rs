// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job identifiers.
//!
//! A jid is the externally visible identity of a job: a 32-bit unsigned
//! integer issued by the submitter, or allocated by the node when the
//! submitter passes 0. The child pid is implementation-private and never
//! crosses the broker.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a job, stable for the job's whole lifetime.
///
/// `Jid(0)` is the "assign one for me" sentinel and never names a live job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Jid(pub u32);

impl Jid {
    /// The sentinel a submitter uses to request node-side allocation.
    pub const UNASSIGNED: Jid = Jid(0);

    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// True for the `0` sentinel, which is never a live job.
    pub fn is_unassigned(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Jid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for Jid {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

#[cfg(test)]
#[path = "jid_tests.rs"]
mod tests;
