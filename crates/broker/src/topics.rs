// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The grid topic namespace.
//!
//! Per-node commands arrive under `<node_name>/...`; grid-wide broadcasts
//! under `grid/...`. Job lifecycle replies go out on `job/<jid>/<verb>` and
//! node-wide lifecycle on the `node/...` topics.

use gn_core::{Jid, OutputStream};

/// Presence announcement; payload is the node name.
pub const NODE_CONNECT: &str = "node/connect";
/// Farewell and last-will topic; payload is the node name.
pub const NODE_DISCONNECT: &str = "node/disconnect";
/// Node-wide narration, formatted `<node_name>: <text>`.
pub const NODE_ANNOUNCE: &str = "node/announce";
/// Roll-call documents: `{"node": <name>, "jobs": [jid...]}`.
pub const NODE_ROLLCALL: &str = "node/rollcall";
/// Broadcast: every node announces itself.
pub const GRID_PING: &str = "grid/ping";
/// Broadcast: every node kills its local jobs.
pub const GRID_SCRAM: &str = "grid/scram";

/// Submission accepted; empty payload.
pub const VERB_STARTUP: &str = "startup";
/// Submission refused; payload names the error kind.
pub const VERB_REJECT: &str = "reject";
/// Job reaped and drained; payload is the decimal wait status.
pub const VERB_STOPPED: &str = "stopped";

/// Reply topic for one job lifecycle verb.
pub fn job(jid: Jid, verb: &str) -> String {
    format!("job/{jid}/{verb}")
}

/// Reply topic for a chunk of job output.
pub fn job_output(jid: Jid, stream: OutputStream) -> String {
    job(jid, stream.topic_leaf())
}

/// Wildcard covering all commands addressed to this node.
pub fn node_commands(node_name: &str) -> String {
    format!("{node_name}/#")
}

/// Wildcard covering all grid-wide broadcasts.
pub fn grid_broadcasts() -> String {
    "grid/#".to_string()
}

#[cfg(test)]
#[path = "topics_tests.rs"]
mod tests;
