// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Inbound message routing.
//!
//! Topics addressed to this node (`<node_name>/...`) and grid broadcasts
//! (`grid/...`) decode into commands, which dispatch onto the job engine
//! and reply through the publisher. Unknown topics and malformed jid or
//! signal tokens are logged and ignored; a stray message must never take
//! the node down.

use tracing::{debug, info, warn};

use gn_broker::{topics, GridPublisher};
use gn_core::Jid;
use gn_engine::{JobEngine, OutputFn};

/// A decoded inbound command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Command {
    /// Submit the payload as a shell job; jid 0 means "assign one".
    Submit { jid: Jid },
    /// Write the payload to the job's stdin.
    StdinWrite { jid: Jid },
    /// Close the job's stdin.
    StdinEof { jid: Jid },
    /// Signal the job's process group.
    Signal { jid: Jid, signum: i32 },
    /// Kill every local job.
    Scram,
    /// Shut the node down.
    Exit,
    /// Re-exec the node binary.
    Reload,
    /// Announce presence and publish a roll call.
    Ping,
}

/// What the event loop does after a dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    Shutdown,
    Reload,
}

/// Decode a topic into a command. `None` means "not for us": unknown verb,
/// someone else's node prefix, or a jid/signal token that does not parse.
pub(crate) fn parse(node_name: &str, topic: &str) -> Option<Command> {
    if let Some(rest) = topic
        .strip_prefix(node_name)
        .and_then(|rest| rest.strip_prefix('/'))
    {
        let segments: Vec<&str> = rest.split('/').collect();
        return match segments.as_slice() {
            ["submit", jid] => parse_jid(jid).map(|jid| Command::Submit { jid }),
            ["stdin", jid] => parse_jid(jid).map(|jid| Command::StdinWrite { jid }),
            ["eof", jid] => parse_jid(jid).map(|jid| Command::StdinEof { jid }),
            ["signal", jid, signum] => match (parse_jid(jid), signum.parse::<i32>().ok()) {
                (Some(jid), Some(signum)) => Some(Command::Signal { jid, signum }),
                _ => None,
            },
            ["scram"] => Some(Command::Scram),
            ["exit"] => Some(Command::Exit),
            ["reload"] => Some(Command::Reload),
            _ => None,
        };
    }
    match topic {
        t if t == topics::GRID_PING => Some(Command::Ping),
        t if t == topics::GRID_SCRAM => Some(Command::Scram),
        _ => None,
    }
}

fn parse_jid(token: &str) -> Option<Jid> {
    token.parse::<u32>().ok().map(Jid::new)
}

/// Route one inbound message.
pub(crate) fn handle_message<P: GridPublisher>(
    topic: &str,
    payload: &[u8],
    engine: &mut JobEngine,
    publisher: &P,
    node_name: &str,
) -> Flow {
    match parse(node_name, topic) {
        Some(command) => {
            debug!(%topic, ?command, "dispatching");
            dispatch(command, payload, engine, publisher, node_name)
        }
        None => {
            debug!(%topic, "ignoring unknown topic");
            Flow::Continue
        }
    }
}

/// Execute a decoded command against the engine and publish the replies.
pub(crate) fn dispatch<P: GridPublisher>(
    command: Command,
    payload: &[u8],
    engine: &mut JobEngine,
    publisher: &P,
    node_name: &str,
) -> Flow {
    match command {
        Command::Submit { jid } => {
            let sink = publisher.clone();
            let on_output: OutputFn = Box::new(move |jid, stream, data| {
                if !data.is_empty() {
                    sink.job_chunk(jid, stream, data);
                }
            });
            match engine.submit(jid, on_output, payload) {
                Ok(jid) => {
                    info!(%jid, "job accepted");
                    publisher.job_startup(jid);
                }
                Err(err) => {
                    warn!(jid = %err.jid, error = %err, "job rejected");
                    publisher.job_reject(err.jid, &err.kind.to_string());
                }
            }
            Flow::Continue
        }

        Command::StdinWrite { jid } => {
            if let Err(e) = engine.stdin_write(jid, payload) {
                warn!(%jid, error = %e, "stdin write failed");
                publisher.announce(&format!("stdin for job {jid} failed: {e}"));
            }
            Flow::Continue
        }

        Command::StdinEof { jid } => {
            if let Err(e) = engine.stdin_eof(jid) {
                warn!(%jid, error = %e, "stdin eof failed");
                publisher.announce(&format!("eof for job {jid} failed: {e}"));
            }
            Flow::Continue
        }

        Command::Signal { jid, signum } => {
            if let Err(e) = engine.signal(jid, signum) {
                warn!(%jid, signum, error = %e, "signal failed");
                publisher.announce(&format!("signal {signum} for job {jid} failed: {e}"));
            }
            Flow::Continue
        }

        Command::Scram => {
            engine.scram();
            publisher.announce("scram: killed all local jobs");
            Flow::Continue
        }

        Command::Ping => {
            publisher.presence();
            match serde_json::to_value(engine.roll_call(node_name)) {
                Ok(value) => publisher.publish_json(topics::NODE_ROLLCALL, &value),
                Err(e) => warn!(error = %e, "could not serialize roll call"),
            }
            Flow::Continue
        }

        Command::Exit => {
            info!("exit requested");
            Flow::Shutdown
        }

        Command::Reload => {
            if engine.any_active() {
                warn!("reload refused: jobs active");
                publisher.announce("reload refused: jobs active");
                Flow::Continue
            } else {
                info!("reload requested");
                Flow::Reload
            }
        }
    }
}

#[cfg(test)]
#[path = "router_tests.rs"]
mod tests;
