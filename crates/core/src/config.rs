// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Node configuration, resolved from `GRID_*` environment variables.
//!
//! Parsing goes through an injectable lookup so tests never mutate the
//! process environment. Tunables the node treats as constants elsewhere
//! (slot count, read buffer, poll delay, script limit) live here so tests
//! can shrink them.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Broker host when `GRID_HOST` is unset.
pub const DEFAULT_HOST: &str = "localhost";
/// Broker port when `GRID_PORT` is unset.
pub const DEFAULT_PORT: u16 = 1883;
/// Shell used to run job scripts.
pub const DEFAULT_JOB_SHELL: &str = "/bin/sh";
/// Max number of concurrent jobs.
pub const DEFAULT_MAX_JOBS: usize = 8;
/// Buffer size for subprocess stdout/stderr reads.
pub const DEFAULT_BUFFER_SIZE: usize = 256;
/// Millisecond timeout for the per-tick poll over job output descriptors.
pub const DEFAULT_POLL_DELAY_MS: u16 = 100;
/// Byte cap on a submitted job script; longer commands are truncated here.
pub const DEFAULT_SCRIPT_LIMIT: usize = 4096;
/// MQTT keepalive interval.
pub const DEFAULT_KEEPALIVE: Duration = Duration::from_secs(60);

/// Configuration errors are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// `grid/#` is the broadcast namespace, so a node may not claim it.
    #[error("GRID_NODE_NAME may not be \"grid\" (the broadcast namespace)")]
    ReservedNodeName,

    #[error("invalid {var}: {value:?}")]
    Invalid { var: &'static str, value: String },

    #[error("could not determine hostname: {0}")]
    NoHostname(#[source] std::io::Error),
}

/// Everything the node needs to come up, resolved once at startup.
#[derive(Debug, Clone)]
pub struct GridConfig {
    /// Broker host.
    pub host: String,
    /// Broker port.
    pub port: u16,
    /// Enable TLS to the broker.
    pub tls: bool,
    /// Broker username.
    pub username: Option<String>,
    /// Broker password.
    pub password: Option<String>,
    /// Identity on the grid; also the MQTT client id and topic prefix.
    pub node_name: String,
    /// Working directory for job children.
    pub job_cwd: PathBuf,
    /// Shell that interprets job scripts.
    pub job_shell: PathBuf,
    /// Job table capacity.
    pub max_jobs: usize,
    /// Read size for job output pipes.
    pub buffer_size: usize,
    /// Poll timeout over job output descriptors, in milliseconds.
    pub poll_delay_ms: u16,
    /// Truncation limit for submitted commands, in bytes.
    pub script_limit: usize,
    /// Optional cumulative output cap; exceeding it closes the job's output.
    pub stdout_limit: Option<u64>,
    /// Optional `RLIMIT_NPROC` clamp applied to job children.
    pub proc_limit: Option<u64>,
    /// MQTT keepalive.
    pub keepalive: Duration,
}

impl GridConfig {
    /// Resolve configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve configuration from an arbitrary lookup (tests pass a map).
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let host = get("GRID_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());

        let port = match get("GRID_PORT") {
            Some(raw) => raw.parse::<u16>().map_err(|_| ConfigError::Invalid {
                var: "GRID_PORT",
                value: raw,
            })?,
            None => DEFAULT_PORT,
        };

        let node_name = match get("GRID_NODE_NAME") {
            Some(name) => name,
            None => hostname()?,
        };
        if node_name.eq_ignore_ascii_case("grid") {
            return Err(ConfigError::ReservedNodeName);
        }

        let job_cwd = get("GRID_JOB_CWD")
            .or_else(|| get("HOME"))
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("/"));

        let stdout_limit = parse_optional(&get, "GRID_STDOUT_LIMIT")?;
        let proc_limit = parse_optional(&get, "GRID_PROC_LIMIT")?;

        Ok(Self {
            host,
            port,
            tls: get("GRID_TLS").is_some(),
            username: get("GRID_USERNAME"),
            password: get("GRID_PASSWORD"),
            node_name,
            job_cwd,
            job_shell: PathBuf::from(DEFAULT_JOB_SHELL),
            max_jobs: DEFAULT_MAX_JOBS,
            buffer_size: DEFAULT_BUFFER_SIZE,
            poll_delay_ms: DEFAULT_POLL_DELAY_MS,
            script_limit: DEFAULT_SCRIPT_LIMIT,
            stdout_limit,
            proc_limit,
            keepalive: DEFAULT_KEEPALIVE,
        })
    }
}

fn parse_optional(
    get: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<u64>, ConfigError> {
    match get(var) {
        Some(raw) => raw
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { var, value: raw }),
        None => Ok(None),
    }
}

fn hostname() -> Result<String, ConfigError> {
    let name = nix::unistd::gethostname()
        .map_err(|e| ConfigError::NoHostname(std::io::Error::from(e)))?;
    Ok(name.to_string_lossy().into_owned())
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
