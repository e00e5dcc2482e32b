//! Test helpers for behavioral specifications.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, dead_code)]

use std::time::Duration;

/// Hard ceiling on any single spec invocation.
const SPEC_TIMEOUT: Duration = Duration::from_secs(10);

/// A `gnd` command with a scrubbed environment and a safety timeout.
///
/// The inherited environment is cleared so a developer's real `GRID_*`
/// settings can never leak into a spec run.
pub fn gnd() -> assert_cmd::Command {
    let mut cmd = assert_cmd::Command::cargo_bin("gnd").unwrap();
    cmd.env_clear().timeout(SPEC_TIMEOUT);
    cmd
}
