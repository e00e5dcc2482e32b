// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job table and subprocess lifecycle engine.
//!
//! Owns the bounded slot table, the three-pipe stdio harness around each
//! job shell, non-blocking stdin injection, process-group signalling, and
//! the per-tick pump that drains output, reaps children, and retires
//! finished slots.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod engine;
pub mod job;
pub mod scripts;
mod spawn;
pub mod table;

pub use engine::{EngineConfig, JobEngine, RollCall, StoppedFn, SubmitError};
pub use job::{Job, OutputFn, Transport};
pub use spawn::{ENV_DENYLIST, SPAWN_FAILURE_CODE};
