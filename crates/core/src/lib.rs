// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Core types shared across the gridnode workspace: job identifiers,
//! configuration, the error taxonomy, and output stream tags.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod config;
pub mod error;
pub mod jid;
pub mod stream;

pub use config::{ConfigError, GridConfig};
pub use error::JobError;
pub use jid::Jid;
pub use stream::OutputStream;
