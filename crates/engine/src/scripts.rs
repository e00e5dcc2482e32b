// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Temp-script storage for submitted commands.
//!
//! Every submission is written to its own script file under a per-instance
//! directory, so two nodes sharing a machine never race over each other's
//! files. The directory is removed wholesale when the engine is dropped;
//! individual scripts are unlinked as their jobs retire.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::warn;

/// Owns the per-instance scripts directory and the files inside it.
pub struct ScriptStore {
    dir: TempDir,
}

impl ScriptStore {
    /// Create the per-instance scripts directory.
    pub fn new() -> io::Result<Self> {
        let dir = tempfile::Builder::new().prefix("gridnode-").tempdir()?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Write `command` (truncated at `limit` bytes) plus a newline to a
    /// fresh script file and return its path.
    pub fn write(&self, command: &[u8], limit: usize) -> io::Result<PathBuf> {
        let body = &command[..command.len().min(limit)];
        let file = tempfile::Builder::new()
            .prefix("job-")
            .suffix(".sh")
            .tempfile_in(self.dir.path())?;
        let (mut file, path) = file.keep().map_err(|e| e.error)?;
        file.write_all(body)?;
        file.write_all(b"\n")?;
        Ok(path)
    }

    /// Unlink a script written by [`ScriptStore::write`].
    pub fn remove(&self, path: &Path) {
        if let Err(e) = std::fs::remove_file(path) {
            warn!(path = %path.display(), error = %e, "could not unlink job script");
        }
    }
}

#[cfg(test)]
#[path = "scripts_tests.rs"]
mod tests;
