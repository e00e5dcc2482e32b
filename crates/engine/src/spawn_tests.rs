// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn spawn_failure_code_is_the_reserved_exit_status() {
    assert_eq!(SPAWN_FAILURE_CODE, 0xEE);
}

#[test]
fn denylist_covers_node_config_terminal_and_ssh_state() {
    for key in ["GRID_HOST", "GRID_PASSWORD", "TERM", "SSH_CLIENT"] {
        assert!(ENV_DENYLIST.contains(&key));
    }
    assert!(ENV_DENYLIST.iter().all(|k| !k.is_empty()));
}

#[test]
fn missing_shell_classifies_as_exec_failure() {
    let err = io::Error::from(io::ErrorKind::NotFound);
    assert!(matches!(classify_spawn_error(err), gn_core::JobError::Exec(_)));
}

#[test]
fn descriptor_exhaustion_classifies_as_pipe_failure() {
    let err = io::Error::from_raw_os_error(libc::EMFILE);
    assert!(matches!(classify_spawn_error(err), gn_core::JobError::Pipe(_)));
}

#[test]
fn other_spawn_errors_classify_as_fork_failure() {
    let err = io::Error::from_raw_os_error(libc::ENOMEM);
    assert!(matches!(classify_spawn_error(err), gn_core::JobError::Fork(_)));
}
