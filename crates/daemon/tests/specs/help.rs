//! Help and version output specs.

use crate::prelude::*;

#[test]
fn version_flag_prints_the_version() {
    gnd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicates::str::contains("gnd 0.1"));
}

#[test]
fn help_flag_prints_usage_and_the_env_contract() {
    gnd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicates::str::contains("USAGE"))
        .stdout(predicates::str::contains("GRID_NODE_NAME"));
}

#[test]
fn unexpected_arguments_are_rejected() {
    gnd()
        .arg("--frobnicate")
        .assert()
        .failure()
        .stderr(predicates::str::contains("unexpected argument"));
}
