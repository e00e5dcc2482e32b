//! Fatal-startup specs: bad configuration and unreachable brokers must
//! fail fast with a non-zero exit.

use crate::prelude::*;

#[test]
fn reserved_node_name_is_fatal() {
    gnd()
        .env("GRID_NODE_NAME", "grid")
        .assert()
        .failure()
        .stderr(predicates::str::contains("GRID_NODE_NAME"));
}

#[test]
fn malformed_port_is_fatal() {
    gnd()
        .env("GRID_NODE_NAME", "spec-node")
        .env("GRID_PORT", "not-a-port")
        .assert()
        .failure()
        .stderr(predicates::str::contains("GRID_PORT"));
}

#[test]
fn unreachable_broker_is_fatal() {
    gnd()
        .env("GRID_NODE_NAME", "spec-node")
        .env("GRID_HOST", "127.0.0.1")
        .env("GRID_PORT", "1")
        .assert()
        .failure()
        .stderr(predicates::str::contains("could not connect to broker"));
}
