// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! gridnode daemon (gnd)
//!
//! Long-running grid node agent: connects to the pub/sub broker, accepts
//! shell-job submissions addressed to this node, relays the jobs' output
//! and lifecycle events back over the broker.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod agent;
mod router;

use std::os::unix::process::CommandExt;

use tracing::{error, info};

use crate::agent::{Agent, Outcome};
use gn_core::GridConfig;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Handle info flags before any config work
    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("gnd {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" | "help" => {
                println!("gnd {}", env!("CARGO_PKG_VERSION"));
                println!("gridnode daemon - runs shell jobs submitted over the grid broker");
                println!();
                println!("USAGE:");
                println!("    gnd");
                println!();
                println!("Configuration comes from GRID_* environment variables:");
                println!("    GRID_HOST       broker host (default: localhost)");
                println!("    GRID_PORT       broker port (default: 1883)");
                println!("    GRID_TLS        set to any value to enable TLS");
                println!("    GRID_USERNAME   broker username");
                println!("    GRID_PASSWORD   broker password");
                println!("    GRID_NODE_NAME  identity on the grid (default: hostname)");
                println!("    GRID_JOB_CWD    working dir for jobs (default: $HOME, else /)");
                println!();
                println!("OPTIONS:");
                println!("    -h, --help       Print help information");
                println!("    -v, --version    Print version information");
                return Ok(());
            }
            _ => {
                eprintln!("error: unexpected argument '{arg}'");
                eprintln!("Usage: gnd [--help | --version]");
                std::process::exit(1);
            }
        }
    }

    let config = match GridConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    };

    setup_logging();

    info!(
        node = %config.node_name,
        host = %config.host,
        port = config.port,
        tls = config.tls,
        "gridnode starting"
    );
    info!(
        username = config.username.as_deref().unwrap_or("(not set)"),
        password = if config.password.is_some() { "(set)" } else { "(not set)" },
        job_cwd = %config.job_cwd.display(),
        "configuration"
    );

    let mut agent = match Agent::new(config) {
        Ok(agent) => agent,
        Err(e) => {
            error!("could not initialize agent: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = agent.connect().await {
        error!("could not connect to broker: {e}");
        std::process::exit(1);
    }

    match agent.run().await? {
        Outcome::Shutdown => {
            agent.shutdown().await;
            info!("node stopped");
            Ok(())
        }
        Outcome::Reload => {
            // Re-exec in place. The broker socket dies without a DISCONNECT,
            // so the last will announces the gap until the new process
            // publishes its presence.
            info!("reloading: re-exec node binary");
            let exe = std::env::current_exe()?;
            let err = std::process::Command::new(exe).exec();
            // exec only returns on failure
            error!("could not re-exec: {err}");
            std::process::exit(1);
        }
    }
}

fn setup_logging() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
