// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The agent: one node's worth of process-wide state and the event loop
//! that drives it.
//!
//! Strictly single-threaded and cooperative: one executor owns the job
//! table, the broker connection, and the router. Each loop turn either
//! pumps the broker (which may synchronously dispatch a command) or pumps
//! the job engine; both are bounded, so nothing blocks indefinitely.

use std::io;
use std::time::Duration;

use tokio::signal::unix::{signal, SignalKind};
use tokio::time::MissedTickBehavior;
use tracing::info;

use crate::router::{self, Flow};
use gn_broker::{Broker, BrokerError, BrokerEvent, GridPublisher, Publisher};
use gn_core::{GridConfig, JobError};
use gn_engine::{EngineConfig, JobEngine};

/// Why the event loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    Shutdown,
    Reload,
}

pub(crate) struct Agent {
    config: GridConfig,
    engine: JobEngine,
    broker: Broker,
    publisher: Publisher,
}

impl Agent {
    /// Wire the engine's `stopped` reporting into the publisher and build
    /// the broker client. No I/O yet.
    pub fn new(config: GridConfig) -> Result<Self, JobError> {
        let broker = Broker::new(&config);
        let publisher = broker.publisher();
        let sink = publisher.clone();
        let engine = JobEngine::new(
            EngineConfig::from(&config),
            Box::new(move |jid, status| sink.job_stopped(jid, status)),
        )?;
        Ok(Self {
            config,
            engine,
            broker,
            publisher,
        })
    }

    /// Establish the initial broker session; failure here is fatal.
    pub async fn connect(&mut self) -> Result<(), BrokerError> {
        self.broker.connect().await
    }

    /// Run until something asks the node to stop.
    ///
    /// SIGINT and SIGTERM are equivalent to a `<node>/exit` command.
    pub async fn run(&mut self) -> io::Result<Outcome> {
        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;

        let mut pump = tokio::time::interval(Duration::from_millis(u64::from(
            self.config.poll_delay_ms,
        )));
        pump.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let outcome = loop {
            tokio::select! {
                event = self.broker.poll() => match event {
                    Ok(BrokerEvent::Message { topic, payload }) => {
                        let flow = router::handle_message(
                            &topic,
                            &payload,
                            &mut self.engine,
                            &self.publisher,
                            &self.config.node_name,
                        );
                        match flow {
                            Flow::Continue => {}
                            Flow::Shutdown => break Outcome::Shutdown,
                            Flow::Reload => break Outcome::Reload,
                        }
                    }
                    Ok(BrokerEvent::Connected) => info!("broker session established"),
                    Ok(BrokerEvent::Disconnected | BrokerEvent::Other) => {}
                    // Logged by the adapter; the backoff gate is armed and
                    // the next poll reconnects.
                    Err(_) => {}
                },

                _ = pump.tick() => self.engine.pump_once(),

                _ = sigint.recv() => {
                    info!("SIGINT received, shutting down");
                    break Outcome::Shutdown;
                }

                _ = sigterm.recv() => {
                    info!("SIGTERM received, shutting down");
                    break Outcome::Shutdown;
                }
            }
        };
        Ok(outcome)
    }

    /// Graceful teardown: farewell, disconnect. Running jobs are orphaned
    /// deliberately; dropping the engine removes the scripts directory.
    pub async fn shutdown(mut self) {
        self.broker.shutdown().await;
    }
}
