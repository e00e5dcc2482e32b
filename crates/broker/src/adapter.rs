// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Broker connection lifecycle.
//!
//! The node demands clean-session semantics: a submission queued while the
//! node was down must be dropped by the broker, not replayed into a
//! surprise job on reconnect. The last will mirrors the graceful farewell,
//! so the grid hears `node/disconnect` either way.

use rumqttc::{
    AsyncClient, ConnectionError, Event, LastWill, MqttOptions, Packet, QoS, TlsConfiguration,
    Transport,
};
use thiserror::Error;
use tokio::time::{sleep_until, timeout, timeout_at, Duration, Instant};
use tracing::{debug, info, warn};

use crate::backoff::Backoff;
use crate::publish::Publisher;
use crate::topics;
use gn_core::GridConfig;

/// Outstanding-request capacity of the client's internal queue.
const REQUEST_QUEUE_CAP: usize = 256;

/// How long the graceful shutdown waits for the farewell to flush.
const FAREWELL_FLUSH: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("could not reach broker: {0}")]
    Connect(#[source] ConnectionError),

    #[error("broker connection error: {0}")]
    Connection(#[source] ConnectionError),

    #[error("broker request failed: {0}")]
    Request(#[from] rumqttc::ClientError),
}

/// What one poll of the broker produced, reduced to what the node cares
/// about.
#[derive(Debug)]
pub enum BrokerEvent {
    /// Session established (initial connect or reconnect); subscriptions
    /// and the presence announcement have been re-issued.
    Connected,
    /// An inbound command addressed to this node or the grid.
    Message { topic: String, payload: Vec<u8> },
    /// The broker told us to go away; the next poll reconnects.
    Disconnected,
    /// Protocol chatter the node ignores (acks, pings, outgoing echoes).
    Other,
}

pub struct Broker {
    client: AsyncClient,
    eventloop: rumqttc::EventLoop,
    node_name: String,
    backoff: Backoff,
    retry_at: Option<Instant>,
}

impl Broker {
    /// Build the client from node configuration. No I/O happens until the
    /// first poll.
    pub fn new(config: &GridConfig) -> Self {
        let mut options = MqttOptions::new(config.node_name.as_str(), config.host.as_str(), config.port);
        options.set_keep_alive(config.keepalive);
        // Clean session: no durable subscription state, stale submissions
        // are dropped while we are away.
        options.set_clean_session(true);
        options.set_last_will(LastWill::new(
            topics::NODE_DISCONNECT,
            config.node_name.as_bytes().to_vec(),
            QoS::AtLeastOnce,
            false,
        ));
        if config.tls {
            options.set_transport(Transport::Tls(TlsConfiguration::Native));
        }
        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            options.set_credentials(user.as_str(), pass.as_str());
        }

        let (client, eventloop) = AsyncClient::new(options, REQUEST_QUEUE_CAP);
        Self {
            client,
            eventloop,
            node_name: config.node_name.clone(),
            backoff: Backoff::new(),
            retry_at: None,
        }
    }

    /// Handle used by the router and job callbacks to publish.
    pub fn publisher(&self) -> Publisher {
        Publisher::new(self.client.clone(), self.node_name.clone())
    }

    /// Drive the connection until the initial session is up. Any error
    /// before that point is fatal to startup.
    pub async fn connect(&mut self) -> Result<(), BrokerError> {
        loop {
            match self.eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    info!("connected to broker");
                    self.on_connected().await?;
                    return Ok(());
                }
                Ok(_) => {}
                Err(e) => return Err(BrokerError::Connect(e)),
            }
        }
    }

    /// One bounded pump of the broker connection.
    ///
    /// Errors arm the backoff gate; the next call waits it out before the
    /// client's internal reconnect runs. The caller keeps pumping jobs in
    /// the meantime.
    pub async fn poll(&mut self) -> Result<BrokerEvent, BrokerError> {
        if let Some(at) = self.retry_at.take() {
            sleep_until(at).await;
        }
        match self.eventloop.poll().await {
            Ok(event) => {
                self.backoff.reset();
                match event {
                    Event::Incoming(Packet::ConnAck(_)) => {
                        info!("reconnected to broker");
                        self.on_connected().await?;
                        Ok(BrokerEvent::Connected)
                    }
                    Event::Incoming(Packet::Publish(publish)) => Ok(BrokerEvent::Message {
                        topic: publish.topic,
                        payload: publish.payload.to_vec(),
                    }),
                    Event::Incoming(Packet::Disconnect) => {
                        warn!("broker sent disconnect");
                        Ok(BrokerEvent::Disconnected)
                    }
                    other => {
                        debug!(?other, "broker event");
                        Ok(BrokerEvent::Other)
                    }
                }
            }
            Err(e) => {
                let delay = self.backoff.next_delay();
                warn!(error = %e, retry_in_secs = delay.as_secs(), "broker connection error");
                self.retry_at = Some(Instant::now() + delay);
                Err(BrokerError::Connection(e))
            }
        }
    }

    /// Re-issue subscriptions and announce presence. Runs on every
    /// established session, initial or not.
    async fn on_connected(&mut self) -> Result<(), BrokerError> {
        self.client
            .subscribe(topics::node_commands(&self.node_name), QoS::ExactlyOnce)
            .await?;
        self.client
            .subscribe(topics::grid_broadcasts(), QoS::ExactlyOnce)
            .await?;
        self.client
            .publish(
                topics::NODE_CONNECT,
                QoS::AtLeastOnce,
                false,
                self.node_name.as_bytes().to_vec(),
            )
            .await?;
        Ok(())
    }

    /// Graceful teardown: say farewell, let it flush, disconnect.
    pub async fn shutdown(&mut self) {
        if let Err(e) = self
            .client
            .publish(
                topics::NODE_DISCONNECT,
                QoS::AtLeastOnce,
                false,
                self.node_name.as_bytes().to_vec(),
            )
            .await
        {
            warn!(error = %e, "could not send farewell");
        }

        let deadline = Instant::now() + FAREWELL_FLUSH;
        loop {
            match timeout_at(deadline, self.eventloop.poll()).await {
                Ok(Ok(Event::Incoming(Packet::PubAck(_)))) => break,
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    warn!(error = %e, "connection error during farewell");
                    break;
                }
                Err(_) => break,
            }
        }

        if let Err(e) = self.client.disconnect().await {
            warn!(error = %e, "could not disconnect from broker");
        }
        // Give the DISCONNECT frame a moment to flush.
        let _ = timeout(Duration::from_millis(250), self.eventloop.poll()).await;
        info!("disconnected from broker");
    }
}
