// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Outbound publication handle.
//!
//! [`GridPublisher`] is the seam between the router/engine and the broker:
//! production code uses [`Publisher`] (a clone-able wrapper over the MQTT
//! client), tests substitute a recorder. All methods are fire-and-forget;
//! a full client queue drops the message with a warning, which is the
//! backpressure story the output cap deliberately does not solve.

use rumqttc::{AsyncClient, QoS};
use tracing::warn;

use crate::topics;
use gn_core::{Jid, OutputStream};

/// Everything the node publishes onto the grid.
pub trait GridPublisher: Clone + 'static {
    /// `job/<jid>/startup`, empty payload.
    fn job_startup(&self, jid: Jid);
    /// `job/<jid>/reject` with the error kind as text.
    fn job_reject(&self, jid: Jid, reason: &str);
    /// `job/<jid>/stdout` or `.../stderr` with a chunk of raw bytes.
    fn job_chunk(&self, jid: Jid, stream: OutputStream, data: &[u8]);
    /// `job/<jid>/stopped` with the decimal wait status.
    fn job_stopped(&self, jid: Jid, status: i32);
    /// Node-wide narration on `node/announce` as `<node_name>: <text>`.
    fn announce(&self, text: &str);
    /// A JSON document on an arbitrary topic (roll calls).
    fn publish_json(&self, topic: &str, value: &serde_json::Value);
    /// Presence announcement on `node/connect`.
    fn presence(&self);
}

/// Production publisher over the shared MQTT client.
#[derive(Clone)]
pub struct Publisher {
    client: AsyncClient,
    node_name: String,
}

impl Publisher {
    pub(crate) fn new(client: AsyncClient, node_name: String) -> Self {
        Self { client, node_name }
    }

    fn send(&self, topic: String, qos: QoS, payload: Vec<u8>) {
        if let Err(e) = self.client.try_publish(topic.as_str(), qos, false, payload) {
            warn!(%topic, error = %e, "could not queue publication");
        }
    }
}

impl GridPublisher for Publisher {
    fn job_startup(&self, jid: Jid) {
        self.send(topics::job(jid, topics::VERB_STARTUP), QoS::ExactlyOnce, Vec::new());
    }

    fn job_reject(&self, jid: Jid, reason: &str) {
        self.send(
            topics::job(jid, topics::VERB_REJECT),
            QoS::ExactlyOnce,
            reason.as_bytes().to_vec(),
        );
    }

    fn job_chunk(&self, jid: Jid, stream: OutputStream, data: &[u8]) {
        self.send(topics::job_output(jid, stream), QoS::ExactlyOnce, data.to_vec());
    }

    fn job_stopped(&self, jid: Jid, status: i32) {
        self.send(
            topics::job(jid, topics::VERB_STOPPED),
            QoS::ExactlyOnce,
            status.to_string().into_bytes(),
        );
    }

    fn announce(&self, text: &str) {
        let line = format!("{}: {}", self.node_name, text);
        self.send(topics::NODE_ANNOUNCE.to_string(), QoS::AtLeastOnce, line.into_bytes());
    }

    fn publish_json(&self, topic: &str, value: &serde_json::Value) {
        self.send(topic.to_string(), QoS::AtLeastOnce, value.to_string().into_bytes());
    }

    fn presence(&self) {
        self.send(
            topics::NODE_CONNECT.to_string(),
            QoS::AtLeastOnce,
            self.node_name.clone().into_bytes(),
        );
    }
}
