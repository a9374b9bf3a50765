// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The MQTT client boundary.
//!
//! A [`Device`](crate::Device) never talks to the network itself. Every
//! connect, publish and subscribe goes through an [`MqttClient`], a
//! synchronous, non-blocking interface: each call returns immediately
//! with success or failure, and connection events and inbound messages
//! are collected by the client and handed out through
//! [`MqttClient::poll_event`] from inside the device's tick.
//!
//! # Clients
//!
//! - [`RumqttcClient`]: production client backed by `rumqttc` (feature `mqtt`)
//! - [`MemoryClient`]: in-memory client that records traffic, for tests
//!
//! # Routing
//!
//! [`TopicRouter`] maps full topic strings to the property that owns them.

mod broker_config;
mod memory;
#[cfg(feature = "mqtt")]
mod rumqttc_client;
mod topic_router;

pub use broker_config::{BrokerConfig, BrokerConfigBuilder};
pub use memory::{MemoryClient, Operation};
#[cfg(feature = "mqtt")]
pub use rumqttc_client::RumqttcClient;
pub use topic_router::TopicRouter;

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// MQTT quality of service level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QoS {
    /// QoS 0.
    AtMostOnce,
    /// QoS 1.
    AtLeastOnce,
    /// QoS 2.
    ExactlyOnce,
}

impl QoS {
    /// Returns the numeric level.
    #[must_use]
    pub const fn level(&self) -> u8 {
        match self {
            Self::AtMostOnce => 0,
            Self::AtLeastOnce => 1,
            Self::ExactlyOnce => 2,
        }
    }
}

#[cfg(feature = "mqtt")]
impl From<QoS> for rumqttc::QoS {
    fn from(qos: QoS) -> Self {
        match qos {
            QoS::AtMostOnce => Self::AtMostOnce,
            QoS::AtLeastOnce => Self::AtLeastOnce,
            QoS::ExactlyOnce => Self::ExactlyOnce,
        }
    }
}

/// An outbound publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Full topic.
    pub topic: String,
    /// UTF-8 payload.
    pub payload: String,
    /// Delivery guarantee requested from the broker.
    pub qos: QoS,
    /// Whether the broker keeps this as the topic's last value.
    pub retain: bool,
}

impl Message {
    /// Creates a new message.
    #[must_use]
    pub fn new(
        topic: impl Into<String>,
        payload: impl Into<String>,
        qos: QoS,
        retain: bool,
    ) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            qos,
            retain,
        }
    }
}

/// Last-will message registered with the broker at connect time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastWill {
    /// Topic the broker publishes to when the session dies.
    pub topic: String,
    /// Payload published by the broker.
    pub payload: String,
    /// QoS of the will publish.
    pub qos: QoS,
    /// Whether the will publish is retained.
    pub retain: bool,
}

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The local side asked to disconnect.
    Requested,
    /// The broker closed the session.
    Closed,
    /// Transport or protocol failure.
    Error(String),
}

/// Event produced by a client and consumed by a device tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// The broker accepted the connection.
    Connected {
        /// Whether the broker resumed a previous session.
        session_present: bool,
    },
    /// The connection attempt failed or an established session ended.
    Disconnected {
        /// Why the session ended.
        reason: DisconnectReason,
    },
    /// An inbound publish (or one chunk of it).
    Message {
        /// Full topic.
        topic: String,
        /// Raw payload bytes of this chunk.
        payload: Vec<u8>,
        /// Whether the broker flagged it as retained.
        retain: bool,
        /// Offset of this chunk in the whole payload.
        index: usize,
        /// Length of the whole payload.
        total: usize,
    },
}

/// Synchronous, non-blocking MQTT client used by a device.
///
/// Implementations queue work and return immediately; none of these
/// methods may wait on the network.
pub trait MqttClient {
    /// Sets the last will used by subsequent [`connect`](Self::connect) calls.
    fn set_last_will(&mut self, will: LastWill);

    /// Starts a connection attempt.
    ///
    /// Completion is reported later through [`ClientEvent::Connected`] or
    /// [`ClientEvent::Disconnected`].
    fn connect(&mut self);

    /// Drops the session. `force` discards any half-open state without
    /// a graceful MQTT DISCONNECT.
    fn disconnect(&mut self, force: bool);

    /// Returns whether a broker session is established.
    fn is_connected(&self) -> bool;

    /// Queues a publish.
    ///
    /// # Errors
    ///
    /// Returns error if the client is not connected or refuses the request.
    fn publish(&mut self, message: &Message) -> Result<(), ProtocolError>;

    /// Queues a subscription.
    ///
    /// # Errors
    ///
    /// Returns error if the client is not connected or refuses the request.
    fn subscribe(&mut self, topic: &str, qos: QoS) -> Result<(), ProtocolError>;

    /// Queues an unsubscribe.
    ///
    /// # Errors
    ///
    /// Returns error if the client is not connected or refuses the request.
    fn unsubscribe(&mut self, topic: &str) -> Result<(), ProtocolError>;

    /// Returns the next pending event, if any.
    fn poll_event(&mut self) -> Option<ClientEvent>;
}
