// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! In-memory MQTT client.
//!
//! [`MemoryClient`] records everything a device asks of it and lets the
//! caller play the broker's part: accept or refuse connections, drop the
//! session, fail publishes, and inject inbound messages.

use std::collections::VecDeque;

use super::{ClientEvent, DisconnectReason, LastWill, Message, MqttClient, QoS};
use crate::error::ProtocolError;

/// One request recorded by a [`MemoryClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// `connect()` was called.
    Connect,
    /// `disconnect(force)` was called.
    Disconnect {
        /// Whether the disconnect was forced.
        force: bool,
    },
    /// A publish was accepted.
    Publish(Message),
    /// A subscription was accepted.
    Subscribe {
        /// Subscribed topic.
        topic: String,
        /// Requested QoS.
        qos: QoS,
    },
    /// An unsubscribe was accepted.
    Unsubscribe(String),
}

/// MQTT client that keeps all traffic in memory.
///
/// By default a `connect()` succeeds at once and the `Connected` event is
/// delivered on the next poll.
///
/// # Examples
///
/// ```
/// use homie_lib::protocol::{MemoryClient, MqttClient};
///
/// let mut client = MemoryClient::new();
/// client.connect();
/// assert!(client.is_connected());
/// ```
#[derive(Debug)]
pub struct MemoryClient {
    connected: bool,
    accept_connections: bool,
    fail_publishes: bool,
    fail_subscribes: bool,
    last_will: Option<LastWill>,
    operations: Vec<Operation>,
    subscriptions: Vec<String>,
    events: VecDeque<ClientEvent>,
    connect_attempts: u32,
    rejected: u32,
}

impl Default for MemoryClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryClient {
    /// Creates a client that accepts connections immediately.
    #[must_use]
    pub fn new() -> Self {
        Self {
            connected: false,
            accept_connections: true,
            fail_publishes: false,
            fail_subscribes: false,
            last_will: None,
            operations: Vec::new(),
            subscriptions: Vec::new(),
            events: VecDeque::new(),
            connect_attempts: 0,
            rejected: 0,
        }
    }

    /// Creates a client whose connection attempts stay pending until
    /// [`accept_connection`](Self::accept_connection) or
    /// [`refuse_connection`](Self::refuse_connection) is called.
    #[must_use]
    pub fn pending() -> Self {
        Self {
            accept_connections: false,
            ..Self::new()
        }
    }

    /// Completes a pending connection attempt.
    pub fn accept_connection(&mut self) {
        self.connected = true;
        self.events.push_back(ClientEvent::Connected {
            session_present: false,
        });
    }

    /// Fails a pending connection attempt.
    pub fn refuse_connection(&mut self) {
        self.connected = false;
        self.events.push_back(ClientEvent::Disconnected {
            reason: DisconnectReason::Error("connection refused".to_string()),
        });
    }

    /// Drops an established session as if the broker went away.
    pub fn drop_connection(&mut self) {
        self.connected = false;
        self.subscriptions.clear();
        self.events.push_back(ClientEvent::Disconnected {
            reason: DisconnectReason::Closed,
        });
    }

    /// Makes every subsequent publish fail (or succeed again).
    pub fn set_fail_publishes(&mut self, fail: bool) {
        self.fail_publishes = fail;
    }

    /// Makes every subsequent subscribe fail (or succeed again).
    pub fn set_fail_subscribes(&mut self, fail: bool) {
        self.fail_subscribes = fail;
    }

    /// Queues an inbound message as a single chunk.
    pub fn inject(&mut self, topic: impl Into<String>, payload: impl Into<Vec<u8>>) {
        let payload = payload.into();
        let total = payload.len();
        self.events.push_back(ClientEvent::Message {
            topic: topic.into(),
            payload,
            retain: false,
            index: 0,
            total,
        });
    }

    /// Queues an arbitrary event.
    pub fn push_event(&mut self, event: ClientEvent) {
        self.events.push_back(event);
    }

    /// Returns all recorded operations in order.
    #[must_use]
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// Returns the accepted publishes in order.
    #[must_use]
    pub fn published(&self) -> Vec<&Message> {
        self.operations
            .iter()
            .filter_map(|op| match op {
                Operation::Publish(msg) => Some(msg),
                _ => None,
            })
            .collect()
    }

    /// Returns the last accepted payload published on `topic`.
    #[must_use]
    pub fn last_payload(&self, topic: &str) -> Option<&str> {
        self.published()
            .into_iter()
            .rev()
            .find(|msg| msg.topic == topic)
            .map(|msg| msg.payload.as_str())
    }

    /// Returns the topics currently subscribed.
    #[must_use]
    pub fn subscriptions(&self) -> &[String] {
        &self.subscriptions
    }

    /// Returns how many times `connect()` was called.
    #[must_use]
    pub fn connect_attempts(&self) -> u32 {
        self.connect_attempts
    }

    /// Returns how many publishes and subscribes were refused while
    /// connected.
    #[must_use]
    pub fn rejected_requests(&self) -> u32 {
        self.rejected
    }

    /// Returns the registered last will.
    #[must_use]
    pub fn last_will(&self) -> Option<&LastWill> {
        self.last_will.as_ref()
    }

    /// Forgets all recorded operations.
    pub fn clear_operations(&mut self) {
        self.operations.clear();
    }
}

impl MqttClient for MemoryClient {
    fn set_last_will(&mut self, will: LastWill) {
        self.last_will = Some(will);
    }

    fn connect(&mut self) {
        self.connect_attempts += 1;
        self.operations.push(Operation::Connect);
        if self.accept_connections {
            self.accept_connection();
        }
    }

    fn disconnect(&mut self, force: bool) {
        self.operations.push(Operation::Disconnect { force });
        self.subscriptions.clear();
        if self.connected {
            self.connected = false;
            self.events.push_back(ClientEvent::Disconnected {
                reason: DisconnectReason::Requested,
            });
        }
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn publish(&mut self, message: &Message) -> Result<(), ProtocolError> {
        if !self.connected {
            return Err(ProtocolError::NotConnected);
        }
        if self.fail_publishes {
            self.rejected += 1;
            return Err(ProtocolError::Rejected("publish queue full".to_string()));
        }
        self.operations.push(Operation::Publish(message.clone()));
        Ok(())
    }

    fn subscribe(&mut self, topic: &str, qos: QoS) -> Result<(), ProtocolError> {
        if !self.connected {
            return Err(ProtocolError::NotConnected);
        }
        if self.fail_subscribes {
            self.rejected += 1;
            return Err(ProtocolError::Rejected("subscribe queue full".to_string()));
        }
        self.operations.push(Operation::Subscribe {
            topic: topic.to_string(),
            qos,
        });
        if !self.subscriptions.iter().any(|t| t == topic) {
            self.subscriptions.push(topic.to_string());
        }
        Ok(())
    }

    fn unsubscribe(&mut self, topic: &str) -> Result<(), ProtocolError> {
        if !self.connected {
            return Err(ProtocolError::NotConnected);
        }
        self.operations.push(Operation::Unsubscribe(topic.to_string()));
        self.subscriptions.retain(|t| t != topic);
        Ok(())
    }

    fn poll_event(&mut self) -> Option<ClientEvent> {
        self.events.pop_front()
    }
}
