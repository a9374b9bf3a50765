// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Homie devices.
//!
//! A [`Device`] owns its nodes, the MQTT client, the incoming topic router
//! and every timer of the protocol. It never blocks and never spawns: the
//! host calls [`Device::tick`] roughly every 100 ms (see
//! [`PollDriver`](crate::PollDriver)) and the device does whatever is due.
//!
//! # Lifecycle
//!
//! ```text
//!   Idle ──connect()──► Connecting ──Connected──► Publishing(stage 0..5) ──► Ready
//!    ▲                      │                            │                    │
//!    └──── failure/timeout ─┘                            └──── lost ──────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use homie_lib::network::StaticNetwork;
//! use homie_lib::protocol::MemoryClient;
//! use homie_lib::{DataType, Device, Node, Property, PublishCoordinator};
//!
//! let mut device = Device::new("kitchen", "Kitchen", MemoryClient::new())
//!     .with_coordinator(PublishCoordinator::new());
//! let light = device
//!     .add_node(Node::new("light", "Light", "light"))
//!     .unwrap();
//! let power = device
//!     .add_property(light, Property::new("power", "Power", DataType::Boolean).with_settable(true))
//!     .unwrap();
//!
//! device.init();
//! let network = StaticNetwork::default();
//! for step in 0..40 {
//!     device.tick(Duration::from_millis(step * 100), &network);
//! }
//! assert!(device.is_ready());
//!
//! device.set_value(power, "true").unwrap();
//! assert_eq!(device.value(power), Some("true"));
//! ```

mod link;
mod publishing;
mod state;
mod stats;

pub use state::{ConnectionState, Stage};

use std::time::Duration;

use link::{Link, METADATA_QOS, WILL_QOS};
use stats::Uptime;

use crate::backoff::reconnect_interval;
use crate::config::DeviceOptions;
use crate::coordinator::{DeviceKey, PublishCoordinator};
use crate::error::DeviceError;
use crate::network::Network;
use crate::node::{Node, NodeId};
use crate::property::{Property, PropertyId, Reception};
use crate::protocol::{ClientEvent, DisconnectReason, LastWill, Message, MqttClient, QoS, TopicRouter};

/// Version advertised on `$homie`.
pub const HOMIE_VERSION: &str = "3.0.1";

/// A Homie device bound to one MQTT client.
#[derive(Debug)]
pub struct Device<C: MqttClient> {
    key: DeviceKey,
    id: String,
    name: String,
    topic: String,
    nodes: Vec<Node>,
    link: Link<C>,
    router: TopicRouter,
    coordinator: PublishCoordinator,
    options: DeviceOptions,
    state: ConnectionState,
    initialized: bool,
    reconnect_failures: u32,
    last_reconnect: Option<Duration>,
    next_publish_attempt: Option<Duration>,
    properties_advertised: usize,
    next_stats_at: Option<Duration>,
    defaults_due: Option<Duration>,
    uptime: Uptime,
    last_signal: Option<i32>,
}

impl<C: MqttClient> Device<C> {
    /// Creates a device with no nodes.
    ///
    /// `id` must be topic-safe; see
    /// [`device_id_from_name`](crate::util::device_id_from_name).
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, client: C) -> Self {
        Self {
            key: DeviceKey::next(),
            id: id.into(),
            name: name.into(),
            topic: String::new(),
            nodes: Vec::new(),
            link: Link::new(client),
            router: TopicRouter::new(),
            coordinator: PublishCoordinator::global(),
            options: DeviceOptions::default(),
            state: ConnectionState::Idle,
            initialized: false,
            reconnect_failures: 0,
            last_reconnect: None,
            next_publish_attempt: None,
            properties_advertised: 0,
            next_stats_at: None,
            defaults_due: None,
            uptime: Uptime::default(),
            last_signal: None,
        }
    }

    /// Replaces the process-wide publish coordinator.
    #[must_use]
    pub fn with_coordinator(mut self, coordinator: PublishCoordinator) -> Self {
        self.coordinator = coordinator;
        self
    }

    /// Replaces the timing options.
    #[must_use]
    pub fn with_options(mut self, options: DeviceOptions) -> Self {
        self.options = options;
        self
    }

    /// Appends a node.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::AlreadyInitialized`] after [`init`](Self::init).
    pub fn add_node(&mut self, node: Node) -> Result<NodeId, DeviceError> {
        if self.initialized {
            return Err(DeviceError::AlreadyInitialized(self.id.clone()));
        }
        self.nodes.push(node);
        Ok(NodeId::new(self.nodes.len() - 1))
    }

    /// Appends a property to `node`.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::AlreadyInitialized`] after [`init`](Self::init)
    /// and [`DeviceError::UnknownNode`] for a foreign handle.
    pub fn add_property(&mut self, node: NodeId, property: Property) -> Result<PropertyId, DeviceError> {
        if self.initialized {
            return Err(DeviceError::AlreadyInitialized(self.id.clone()));
        }
        let owner = self
            .nodes
            .get_mut(node.index())
            .ok_or(DeviceError::UnknownNode(node.index()))?;
        let index = owner.push(property);
        Ok(PropertyId::new(node.index(), index))
    }

    /// Freezes all topics and registers the last will.
    ///
    /// A device without nodes gets a placeholder node `dummy`. Calling
    /// `init` again has no effect until [`quit`](Self::quit).
    pub fn init(&mut self) {
        if self.initialized {
            return;
        }
        if self.topic.is_empty() {
            self.topic = format!("homie/{}", self.id);
            if self.nodes.is_empty() {
                self.nodes.push(Node::new("dummy", "No Nodes", ""));
            }
            for (index, node) in self.nodes.iter_mut().enumerate() {
                node.init(&self.topic, NodeId::new(index));
            }
        }
        self.link.client.set_last_will(self.last_will());
        self.link.clear_failures();
        self.initialized = true;
        tracing::debug!(device = %self.id, nodes = self.nodes.len(), "Device initialized");
    }

    /// Announces `$state=disconnected`, closes the session and stops ticking.
    pub fn quit(&mut self) {
        if !self.initialized {
            return;
        }
        let topic = self.state_topic();
        self.link.publish(&topic, "disconnected", METADATA_QOS, true);
        self.link.client.disconnect(false);
        self.coordinator.release(self.key);
        self.state = ConnectionState::Idle;
        self.next_stats_at = None;
        self.defaults_due = None;
        self.initialized = false;
        tracing::info!(device = %self.id, "Device stopped");
    }

    /// Advances the device to `now`.
    ///
    /// `now` is monotonic time since an arbitrary origin. Does nothing
    /// before [`init`](Self::init).
    pub fn tick(&mut self, now: Duration, network: &impl Network) {
        if !self.initialized {
            return;
        }
        self.link.set_now(now);

        while let Some(event) = self.link.client.poll_event() {
            self.handle_event(event, now);
        }

        self.advance_clock(now, network);

        if !network.is_connected() {
            self.uptime.link_down();
            return;
        }

        if self.state.is_connected() {
            self.run_initial_publishing(now, network);

            if self.next_stats_at.is_none_or(|at| now >= at) {
                self.publish_stats(now, network);
            }

            if let Some(due) = self.defaults_due
                && now >= due
            {
                self.defaults_due = None;
                self.publish_missing_defaults();
            }

            if self.link.take_reset() {
                self.connection_lost();
            }
        } else {
            self.uptime.session_down();
            self.next_stats_at = None;
            self.maintain_connection(now);
        }
    }

    /// Applies one client event. [`tick`](Self::tick) calls this for every
    /// event the client has queued.
    pub fn handle_event(&mut self, event: ClientEvent, now: Duration) {
        match event {
            ClientEvent::Connected { session_present } => self.on_connect(session_present),
            ClientEvent::Disconnected { reason } => self.on_disconnect(&reason, now),
            ClientEvent::Message {
                topic,
                payload,
                index,
                ..
            } => self.on_message(&topic, &payload, index),
        }
    }

    fn on_connect(&mut self, session_present: bool) {
        tracing::info!(device = %self.id, session_present, "MQTT connected, starting initial publishing");
        self.state = ConnectionState::Publishing(Stage::Announce);
        self.next_publish_attempt = None;
        self.properties_advertised = 0;
        self.reconnect_failures = 0;
        self.next_stats_at = None;
        self.defaults_due = None;
        self.uptime.session_down();
    }

    fn on_disconnect(&mut self, reason: &DisconnectReason, now: Duration) {
        match self.state {
            ConnectionState::Connecting { .. } => {
                self.reconnect_failures = self.reconnect_failures.saturating_add(1);
                self.last_reconnect = Some(now);
                self.state = ConnectionState::Idle;
                tracing::warn!(
                    device = %self.id,
                    ?reason,
                    failures = self.reconnect_failures,
                    retry_in_ms = reconnect_interval(self.reconnect_failures).as_millis(),
                    "MQTT connection failed"
                );
            }
            ConnectionState::Publishing(_) | ConnectionState::Ready => {
                tracing::warn!(device = %self.id, ?reason, "MQTT connection lost");
                self.connection_lost();
            }
            ConnectionState::Idle => {
                tracing::debug!(device = %self.id, ?reason, "MQTT session closed");
            }
        }
    }

    fn on_message(&mut self, topic: &str, payload: &[u8], index: usize) {
        if index != 0 {
            tracing::trace!(topic = %topic, index, "Ignoring continuation chunk");
            return;
        }
        let Some(id) = self.router.lookup(topic) else {
            tracing::trace!(topic = %topic, "No route for message");
            return;
        };
        let Ok(payload) = std::str::from_utf8(payload) else {
            tracing::warn!(topic = %topic, "Dropping non UTF-8 payload");
            return;
        };
        let Some(property) = self
            .nodes
            .get_mut(id.node_index())
            .and_then(|node| node.property_mut(id.index()))
        else {
            return;
        };

        match property.receive(topic, payload) {
            Reception::Retained => {
                self.router.remove(property.topic());
                self.link.unsubscribe(property.topic());
            }
            Reception::Accepted if !property.is_standard_mqtt() => {
                self.link.publish_value(property);
            }
            Reception::Accepted | Reception::Rejected => {}
        }
    }

    fn connection_lost(&mut self) {
        self.link.clear_failures();
        self.coordinator.release(self.key);
        self.state = ConnectionState::Idle;
        self.next_stats_at = None;
        self.defaults_due = None;
        self.uptime.session_down();
    }

    fn maintain_connection(&mut self, now: Duration) {
        match self.state {
            ConnectionState::Idle => {
                let interval = reconnect_interval(self.reconnect_failures);
                if self
                    .last_reconnect
                    .is_none_or(|last| now.saturating_sub(last) > interval)
                {
                    tracing::info!(
                        device = %self.id,
                        failures = self.reconnect_failures,
                        "Connecting to MQTT broker"
                    );
                    self.state = ConnectionState::Connecting { since: now };
                    self.link.clear_failures();
                    self.link.client.connect();
                }
            }
            ConnectionState::Connecting { since } => {
                if now.saturating_sub(since) > self.options.connect_timeout {
                    self.reconnect_failures = self.reconnect_failures.saturating_add(1);
                    self.last_reconnect = Some(now);
                    self.state = ConnectionState::Idle;
                    tracing::warn!(
                        device = %self.id,
                        failures = self.reconnect_failures,
                        "MQTT connection attempt timed out"
                    );
                    self.link.client.disconnect(true);
                }
            }
            ConnectionState::Publishing(_) | ConnectionState::Ready => {}
        }
    }

    /// Validates `raw`, stores it and publishes it when accepted.
    ///
    /// Returns whether the value was accepted.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::UnknownProperty`] for a foreign handle.
    pub fn set_value(&mut self, id: PropertyId, raw: &str) -> Result<bool, DeviceError> {
        let property = self
            .nodes
            .get_mut(id.node_index())
            .and_then(|node| node.property_mut(id.index()))
            .ok_or(DeviceError::UnknownProperty {
                node: id.node_index(),
                property: id.index(),
            })?;

        if !property.set_value_constrained(raw) {
            return Ok(false);
        }
        self.link.publish_value(property);
        Ok(true)
    }

    /// Sets a boolean value. See [`set_value`](Self::set_value).
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::UnknownProperty`] for a foreign handle.
    pub fn set_bool(&mut self, id: PropertyId, value: bool) -> Result<bool, DeviceError> {
        self.set_value(id, if value { "true" } else { "false" })
    }

    /// Returns the current value of a property.
    #[must_use]
    pub fn value(&self, id: PropertyId) -> Option<&str> {
        self.property(id).map(Property::value)
    }

    /// Publishes the current value of a property.
    ///
    /// Returns `false` when not connected, not initialized, for
    /// standard-MQTT properties, or when the client refused the publish.
    pub fn publish(&mut self, id: PropertyId) -> bool {
        match self
            .nodes
            .get(id.node_index())
            .and_then(|node| node.property(id.index()))
        {
            Some(property) => self.link.publish_value(property),
            None => false,
        }
    }

    /// Publishes a raw message outside the protocol's failure tracking.
    pub fn publish_direct(&mut self, topic: &str, qos: QoS, retain: bool, payload: &str) -> bool {
        self.link
            .client
            .publish(&Message::new(topic, payload, qos, retain))
            .is_ok()
    }

    /// Returns the last will registered at [`init`](Self::init).
    #[must_use]
    pub fn last_will(&self) -> LastWill {
        LastWill {
            topic: self.state_topic(),
            payload: "lost".to_string(),
            qos: WILL_QOS,
            retain: true,
        }
    }

    /// Returns the device id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the human readable name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `homie/<id>` (empty before initialization).
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Returns the process-unique key used with the coordinator.
    #[must_use]
    pub fn key(&self) -> DeviceKey {
        self.key
    }

    /// Returns the timing options.
    #[must_use]
    pub fn options(&self) -> &DeviceOptions {
        &self.options
    }

    /// Returns the nodes in advertisement order.
    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Returns a node.
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    /// Returns a property.
    #[must_use]
    pub fn property(&self, id: PropertyId) -> Option<&Property> {
        self.nodes
            .get(id.node_index())
            .and_then(|node| node.property(id.index()))
    }

    /// Returns a property mutably, e.g. to register callbacks.
    pub fn property_mut(&mut self, id: PropertyId) -> Option<&mut Property> {
        self.nodes
            .get_mut(id.node_index())
            .and_then(|node| node.property_mut(id.index()))
    }

    /// Looks a property up by node id and property id.
    #[must_use]
    pub fn find_property(&self, node_id: &str, property_id: &str) -> Option<PropertyId> {
        let node = self.nodes.iter().position(|n| n.id() == node_id)?;
        let property = self.nodes[node].position(property_id)?;
        Some(PropertyId::new(node, property))
    }

    /// Returns the connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Returns whether [`init`](Self::init) has run.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Returns whether the client reports an established session.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.link.is_connected()
    }

    /// Returns whether the initial advertisement has completed.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state == ConnectionState::Ready
    }

    /// Returns the number of failed connection attempts since the last success.
    #[must_use]
    pub fn reconnect_failures(&self) -> u32 {
        self.reconnect_failures
    }

    /// Returns the number of routed inbound topics.
    #[must_use]
    pub fn routed_topics(&self) -> usize {
        self.router.len()
    }

    /// Returns the MQTT client.
    #[must_use]
    pub fn client(&self) -> &C {
        &self.link.client
    }

    /// Returns the MQTT client mutably.
    pub fn client_mut(&mut self) -> &mut C {
        &mut self.link.client
    }

    fn state_topic(&self) -> String {
        format!("{}/$state", self.topic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::StaticNetwork;
    use crate::protocol::{MemoryClient, Operation};
    use crate::types::DataType;

    const STEP: Duration = Duration::from_millis(100);

    fn device(client: MemoryClient) -> (Device<MemoryClient>, PropertyId) {
        let mut device = Device::new("kitchen", "Kitchen", client)
            .with_coordinator(PublishCoordinator::new());
        let light = device.add_node(Node::new("light", "Light", "light")).unwrap();
        let power = device
            .add_property(
                light,
                Property::new("power", "Power", DataType::Boolean).with_settable(true),
            )
            .unwrap();
        device.init();
        (device, power)
    }

    fn run(device: &mut Device<MemoryClient>, from: Duration, to: Duration) -> Duration {
        let network = StaticNetwork::default();
        let mut now = from;
        while now <= to {
            device.tick(now, &network);
            now += STEP;
        }
        now
    }

    #[test]
    fn tick_before_init_does_nothing() {
        let mut device = Device::new("kitchen", "Kitchen", MemoryClient::new());
        device.tick(Duration::ZERO, &StaticNetwork::default());
        assert!(device.client().operations().is_empty());
    }

    #[test]
    fn init_adds_placeholder_node() {
        let mut device = Device::new("bare", "Bare", MemoryClient::new());
        device.init();
        assert_eq!(device.topic(), "homie/bare");
        assert_eq!(device.nodes().len(), 1);
        assert_eq!(device.nodes()[0].id(), "dummy");
        assert_eq!(device.nodes()[0].name(), "No Nodes");
    }

    #[test]
    fn topology_frozen_after_init() {
        let (mut device, _) = device(MemoryClient::new());
        assert!(matches!(
            device.add_node(Node::new("x", "X", "")),
            Err(DeviceError::AlreadyInitialized(_))
        ));
        assert!(matches!(
            device.add_property(NodeId::new(0), Property::new("x", "X", DataType::String)),
            Err(DeviceError::AlreadyInitialized(_))
        ));
    }

    #[test]
    fn unknown_node_rejected() {
        let mut device = Device::new("d", "D", MemoryClient::new());
        assert!(matches!(
            device.add_property(NodeId::new(3), Property::new("x", "X", DataType::String)),
            Err(DeviceError::UnknownNode(3))
        ));
    }

    #[test]
    fn last_will_registered_at_init() {
        let (device, _) = device(MemoryClient::new());
        let will = device.client().last_will().unwrap();
        assert_eq!(will.topic, "homie/kitchen/$state");
        assert_eq!(will.payload, "lost");
        assert_eq!(will.qos, QoS::ExactlyOnce);
        assert!(will.retain);
    }

    #[test]
    fn reaches_ready() {
        let (mut device, _) = device(MemoryClient::new());
        run(&mut device, Duration::ZERO, Duration::from_secs(3));
        assert!(device.is_ready());
        assert_eq!(device.client().last_payload("homie/kitchen/$state"), Some("ready"));
        assert_eq!(device.routed_topics(), 2);
    }

    #[test]
    fn find_property_by_ids() {
        let (device, power) = device(MemoryClient::new());
        assert_eq!(device.find_property("light", "power"), Some(power));
        assert_eq!(device.find_property("light", "level"), None);
        assert_eq!(device.find_property("fan", "power"), None);
    }

    #[test]
    fn set_value_publishes_when_accepted() {
        let (mut device, power) = device(MemoryClient::new());
        run(&mut device, Duration::ZERO, Duration::from_secs(3));
        device.client_mut().clear_operations();

        assert!(device.set_value(power, "true").unwrap());
        assert!(!device.set_value(power, "on").unwrap());
        assert!(device.set_bool(power, false).unwrap());

        let payloads: Vec<_> = device
            .client()
            .published()
            .iter()
            .map(|m| m.payload.clone())
            .collect();
        assert_eq!(payloads, ["true", "false"]);
        assert_eq!(device.value(power), Some("false"));
    }

    #[test]
    fn set_value_unknown_property() {
        let (mut device, _) = device(MemoryClient::new());
        assert!(matches!(
            device.set_value(PropertyId::new(0, 9), "true"),
            Err(DeviceError::UnknownProperty { node: 0, property: 9 })
        ));
    }

    #[test]
    fn publish_direct_is_untracked() {
        let (mut device, _) = device(MemoryClient::new());
        run(&mut device, Duration::ZERO, Duration::from_secs(3));
        assert!(device.publish_direct("other/topic", QoS::AtMostOnce, false, "x"));

        device.client_mut().set_fail_publishes(true);
        assert!(!device.publish_direct("other/topic", QoS::AtMostOnce, false, "x"));
        assert!(!device.link.streak().is_active());
    }

    #[test]
    fn quit_announces_and_stops() {
        let (mut device, _) = device(MemoryClient::new());
        let now = run(&mut device, Duration::ZERO, Duration::from_secs(3));
        device.quit();

        assert!(!device.is_initialized());
        assert_eq!(device.state(), ConnectionState::Idle);
        assert_eq!(
            device.client().last_payload("homie/kitchen/$state"),
            Some("disconnected")
        );
        assert!(
            device
                .client()
                .operations()
                .contains(&Operation::Disconnect { force: false })
        );

        let before = device.client().operations().len();
        run(&mut device, now, now + Duration::from_secs(10));
        assert_eq!(device.client().operations().len(), before);
    }

    #[test]
    fn continuation_chunks_ignored() {
        let (mut device, power) = device(MemoryClient::new());
        let now = run(&mut device, Duration::ZERO, Duration::from_secs(3));
        device.client_mut().push_event(ClientEvent::Message {
            topic: "homie/kitchen/light/power/set".to_string(),
            payload: b"true".to_vec(),
            retain: false,
            index: 4,
            total: 8,
        });
        run(&mut device, now, now);
        assert_eq!(device.value(power), Some(""));
    }

    #[test]
    fn invalid_utf8_dropped() {
        let (mut device, power) = device(MemoryClient::new());
        let now = run(&mut device, Duration::ZERO, Duration::from_secs(3));
        device
            .client_mut()
            .inject("homie/kitchen/light/power/set", vec![0xff, 0xfe]);
        run(&mut device, now, now);
        assert_eq!(device.value(power), Some(""));
    }

    #[test]
    fn network_down_holds_counters() {
        let (mut device, _) = device(MemoryClient::new());
        let mut network = StaticNetwork::default();
        let mut now = Duration::ZERO;
        while now <= Duration::from_secs(5) {
            device.tick(now, &network);
            now += STEP;
        }
        assert_eq!(device.uptime_seconds(), 5);
        assert!(device.mqtt_uptime_seconds() > 0);

        network.set_connected(false);
        device.tick(now, &network);
        assert_eq!(device.wifi_uptime_seconds(), 0);
        assert_eq!(device.mqtt_uptime_seconds(), 0);
        assert_eq!(device.uptime_seconds(), 5);
    }
}
