// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Homie properties.
//!
//! A [`Property`] is one typed, addressable value of a node. It owns its
//! validation rules, its current value in canonical string form, and the
//! callbacks observing that value.
//!
//! # Topics
//!
//! ```text
//! homie/<device>/<node>/<property>          current value
//! homie/<device>/<node>/<property>/set      command topic (settable only)
//! homie/<device>/<node>/<property>/$name    metadata ($settable, $retained, ...)
//! ```
//!
//! A standard-MQTT property instead listens on an arbitrary external topic
//! and is never advertised.

mod validation;

use std::borrow::Cow;

pub use validation::validate;

use crate::error::ValueError;
use crate::node::NodeId;
use crate::subscription::{CallbackList, SubscriptionId};
use crate::types::DataType;

/// Handle to a property owned by a [`Device`](crate::Device).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PropertyId {
    node: usize,
    property: usize,
}

impl PropertyId {
    pub(crate) const fn new(node: usize, property: usize) -> Self {
        Self { node, property }
    }

    /// Returns the owning node.
    #[must_use]
    pub const fn node(&self) -> NodeId {
        NodeId::new(self.node)
    }

    /// Returns the position of the property within its node.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.property
    }

    pub(crate) const fn node_index(&self) -> usize {
        self.node
    }
}

/// What an inbound message did to a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Reception {
    /// First delivery on the value topic: the broker's retained copy.
    /// The value-topic subscription is no longer needed.
    Retained,
    /// A command was accepted and should be echoed on the value topic.
    Accepted,
    /// Validation failed; nothing changed.
    Rejected,
}

/// What publishing the current value involves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Outgoing<'a> {
    /// Nothing to send, and that counts as success.
    Nothing,
    /// The property cannot publish (not initialized or standard MQTT).
    Unavailable,
    /// Send `payload` on `topic`.
    Value {
        topic: &'a str,
        payload: Cow<'a, str>,
        retain: bool,
    },
}

/// A single named, typed value on a node.
///
/// # Examples
///
/// ```
/// use homie_lib::{DataType, Property};
///
/// let mut level = Property::new("level", "Level", DataType::Integer)
///     .with_settable(true)
///     .with_format("0:100")
///     .with_unit("%");
///
/// assert!(level.set_value_constrained("75"));
/// assert!(!level.set_value_constrained("150"));
/// assert_eq!(level.value(), "75");
/// ```
#[derive(Debug)]
pub struct Property {
    id: String,
    name: String,
    unit: String,
    datatype: DataType,
    format: String,
    settable: bool,
    retained: bool,
    publish_empty_string: bool,
    standard_mqtt: bool,
    topic: String,
    set_topic: String,
    value: String,
    received_retained: bool,
    callbacks: CallbackList<Property>,
    node: Option<NodeId>,
    initialized: bool,
}

impl Property {
    /// Creates a read-only, retained property with an empty value.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, datatype: DataType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            unit: String::new(),
            datatype,
            format: String::new(),
            settable: false,
            retained: true,
            publish_empty_string: true,
            standard_mqtt: false,
            topic: String::new(),
            set_topic: String::new(),
            value: String::new(),
            received_retained: false,
            callbacks: CallbackList::new(),
            node: None,
            initialized: false,
        }
    }

    /// Sets whether controllers may write the property through `/set`.
    #[must_use]
    pub fn with_settable(mut self, settable: bool) -> Self {
        self.settable = settable;
        self
    }

    /// Sets whether value publishes are retained (default: `true`).
    #[must_use]
    pub fn with_retained(mut self, retained: bool) -> Self {
        self.retained = retained;
        self
    }

    /// Sets the advertised unit.
    #[must_use]
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    /// Sets the format: `min:max` for numbers, the allow-list for enums.
    #[must_use]
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    /// Sets whether an empty value is published (default: `true`).
    #[must_use]
    pub fn with_publish_empty_string(mut self, publish: bool) -> Self {
        self.publish_empty_string = publish;
        self
    }

    /// Sets the initial value without validation.
    #[must_use]
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = value.into();
        self
    }

    /// Turns the property into a receive-only listener on an external topic.
    #[must_use]
    pub fn with_standard_mqtt(mut self, topic: impl Into<String>) -> Self {
        self.set_standard_mqtt(topic);
        self
    }

    /// Turns the property into a receive-only listener on an external topic.
    ///
    /// The property is then settable, not retained, has no `/set` topic and
    /// is left out of the Homie advertisement. Has no effect once the
    /// property is initialized; returns whether it applied.
    pub fn set_standard_mqtt(&mut self, topic: impl Into<String>) -> bool {
        if self.initialized {
            return false;
        }
        self.standard_mqtt = true;
        self.retained = false;
        self.settable = true;
        self.topic = topic.into();
        self.set_topic.clear();
        true
    }

    /// Returns the property id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the human readable name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the unit (may be empty).
    #[must_use]
    pub fn unit(&self) -> &str {
        &self.unit
    }

    /// Returns the datatype.
    #[must_use]
    pub fn datatype(&self) -> DataType {
        self.datatype
    }

    /// Returns the format constraint (may be empty).
    #[must_use]
    pub fn format(&self) -> &str {
        &self.format
    }

    /// Returns whether the property accepts commands.
    #[must_use]
    pub fn is_settable(&self) -> bool {
        self.settable
    }

    /// Returns whether value publishes are retained.
    #[must_use]
    pub fn is_retained(&self) -> bool {
        self.retained
    }

    /// Returns whether an empty value is published.
    #[must_use]
    pub fn publishes_empty_string(&self) -> bool {
        self.publish_empty_string
    }

    /// Returns whether this is a standard-MQTT passthrough.
    #[must_use]
    pub fn is_standard_mqtt(&self) -> bool {
        self.standard_mqtt
    }

    /// Returns the value topic (empty before initialization, unless standard MQTT).
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Returns the `/set` topic of an initialized, settable Homie property.
    #[must_use]
    pub fn set_topic(&self) -> Option<&str> {
        (self.initialized && self.settable && !self.standard_mqtt)
            .then_some(self.set_topic.as_str())
    }

    /// Returns the current value in canonical form.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Returns whether the broker's retained value has been reconciled.
    #[must_use]
    pub fn has_received_retained(&self) -> bool {
        self.received_retained
    }

    /// Returns the owning node once the property is attached to a device.
    #[must_use]
    pub fn node(&self) -> Option<NodeId> {
        self.node
    }

    /// Returns whether topics are frozen.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Returns the payload published in place of an empty value.
    #[must_use]
    pub fn default_payload(&self) -> Cow<'_, str> {
        match self.datatype {
            DataType::Enum => Cow::Borrowed(self.format.split(',').next().unwrap_or_default()),
            other => Cow::Borrowed(other.default_payload()),
        }
    }

    /// Registers a callback run after an inbound value is accepted.
    ///
    /// Callbacks run in registration order, synchronously, from inside the
    /// device tick that delivered the message.
    pub fn on_change<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: Fn(&Property) + Send + Sync + 'static,
    {
        self.callbacks.register(callback)
    }

    /// Removes a callback registered with [`on_change`](Self::on_change).
    pub fn remove_callback(&mut self, id: SubscriptionId) -> bool {
        self.callbacks.remove(id)
    }

    /// Checks `raw` against the datatype without storing it.
    ///
    /// # Errors
    ///
    /// Returns the reason `raw` is not acceptable.
    pub fn validate(&self, raw: &str) -> Result<String, ValueError> {
        validate(self.datatype, &self.format, raw)
    }

    /// Validates `raw` and stores its canonical form if acceptable.
    ///
    /// Nothing is published. Rejected input leaves the value unchanged and
    /// is reported as a warning.
    pub fn set_value_constrained(&mut self, raw: &str) -> bool {
        match self.validate(raw) {
            Ok(value) => {
                self.value = value;
                true
            }
            Err(e) => {
                tracing::warn!(
                    property = %self.id,
                    payload = %raw,
                    error = %e,
                    "Ignoring invalid payload"
                );
                false
            }
        }
    }

    /// Freezes the topics under `node_topic`. Only the first call has an effect.
    pub(crate) fn init(&mut self, node_topic: &str, node: NodeId) {
        if self.initialized {
            return;
        }
        self.node = Some(node);
        if !self.standard_mqtt {
            self.topic = format!("{node_topic}/{}", self.id);
            self.set_topic = format!("{}/set", self.topic);
        }
        self.initialized = true;
    }

    /// Marks the property as waiting for the broker's retained value.
    pub(crate) fn expect_retained(&mut self) {
        self.received_retained = false;
    }

    /// Returns whether the property subscribes to its own value topic to
    /// recover the broker's retained copy.
    pub(crate) fn bootstraps_from_retained(&self) -> bool {
        self.settable && self.retained && !self.standard_mqtt
    }

    /// Gives up waiting for a retained value.
    ///
    /// Returns `true` if the caller should drop the value-topic subscription
    /// and publish the in-memory value instead.
    pub(crate) fn settle_missing_retained(&mut self) -> bool {
        if !self.bootstraps_from_retained() || self.received_retained {
            return false;
        }
        self.received_retained = true;
        !self.value.is_empty()
    }

    /// Applies an inbound payload that arrived on `topic`.
    pub(crate) fn receive(&mut self, topic: &str, payload: &str) -> Reception {
        let accepted = self.set_value_constrained(payload);
        if accepted {
            self.callbacks.dispatch(self);
        }

        if self.bootstraps_from_retained() && topic == self.topic {
            tracing::debug!(
                property = %self.id,
                topic = %topic,
                "Received retained value, dropping value topic subscription"
            );
            self.received_retained = true;
            return Reception::Retained;
        }

        if accepted {
            Reception::Accepted
        } else {
            Reception::Rejected
        }
    }

    /// Describes the publish of the current value.
    pub(crate) fn outgoing(&self) -> Outgoing<'_> {
        if !self.initialized || self.standard_mqtt {
            return Outgoing::Unavailable;
        }

        let payload = if self.value.is_empty() {
            if !self.publish_empty_string {
                return Outgoing::Nothing;
            }
            if self.datatype.allows_empty() {
                Cow::Borrowed("")
            } else {
                tracing::debug!(property = %self.id, "Empty value, substituting default");
                self.default_payload()
            }
        } else {
            Cow::Borrowed(self.value.as_str())
        };

        Outgoing::Value {
            topic: &self.topic,
            payload,
            retain: self.retained,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn initialized(property: Property) -> Property {
        let mut property = property;
        property.init("homie/kitchen/light", NodeId::new(0));
        property
    }

    #[test]
    fn defaults() {
        let prop = Property::new("power", "Power", DataType::Boolean);
        assert!(!prop.is_settable());
        assert!(prop.is_retained());
        assert!(prop.publishes_empty_string());
        assert!(!prop.is_standard_mqtt());
        assert!(!prop.is_initialized());
        assert_eq!(prop.value(), "");
    }

    #[test]
    fn init_composes_topics() {
        let prop = initialized(Property::new("power", "Power", DataType::Boolean).with_settable(true));
        assert_eq!(prop.topic(), "homie/kitchen/light/power");
        assert_eq!(prop.set_topic(), Some("homie/kitchen/light/power/set"));
        assert_eq!(prop.node(), Some(NodeId::new(0)));
    }

    #[test]
    fn init_only_once() {
        let mut prop = initialized(Property::new("power", "Power", DataType::Boolean));
        prop.init("homie/other/node", NodeId::new(3));
        assert_eq!(prop.topic(), "homie/kitchen/light/power");
        assert_eq!(prop.node(), Some(NodeId::new(0)));
    }

    #[test]
    fn read_only_has_no_set_topic() {
        let prop = initialized(Property::new("temp", "Temperature", DataType::Float));
        assert_eq!(prop.set_topic(), None);
    }

    #[test]
    fn standard_mqtt_keeps_external_topic() {
        let prop = initialized(
            Property::new("ext", "External", DataType::String).with_standard_mqtt("zigbee/door"),
        );
        assert_eq!(prop.topic(), "zigbee/door");
        assert_eq!(prop.set_topic(), None);
        assert!(prop.is_settable());
        assert!(!prop.is_retained());
    }

    #[test]
    fn standard_mqtt_refused_after_init() {
        let mut prop = initialized(Property::new("a", "A", DataType::String));
        assert!(!prop.set_standard_mqtt("other/topic"));
        assert!(!prop.is_standard_mqtt());
    }

    #[test]
    fn rejected_value_is_unchanged() {
        let mut prop = Property::new("mode", "Mode", DataType::Enum)
            .with_format("red,green,blue")
            .with_value("red");
        assert!(prop.set_value_constrained("green"));
        assert_eq!(prop.value(), "green");
        assert!(!prop.set_value_constrained("purple"));
        assert_eq!(prop.value(), "green");
    }

    #[test]
    fn callbacks_only_on_accepted_messages() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut prop = initialized(
            Property::new("power", "Power", DataType::Boolean)
                .with_settable(true)
                .with_retained(false),
        );
        let counter = Arc::clone(&calls);
        prop.on_change(move |p| {
            assert_eq!(p.value(), "true");
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(
            prop.receive("homie/kitchen/light/power/set", "true"),
            Reception::Accepted
        );
        assert_eq!(
            prop.receive("homie/kitchen/light/power/set", "1"),
            Reception::Rejected
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn value_topic_message_is_retained_bootstrap() {
        let mut prop = initialized(Property::new("power", "Power", DataType::Boolean).with_settable(true));
        prop.expect_retained();

        assert_eq!(
            prop.receive("homie/kitchen/light/power", "true"),
            Reception::Retained
        );
        assert!(prop.has_received_retained());
        assert_eq!(prop.value(), "true");

        assert_eq!(
            prop.receive("homie/kitchen/light/power/set", "false"),
            Reception::Accepted
        );
        assert_eq!(prop.value(), "false");
    }

    #[test]
    fn settle_missing_retained_once() {
        let mut prop = initialized(
            Property::new("power", "Power", DataType::Boolean)
                .with_settable(true)
                .with_value("false"),
        );
        prop.expect_retained();
        assert!(prop.settle_missing_retained());
        assert!(prop.has_received_retained());
        assert!(!prop.settle_missing_retained());
    }

    #[test]
    fn settle_missing_retained_without_value() {
        let mut prop = initialized(Property::new("power", "Power", DataType::Boolean).with_settable(true));
        prop.expect_retained();
        assert!(!prop.settle_missing_retained());
        assert!(prop.has_received_retained());
    }

    #[test]
    fn outgoing_substitutes_defaults() {
        let prop = initialized(Property::new("level", "Level", DataType::Integer));
        assert_eq!(
            prop.outgoing(),
            Outgoing::Value {
                topic: "homie/kitchen/light/level",
                payload: Cow::Borrowed("0"),
                retain: true,
            }
        );

        let prop = initialized(Property::new("rgb", "RGB", DataType::Color).with_retained(false));
        assert_eq!(
            prop.outgoing(),
            Outgoing::Value {
                topic: "homie/kitchen/light/rgb",
                payload: Cow::Borrowed("100,100,100"),
                retain: false,
            }
        );
    }

    #[test]
    fn outgoing_enum_default_is_first_token() {
        let prop = initialized(Property::new("mode", "Mode", DataType::Enum).with_format("auto,heat,cool"));
        assert!(matches!(
            prop.outgoing(),
            Outgoing::Value { payload, .. } if payload == "auto"
        ));
    }

    #[test]
    fn outgoing_empty_string_suppressed() {
        let prop = initialized(
            Property::new("label", "Label", DataType::String).with_publish_empty_string(false),
        );
        assert_eq!(prop.outgoing(), Outgoing::Nothing);

        let prop = initialized(Property::new("label", "Label", DataType::String));
        assert!(matches!(
            prop.outgoing(),
            Outgoing::Value { payload, .. } if payload.is_empty()
        ));
    }

    #[test]
    fn outgoing_unavailable() {
        let prop = Property::new("level", "Level", DataType::Integer);
        assert_eq!(prop.outgoing(), Outgoing::Unavailable);

        let prop = initialized(Property::new("ext", "Ext", DataType::String).with_standard_mqtt("a/b"));
        assert_eq!(prop.outgoing(), Outgoing::Unavailable);
    }
}
