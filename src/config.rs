// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device configuration.
//!
//! [`DeviceOptions`] holds the timing knobs of a device. A whole device
//! tree can also be described in JSON with [`DeviceDescription`]:
//!
//! ```json
//! {
//!   "name": "Kitchen Controller",
//!   "nodes": [
//!     {
//!       "id": "light",
//!       "name": "Ceiling Light",
//!       "type": "dimmer",
//!       "properties": [
//!         { "id": "power", "name": "Power", "datatype": "boolean", "settable": true },
//!         { "id": "level", "name": "Level", "datatype": "integer", "format": "0:100", "unit": "%" }
//!       ]
//!     }
//!   ],
//!   "options": { "publish_throttle": 200, "rapid_signal_updates": true }
//! }
//! ```
//!
//! Durations are written in milliseconds.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::device::Device;
use crate::error::ConfigError;
use crate::node::Node;
use crate::property::Property;
use crate::protocol::MqttClient;
use crate::types::DataType;
use crate::util::device_id_from_name;

/// Serde helpers for [`Duration`] fields stored as milliseconds.
pub mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    /// Serializes a duration as whole milliseconds.
    ///
    /// # Errors
    ///
    /// Returns the serializer's error.
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    /// Deserializes whole milliseconds into a duration.
    ///
    /// # Errors
    ///
    /// Returns the deserializer's error.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Timing knobs of a [`Device`].
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use homie_lib::DeviceOptions;
///
/// let options = DeviceOptions::default().with_rapid_signal_updates(true);
/// assert_eq!(options.publish_throttle, Duration::from_millis(200));
/// assert!(options.rapid_signal_updates);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceOptions {
    /// Minimum pause between two initial-publishing attempts.
    #[serde(with = "millis")]
    pub publish_throttle: Duration,
    /// Pause between two rounds of `$stats` publishes.
    #[serde(with = "millis")]
    pub stats_interval: Duration,
    /// Interval advertised on `$stats/interval`.
    #[serde(with = "millis")]
    pub advertised_stats_interval: Duration,
    /// How long a connection attempt may stay unanswered.
    #[serde(with = "millis")]
    pub connect_timeout: Duration,
    /// Delay between `$state=ready` and the missing-retained-value sweep.
    #[serde(with = "millis")]
    pub defaults_delay: Duration,
    /// Publish `$stats/signal` every other second when it changes.
    pub rapid_signal_updates: bool,
}

impl Default for DeviceOptions {
    fn default() -> Self {
        Self {
            publish_throttle: Duration::from_millis(200),
            stats_interval: Duration::from_secs(30),
            advertised_stats_interval: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(60),
            defaults_delay: Duration::from_secs(5),
            rapid_signal_updates: false,
        }
    }
}

impl DeviceOptions {
    /// Sets the initial-publishing throttle.
    #[must_use]
    pub fn with_publish_throttle(mut self, throttle: Duration) -> Self {
        self.publish_throttle = throttle;
        self
    }

    /// Sets the stats cadence.
    #[must_use]
    pub fn with_stats_interval(mut self, interval: Duration) -> Self {
        self.stats_interval = interval;
        self
    }

    /// Sets the connection attempt timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Enables or disables rapid signal updates.
    #[must_use]
    pub fn with_rapid_signal_updates(mut self, enabled: bool) -> Self {
        self.rapid_signal_updates = enabled;
        self
    }
}

/// JSON description of a device tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceDescription {
    /// Topic id. Derived from `name` when absent.
    #[serde(default)]
    pub id: Option<String>,
    /// Human readable name.
    pub name: String,
    /// Nodes in advertisement order.
    #[serde(default)]
    pub nodes: Vec<NodeDescription>,
    /// Timing knobs.
    #[serde(default)]
    pub options: DeviceOptions,
}

/// JSON description of a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDescription {
    /// Node id.
    pub id: String,
    /// Human readable name.
    pub name: String,
    /// Free-form node type.
    #[serde(rename = "type", default)]
    pub node_type: String,
    /// Properties in advertisement order.
    #[serde(default)]
    pub properties: Vec<PropertyDescription>,
}

/// JSON description of a property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDescription {
    /// Property id.
    pub id: String,
    /// Human readable name.
    pub name: String,
    /// Datatype; defaults to `string`.
    #[serde(default)]
    pub datatype: DataType,
    /// Format constraint.
    #[serde(default)]
    pub format: String,
    /// Unit.
    #[serde(default)]
    pub unit: String,
    /// Accepts commands through `/set`.
    #[serde(default)]
    pub settable: bool,
    /// Value publishes are retained.
    #[serde(default = "default_true")]
    pub retained: bool,
    /// Publish empty values.
    #[serde(default = "default_true")]
    pub publish_empty_string: bool,
    /// Initial value, stored without validation.
    #[serde(default)]
    pub value: Option<String>,
    /// External topic of a standard-MQTT property.
    #[serde(default)]
    pub standard_mqtt: Option<String>,
}

const fn default_true() -> bool {
    true
}

impl DeviceDescription {
    /// Parses a description from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Json`] on malformed input.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Returns the device id, deriving it from the name when none was given.
    #[must_use]
    pub fn device_id(&self) -> String {
        match &self.id {
            Some(id) => id.clone(),
            None => device_id_from_name(&self.name),
        }
    }

    /// Builds the described device on top of `client`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyId`] if the device, a node or a
    /// property ends up with an empty id.
    pub fn build<C: MqttClient>(self, client: C) -> Result<Device<C>, ConfigError> {
        let id = self.device_id();
        if id.is_empty() {
            return Err(ConfigError::EmptyId(format!("device \"{}\"", self.name)));
        }

        let mut device = Device::new(id, self.name, client).with_options(self.options);
        for node in self.nodes {
            device.add_node(node.build()?)?;
        }
        Ok(device)
    }
}

impl NodeDescription {
    fn build(self) -> Result<Node, ConfigError> {
        if self.id.is_empty() {
            return Err(ConfigError::EmptyId(format!("node \"{}\"", self.name)));
        }
        let mut node = Node::new(self.id, self.name, self.node_type);
        for property in self.properties {
            node = node.with_property(property.build()?);
        }
        Ok(node)
    }
}

impl PropertyDescription {
    fn build(self) -> Result<Property, ConfigError> {
        if self.id.is_empty() {
            return Err(ConfigError::EmptyId(format!("property \"{}\"", self.name)));
        }
        let mut property = Property::new(self.id, self.name, self.datatype)
            .with_settable(self.settable)
            .with_retained(self.retained)
            .with_publish_empty_string(self.publish_empty_string)
            .with_format(self.format)
            .with_unit(self.unit);
        if let Some(value) = self.value {
            property = property.with_value(value);
        }
        if let Some(topic) = self.standard_mqtt {
            property = property.with_standard_mqtt(topic);
        }
        Ok(property)
    }
}
