// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Homie nodes: named groups of properties under a device.

use std::fmt;

use crate::property::Property;

/// Handle to a node owned by a [`Device`](crate::Device).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub(crate) const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the position of the node within its device.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// A named grouping of properties.
///
/// Properties are advertised in insertion order.
///
/// # Examples
///
/// ```
/// use homie_lib::{DataType, Node, Property};
///
/// let node = Node::new("light", "Ceiling Light", "light")
///     .with_property(Property::new("power", "Power", DataType::Boolean))
///     .with_property(Property::new("level", "Level", DataType::Integer));
///
/// assert_eq!(node.property_list(), "power,level");
/// ```
#[derive(Debug)]
pub struct Node {
    id: String,
    name: String,
    node_type: String,
    topic: String,
    properties: Vec<Property>,
    initialized: bool,
}

impl Node {
    /// Creates an empty node.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, node_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            node_type: node_type.into(),
            topic: String::new(),
            properties: Vec::new(),
            initialized: false,
        }
    }

    /// Appends a property.
    #[must_use]
    pub fn with_property(mut self, property: Property) -> Self {
        self.properties.push(property);
        self
    }

    /// Returns the node id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the human readable name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the free-form node type.
    #[must_use]
    pub fn node_type(&self) -> &str {
        &self.node_type
    }

    /// Returns the node topic (empty before initialization).
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Returns whether topics are frozen.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Returns the properties in advertisement order.
    #[must_use]
    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    /// Returns the property at `index`.
    #[must_use]
    pub fn property(&self, index: usize) -> Option<&Property> {
        self.properties.get(index)
    }

    /// Returns the property at `index` mutably.
    pub fn property_mut(&mut self, index: usize) -> Option<&mut Property> {
        self.properties.get_mut(index)
    }

    /// Returns the index of the property with the given id.
    #[must_use]
    pub fn position(&self, property_id: &str) -> Option<usize> {
        self.properties.iter().position(|p| p.id() == property_id)
    }

    /// Returns the comma separated property ids advertised on `$properties`.
    ///
    /// Standard-MQTT properties are not part of the advertisement.
    #[must_use]
    pub fn property_list(&self) -> String {
        self.properties
            .iter()
            .filter(|p| !p.is_standard_mqtt())
            .map(Property::id)
            .collect::<Vec<_>>()
            .join(",")
    }

    pub(crate) fn push(&mut self, property: Property) -> usize {
        self.properties.push(property);
        self.properties.len() - 1
    }

    pub(crate) fn properties_mut(&mut self) -> &mut [Property] {
        &mut self.properties
    }

    /// Freezes the node topic under `device_topic` and initializes every property.
    pub(crate) fn init(&mut self, device_topic: &str, id: NodeId) {
        if self.initialized {
            return;
        }
        self.topic = format!("{device_topic}/{}", self.id);
        for property in &mut self.properties {
            property.init(&self.topic, id);
        }
        self.initialized = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DataType;

    fn light() -> Node {
        Node::new("light", "Light", "dimmer")
            .with_property(Property::new("power", "Power", DataType::Boolean).with_settable(true))
            .with_property(Property::new("level", "Level", DataType::Integer))
    }

    #[test]
    fn init_composes_topics() {
        let mut node = light();
        node.init("homie/kitchen", NodeId::new(2));

        assert_eq!(node.topic(), "homie/kitchen/light");
        assert_eq!(node.properties()[0].topic(), "homie/kitchen/light/power");
        assert_eq!(node.properties()[1].topic(), "homie/kitchen/light/level");
        assert!(node.properties().iter().all(|p| p.node() == Some(NodeId::new(2))));
    }

    #[test]
    fn init_only_once() {
        let mut node = light();
        node.init("homie/kitchen", NodeId::new(0));
        node.init("homie/hall", NodeId::new(0));
        assert_eq!(node.topic(), "homie/kitchen/light");
    }

    #[test]
    fn property_list_skips_standard_mqtt() {
        let node = light().with_property(
            Property::new("ext", "External", DataType::String).with_standard_mqtt("zigbee/door"),
        );
        assert_eq!(node.property_list(), "power,level");
    }

    #[test]
    fn empty_node_has_empty_list() {
        let node = Node::new("dummy", "No Nodes", "");
        assert_eq!(node.property_list(), "");
    }

    #[test]
    fn position_by_id() {
        let node = light();
        assert_eq!(node.position("level"), Some(1));
        assert_eq!(node.position("missing"), None);
    }
}
