// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The staged initial advertisement.
//!
//! One attempt runs per throttle period. An attempt performs the traffic
//! of one stage (or one unit of stages 3 and 4); steps that involve no
//! traffic, such as leaving an exhausted node, fall through to the next
//! stage within the same attempt.

use std::time::Duration;

use super::{ConnectionState, Device, HOMIE_VERSION, Stage};
use crate::network::Network;
use crate::node::Node;
use crate::property::PropertyId;
use crate::protocol::MqttClient;

/// Stats advertised on `$stats`.
pub(crate) const STATS: &str = "uptime,signal,uptime-wifi,uptime-mqtt";

/// Outcome of one stage attempt.
enum Step {
    /// Traffic went out; continue at the given stage on the next attempt.
    Advance(Stage),
    /// Nothing to send; continue at the given stage right away.
    Skip(Stage),
    /// Something failed; retry the same stage later.
    Failed,
    /// `$state=ready` is out.
    Complete,
}

impl<C: MqttClient> Device<C> {
    pub(super) fn run_initial_publishing(&mut self, now: Duration, network: &impl Network) {
        let ConnectionState::Publishing(mut stage) = self.state else {
            return;
        };
        if self.next_publish_attempt.is_some_and(|at| now < at) {
            return;
        }
        self.next_publish_attempt = Some(now + self.options.publish_throttle);

        if !self.coordinator.acquire(self.key) {
            tracing::trace!(device = %self.id, "Waiting for the publish token");
            return;
        }

        loop {
            tracing::trace!(device = %self.id, %stage, "Initial publishing");
            let step = match stage {
                Stage::Announce => self.publish_announce(),
                Stage::Network => self.publish_network(network),
                Stage::Topology => self.publish_topology(),
                Stage::Nodes { node } => self.publish_node(node),
                Stage::Properties { node, property } => self.publish_property(node, property),
                Stage::Finish => self.publish_ready(),
            };

            match step {
                Step::Advance(next) => {
                    self.state = ConnectionState::Publishing(next);
                    return;
                }
                Step::Skip(next) => {
                    stage = next;
                    self.state = ConnectionState::Publishing(next);
                }
                Step::Failed => {
                    let delay = self.link.retry_delay();
                    tracing::warn!(
                        device = %self.id,
                        %stage,
                        retry_in_ms = delay.as_millis(),
                        "Initial publishing failed"
                    );
                    self.next_publish_attempt = Some(now + delay);
                    return;
                }
                Step::Complete => {
                    self.state = ConnectionState::Ready;
                    self.coordinator.release(self.key);
                    self.defaults_due = Some(now + self.options.defaults_delay);
                    tracing::info!(
                        device = %self.id,
                        nodes = self.nodes.len(),
                        properties = self.properties_advertised,
                        "Initial publishing complete"
                    );
                    return;
                }
            }
        }
    }

    fn publish_announce(&mut self) -> Step {
        let topic = &self.topic;
        let mut ok = true;
        ok &= self.link.publish_meta(&format!("{topic}/$state"), "init");
        ok &= self.link.publish_meta(&format!("{topic}/$homie"), HOMIE_VERSION);
        ok &= self.link.publish_meta(&format!("{topic}/$name"), &self.name);
        step(ok, Stage::Network)
    }

    fn publish_network(&mut self, network: &impl Network) -> Step {
        let topic = &self.topic;
        let mut ok = true;
        ok &= self
            .link
            .publish_meta(&format!("{topic}/$localip"), &network.local_ip().to_string());
        ok &= self
            .link
            .publish_meta(&format!("{topic}/$mac"), &network.mac_address());
        ok &= self.link.publish_meta(&format!("{topic}/$extensions"), "");
        step(ok, Stage::Topology)
    }

    fn publish_topology(&mut self) -> Step {
        let topic = &self.topic;
        let nodes = self
            .nodes
            .iter()
            .map(Node::id)
            .collect::<Vec<_>>()
            .join(",");
        let interval = self.options.advertised_stats_interval.as_secs().to_string();

        let mut ok = true;
        ok &= self.link.publish_meta(&format!("{topic}/$stats"), STATS);
        ok &= self
            .link
            .publish_meta(&format!("{topic}/$stats/interval"), &interval);
        ok &= self.link.publish_meta(&format!("{topic}/$nodes"), &nodes);
        step(ok, Stage::Nodes { node: 0 })
    }

    fn publish_node(&mut self, index: usize) -> Step {
        let Some(node) = self.nodes.get(index) else {
            return Step::Skip(Stage::Properties {
                node: 0,
                property: 0,
            });
        };

        let topic = node.topic();
        let mut ok = true;
        ok &= self.link.publish_meta(&format!("{topic}/$name"), node.name());
        ok &= self.link.publish_meta(&format!("{topic}/$type"), node.node_type());
        ok &= self
            .link
            .publish_meta(&format!("{topic}/$properties"), &node.property_list());
        step(ok, Stage::Nodes { node: index + 1 })
    }

    fn publish_property(&mut self, node: usize, property: usize) -> Step {
        let Some(owner) = self.nodes.get(node) else {
            return Step::Skip(Stage::Finish);
        };
        if property >= owner.properties().len() {
            return Step::Skip(Stage::Properties {
                node: node + 1,
                property: 0,
            });
        }

        if self.advertise_property(PropertyId::new(node, property)) {
            self.properties_advertised += 1;
            Step::Advance(Stage::Properties {
                node,
                property: property + 1,
            })
        } else {
            Step::Failed
        }
    }

    /// Publishes one property's metadata and sets up its subscriptions.
    fn advertise_property(&mut self, id: PropertyId) -> bool {
        let Some(property) = self
            .nodes
            .get_mut(id.node_index())
            .and_then(|node| node.property_mut(id.index()))
        else {
            return true;
        };
        let link = &mut self.link;
        let topic = property.topic().to_string();

        if property.is_standard_mqtt() {
            self.router.insert(topic.clone(), id);
            return link.subscribe(&topic);
        }

        let mut ok = true;
        ok &= link.publish_meta(&format!("{topic}/$name"), property.name());
        ok &= link.publish_meta(
            &format!("{topic}/$settable"),
            &property.is_settable().to_string(),
        );
        ok &= link.publish_meta(
            &format!("{topic}/$retained"),
            &property.is_retained().to_string(),
        );
        ok &= link.publish_meta(&format!("{topic}/$datatype"), property.datatype().as_str());
        if !property.unit().is_empty() {
            ok &= link.publish_meta(&format!("{topic}/$unit"), property.unit());
        }
        if !property.format().is_empty() {
            ok &= link.publish_meta(&format!("{topic}/$format"), property.format());
        }

        if property.is_settable() {
            let set_topic = format!("{topic}/set");
            self.router.insert(topic.clone(), id);
            self.router.insert(set_topic.clone(), id);
            if property.is_retained() {
                property.expect_retained();
                ok &= link.subscribe(&topic);
            }
            ok &= link.subscribe(&set_topic);
        } else {
            ok &= link.publish_value(property);
        }
        ok
    }

    fn publish_ready(&mut self) -> Step {
        let topic = format!("{}/$state", self.topic);
        if self.link.publish_meta(&topic, "ready") {
            Step::Complete
        } else {
            Step::Failed
        }
    }

    /// Publishes the in-memory value of every retained settable property
    /// whose broker copy never arrived.
    pub(super) fn publish_missing_defaults(&mut self) {
        for node in &mut self.nodes {
            for property in node.properties_mut() {
                if property.settle_missing_retained() {
                    tracing::debug!(
                        topic = %property.topic(),
                        "No retained value received, publishing current value"
                    );
                    self.router.remove(property.topic());
                    self.link.unsubscribe(property.topic());
                    self.link.publish_value(property);
                }
            }
        }
    }
}

const fn step(ok: bool, next: Stage) -> Step {
    if ok { Step::Advance(next) } else { Step::Failed }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::PublishCoordinator;
    use crate::network::StaticNetwork;
    use crate::property::Property;
    use crate::protocol::{MemoryClient, Operation};
    use crate::types::DataType;

    fn connected_device() -> Device<MemoryClient> {
        let mut device = Device::new("d", "D", MemoryClient::new())
            .with_coordinator(PublishCoordinator::new());
        let node = device.add_node(Node::new("n", "N", "t")).unwrap();
        device
            .add_property(node, Property::new("a", "A", DataType::Integer).with_value("1"))
            .unwrap();
        device
            .add_property(
                node,
                Property::new("b", "B", DataType::String).with_standard_mqtt("ext/b"),
            )
            .unwrap();
        device.add_node(Node::new("empty", "Empty", "t")).unwrap();
        device.init();

        let network = StaticNetwork::default();
        device.tick(Duration::ZERO, &network);
        device.tick(Duration::from_millis(100), &network);
        device
    }

    fn attempt(device: &mut Device<MemoryClient>, now: Duration) {
        device.run_initial_publishing(now, &StaticNetwork::default());
    }

    #[test]
    fn first_attempt_is_stage_zero() {
        let device = connected_device();
        assert_eq!(device.state(), ConnectionState::Publishing(Stage::Network));
        assert_eq!(device.client().last_payload("homie/d/$homie"), Some("3.0.1"));
    }

    #[test]
    fn throttle_between_attempts() {
        let mut device = connected_device();
        attempt(&mut device, Duration::from_millis(200));
        assert_eq!(device.state(), ConnectionState::Publishing(Stage::Network));
        attempt(&mut device, Duration::from_millis(300));
        assert_eq!(device.state(), ConnectionState::Publishing(Stage::Topology));
    }

    #[test]
    fn empty_nodes_fall_through() {
        let mut device = connected_device();
        let mut now = Duration::from_millis(300);
        while device.state() != ConnectionState::Ready {
            attempt(&mut device, now);
            now += Duration::from_millis(200);
            assert!(now < Duration::from_secs(5));
        }
        assert_eq!(device.client().last_payload("homie/d/$nodes"), Some("n,empty"));
        assert_eq!(device.client().last_payload("homie/d/n/$properties"), Some("a"));
        assert_eq!(device.client().last_payload("homie/d/empty/$properties"), Some(""));
        assert_eq!(device.client().last_payload("homie/d/n/a"), Some("1"));
        assert!(device.client().operations().contains(&Operation::Subscribe {
            topic: "ext/b".to_string(),
            qos: crate::protocol::QoS::ExactlyOnce,
        }));
        assert!(device.client().last_payload("ext/b/$name").is_none());
        assert_eq!(device.properties_advertised, 2);
    }

    #[test]
    fn token_held_until_ready() {
        let coordinator = PublishCoordinator::new();
        let mut device = Device::new("d", "D", MemoryClient::new()).with_coordinator(coordinator.clone());
        device.init();
        let network = StaticNetwork::default();
        device.tick(Duration::ZERO, &network);
        device.tick(Duration::from_millis(100), &network);
        assert_eq!(coordinator.holder(), Some(device.key()));

        let mut now = Duration::from_millis(100);
        while !device.is_ready() {
            now += Duration::from_millis(100);
            device.tick(now, &network);
        }
        assert_eq!(coordinator.holder(), None);
    }
}
