// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `homie_lib` - publish devices over MQTT following the Homie 3.0.1 convention.
//!
//! A [`Device`] advertises itself, its [`Node`]s and their [`Property`]
//! values under `homie/<device-id>/...`, listens for commands on the
//! `/set` topics of settable properties, and keeps that advertisement
//! consistent across disconnects and publish failures.
//!
//! # Features
//!
//! - **Staged advertisement**: device, nodes, then properties, resumable
//!   at the exact unit that failed
//! - **Validation**: integer and float ranges, enum allow-lists, booleans
//! - **Retained bootstrap**: settable properties recover the broker's
//!   last known value on reconnect
//! - **Backoff**: reconnect tiers, escalating publish retries, and a hard
//!   reset after a minute without a successful publish
//! - **Serialization**: devices sharing a process take turns advertising
//!
//! # Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//! use homie_lib::network::StaticNetwork;
//! use homie_lib::protocol::{BrokerConfig, RumqttcClient};
//! use homie_lib::{DataType, Device, Node, PollDriver, Property};
//!
//! #[tokio::main]
//! async fn main() -> homie_lib::Result<()> {
//!     let broker = BrokerConfig::from_url("mqtt://192.168.1.50:1883")?;
//!     let mut device = Device::new("kitchen", "Kitchen", RumqttcClient::new(broker));
//!
//!     let light = device.add_node(Node::new("light", "Ceiling Light", "light"))?;
//!     let power = device.add_property(
//!         light,
//!         Property::new("power", "Power", DataType::Boolean).with_settable(true),
//!     )?;
//!
//!     if let Some(property) = device.property_mut(power) {
//!         property.on_change(|p| println!("power is now {}", p.value()));
//!     }
//!
//!     let mut driver = PollDriver::new(StaticNetwork::default());
//!     driver.add_device(device);
//!     driver.run(tokio::time::sleep(Duration::from_secs(3600))).await;
//!     Ok(())
//! }
//! ```
//!
//! # Testing without a broker
//!
//! [`protocol::MemoryClient`] records every request and lets a test play
//! the broker's part; drive the device with explicit timestamps through
//! [`Device::tick`].

pub mod backoff;
pub mod config;
mod coordinator;
mod device;
pub mod diagnostics;
mod driver;
pub mod error;
pub mod network;
mod node;
mod property;
pub mod protocol;
pub mod subscription;
pub mod types;
pub mod util;

pub use config::{DeviceDescription, DeviceOptions, NodeDescription, PropertyDescription};
pub use coordinator::{DeviceKey, PublishCoordinator};
pub use device::{ConnectionState, Device, HOMIE_VERSION, Stage};
pub use driver::{PollDriver, TICK_INTERVAL};
pub use error::{ConfigError, DeviceError, Error, ProtocolError, Result, ValueError};
pub use node::{Node, NodeId};
pub use property::{Property, PropertyId, validate};
pub use protocol::{MqttClient, QoS};
pub use subscription::SubscriptionId;
pub use types::{DataType, Range};
