// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The cooperative poll loop.
//!
//! A [`PollDriver`] owns a set of devices and the network collaborator
//! they share, and ticks all of them from one task every
//! [`TICK_INTERVAL`]. There are no other tasks: everything the devices do
//! happens inside those ticks.

use std::future::Future;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};

use crate::device::Device;
use crate::network::Network;
use crate::protocol::MqttClient;

/// Granularity of the poll loop.
pub const TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Drives devices from a single cooperative loop.
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
/// use homie_lib::network::StaticNetwork;
/// use homie_lib::protocol::{BrokerConfig, RumqttcClient};
/// use homie_lib::{DataType, Device, Node, PollDriver, Property};
///
/// #[tokio::main]
/// async fn main() -> homie_lib::Result<()> {
///     let client = RumqttcClient::new(BrokerConfig::from_url("mqtt://192.168.1.50:1883")?);
///     let mut device = Device::new("kitchen", "Kitchen", client);
///     let light = device.add_node(Node::new("light", "Light", "light"))?;
///     device.add_property(light, Property::new("power", "Power", DataType::Boolean).with_settable(true))?;
///
///     let mut driver = PollDriver::new(StaticNetwork::default());
///     driver.add_device(device);
///     driver.run(tokio::time::sleep(Duration::from_secs(3600))).await;
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct PollDriver<C: MqttClient, N: Network> {
    devices: Vec<Device<C>>,
    network: N,
    origin: Instant,
}

impl<C: MqttClient, N: Network> PollDriver<C, N> {
    /// Creates a driver with no devices.
    #[must_use]
    pub fn new(network: N) -> Self {
        Self {
            devices: Vec::new(),
            network,
            origin: Instant::now(),
        }
    }

    /// Initializes `device` and adds it to the loop. Returns its index.
    pub fn add_device(&mut self, mut device: Device<C>) -> usize {
        device.init();
        self.devices.push(device);
        self.devices.len() - 1
    }

    /// Returns the driven devices.
    #[must_use]
    pub fn devices(&self) -> &[Device<C>] {
        &self.devices
    }

    /// Returns a device mutably.
    pub fn device_mut(&mut self, index: usize) -> Option<&mut Device<C>> {
        self.devices.get_mut(index)
    }

    /// Returns the network collaborator.
    #[must_use]
    pub fn network(&self) -> &N {
        &self.network
    }

    /// Returns the network collaborator mutably.
    pub fn network_mut(&mut self) -> &mut N {
        &mut self.network
    }

    /// Ticks every device at the current time.
    pub fn tick(&mut self) {
        let now = self.origin.elapsed();
        self.tick_at(now);
    }

    /// Ticks every device at `now`.
    pub fn tick_at(&mut self, now: Duration) {
        for device in &mut self.devices {
            device.tick(now, &self.network);
        }
    }

    /// Ticks every [`TICK_INTERVAL`] until `shutdown` completes, then
    /// quits every device.
    pub async fn run<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut interval = tokio::time::interval(TICK_INTERVAL);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        tracing::debug!(devices = self.devices.len(), "Poll loop started");
        loop {
            tokio::select! {
                () = &mut shutdown => break,
                _ = interval.tick() => self.tick(),
            }
        }

        for device in &mut self.devices {
            device.quit();
        }
        tracing::debug!("Poll loop stopped");
    }
}
