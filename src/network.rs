// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Network link status.
//!
//! The device only needs four facts about the link under the MQTT session:
//! whether it is up, its signal strength, and the address pair it
//! advertises on `$localip` and `$mac`.

use std::net::{IpAddr, Ipv4Addr};

use serde::{Deserialize, Serialize};

/// Read-only view of the network link.
pub trait Network {
    /// Returns whether the link is up.
    fn is_connected(&self) -> bool;

    /// Returns the signal strength in dBm.
    fn signal_strength(&self) -> i32;

    /// Returns the local address.
    fn local_ip(&self) -> IpAddr;

    /// Returns the MAC address as `AA:BB:CC:DD:EE:FF`.
    fn mac_address(&self) -> String;
}

/// A [`Network`] with fixed values, for wired hosts and tests.
///
/// # Examples
///
/// ```
/// use homie_lib::network::{Network, StaticNetwork};
///
/// let mut net = StaticNetwork::new("192.168.1.20".parse().unwrap(), "AA:BB:CC:00:11:22");
/// assert!(net.is_connected());
///
/// net.set_connected(false);
/// assert!(!net.is_connected());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticNetwork {
    connected: bool,
    signal: i32,
    local_ip: IpAddr,
    mac: String,
}

impl Default for StaticNetwork {
    fn default() -> Self {
        Self::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), "00:00:00:00:00:00")
    }
}

impl StaticNetwork {
    /// Creates a connected link with full signal.
    #[must_use]
    pub fn new(local_ip: IpAddr, mac: impl Into<String>) -> Self {
        Self {
            connected: true,
            signal: 0,
            local_ip,
            mac: mac.into(),
        }
    }

    /// Marks the link up or down.
    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    /// Sets the reported signal strength.
    pub fn set_signal_strength(&mut self, dbm: i32) {
        self.signal = dbm;
    }
}

impl Network for StaticNetwork {
    fn is_connected(&self) -> bool {
        self.connected
    }

    fn signal_strength(&self) -> i32 {
        self.signal
    }

    fn local_ip(&self) -> IpAddr {
        self.local_ip
    }

    fn mac_address(&self) -> String {
        self.mac.clone()
    }
}
