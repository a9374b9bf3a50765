// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Connection and initial-publishing state.

use std::fmt;
use std::time::Duration;

/// Where a device stands with its broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No session and no attempt in flight.
    #[default]
    Idle,
    /// A connection attempt started at `since` is pending.
    Connecting {
        /// When `connect()` was issued.
        since: Duration,
    },
    /// Connected; the advertisement is in progress.
    Publishing(Stage),
    /// Connected and fully advertised.
    Ready,
}

impl ConnectionState {
    /// Returns whether a session is established.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        matches!(self, Self::Publishing(_) | Self::Ready)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Connecting { .. } => f.write_str("connecting"),
            Self::Publishing(stage) => write!(f, "publishing ({stage})"),
            Self::Ready => f.write_str("ready"),
        }
    }
}

/// Cursor of the initial advertisement.
///
/// | Stage | Publishes |
/// |-------|-----------|
/// | 0 | `$state=init`, `$homie`, `$name` |
/// | 1 | `$localip`, `$mac`, `$extensions` |
/// | 2 | `$stats`, `$stats/interval`, `$nodes` |
/// | 3 | per node: `$name`, `$type`, `$properties` |
/// | 4 | per property: metadata, then subscriptions or the value |
/// | 5 | `$state=ready` |
///
/// Stages 0 to 2 are all-or-nothing. Stages 3 and 4 advance one unit per
/// successful attempt and resume at the failed unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    /// Device identity.
    Announce,
    /// Network addresses.
    Network,
    /// Stats list and node list.
    Topology,
    /// Node metadata, starting at `node`.
    Nodes {
        /// Next node to advertise.
        node: usize,
    },
    /// Property metadata and subscriptions.
    Properties {
        /// Node of the next property.
        node: usize,
        /// Next property within `node`.
        property: usize,
    },
    /// Final `$state=ready`.
    Finish,
}

impl Stage {
    /// Returns the stage number (0 to 5).
    #[must_use]
    pub const fn number(&self) -> u8 {
        match self {
            Self::Announce => 0,
            Self::Network => 1,
            Self::Topology => 2,
            Self::Nodes { .. } => 3,
            Self::Properties { .. } => 4,
            Self::Finish => 5,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nodes { node } => write!(f, "stage 3, node {node}"),
            Self::Properties { node, property } => {
                write!(f, "stage 4, node {node}, property {property}")
            }
            other => write!(f, "stage {}", other.number()),
        }
    }
}
