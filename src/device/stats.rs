// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Uptime counters and `$stats` telemetry.

use std::time::Duration;

use super::link::VALUE_QOS;
use super::{ConnectionState, Device};
use crate::network::Network;
use crate::protocol::MqttClient;

const ONE_SECOND: Duration = Duration::from_secs(1);

/// Whole-second counters.
///
/// The device counter never resets. The link and session counters restart
/// from zero whenever the network or the MQTT session is down.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct Uptime {
    last_second: Option<Duration>,
    device: u64,
    link: u64,
    session: u64,
}

impl Uptime {
    /// Counts the whole seconds elapsed up to `now` and returns how many.
    fn advance(&mut self, now: Duration) -> u64 {
        let Some(mut last) = self.last_second else {
            self.last_second = Some(now);
            return 0;
        };
        let mut elapsed = 0;
        while now.saturating_sub(last) >= ONE_SECOND {
            last += ONE_SECOND;
            elapsed += 1;
        }
        self.last_second = Some(last);
        elapsed
    }

    pub(crate) fn link_down(&mut self) {
        self.link = 0;
        self.session = 0;
    }

    pub(crate) fn session_down(&mut self) {
        self.session = 0;
    }
}

impl<C: MqttClient> Device<C> {
    /// Seconds since the first tick.
    #[must_use]
    pub fn uptime_seconds(&self) -> u64 {
        self.uptime.device
    }

    /// Seconds since the network link came up.
    #[must_use]
    pub fn wifi_uptime_seconds(&self) -> u64 {
        self.uptime.link
    }

    /// Seconds since the MQTT session was established.
    #[must_use]
    pub fn mqtt_uptime_seconds(&self) -> u64 {
        self.uptime.session
    }

    pub(super) fn advance_clock(&mut self, now: Duration, network: &impl Network) {
        for _ in 0..self.uptime.advance(now) {
            self.uptime.device += 1;
            self.uptime.link += 1;
            self.uptime.session += 1;

            if self.options.rapid_signal_updates && self.uptime.device % 2 == 1 {
                self.publish_signal_change(network);
            }
        }
    }

    fn publish_signal_change(&mut self, network: &impl Network) {
        let signal = network.signal_strength();
        if self.last_signal == Some(signal) {
            return;
        }
        self.last_signal = Some(signal);
        let topic = format!("{}/$stats/signal", self.topic);
        self.link.publish(&topic, &signal.to_string(), VALUE_QOS, true);
    }

    /// Publishes one round of `$stats` and schedules the next.
    ///
    /// A round with any failure is retried after the error delay instead
    /// of the full interval.
    pub(super) fn publish_stats(&mut self, now: Duration, network: &impl Network) {
        let topic = &self.topic;
        let mut ok = true;

        if self.state == ConnectionState::Ready {
            ok &= self.link.publish_meta(&format!("{topic}/$state"), "ready");
        }
        let stats = [
            ("uptime", self.uptime.device.to_string()),
            ("uptime-wifi", self.uptime.link.to_string()),
            ("uptime-mqtt", self.uptime.session.to_string()),
            ("signal", network.signal_strength().to_string()),
        ];
        for (name, value) in &stats {
            ok &= self
                .link
                .publish(&format!("{topic}/$stats/{name}"), value, VALUE_QOS, true);
        }

        let delay = if ok {
            self.options.stats_interval
        } else {
            let delay = self.link.retry_delay();
            tracing::debug!(device = %self.id, retry_in_ms = delay.as_millis(), "Stats publish failed");
            delay
        };
        self.next_stats_at = Some(now + delay);
    }
}
