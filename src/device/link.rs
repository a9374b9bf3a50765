// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Tracked access to the MQTT client.
//!
//! Every publish and subscribe issued by the protocol goes through a
//! [`Link`], which folds the outcome into the device's [`ErrorStreak`].
//! A streak that outlives [`SUSTAINED_FAILURE_LIMIT`] tears the session
//! down.
//!
//! [`SUSTAINED_FAILURE_LIMIT`]: crate::backoff::SUSTAINED_FAILURE_LIMIT

use std::time::Duration;

use crate::backoff::ErrorStreak;
use crate::error::ProtocolError;
use crate::property::{Outgoing, Property};
use crate::protocol::{Message, MqttClient, QoS};

/// QoS of device, node and property metadata.
pub(crate) const METADATA_QOS: QoS = QoS::AtLeastOnce;
/// QoS of stats and property values.
pub(crate) const VALUE_QOS: QoS = QoS::ExactlyOnce;
/// QoS of every subscription.
pub(crate) const SUBSCRIBE_QOS: QoS = QoS::ExactlyOnce;
/// QoS of the `$state=lost` last will.
pub(crate) const WILL_QOS: QoS = QoS::ExactlyOnce;

#[derive(Debug)]
pub(crate) struct Link<C> {
    pub(crate) client: C,
    streak: ErrorStreak,
    now: Duration,
    reset: bool,
}

impl<C: MqttClient> Link<C> {
    pub(crate) fn new(client: C) -> Self {
        Self {
            client,
            streak: ErrorStreak::new(),
            now: Duration::ZERO,
            reset: false,
        }
    }

    /// Sets the timestamp failures are recorded against.
    pub(crate) fn set_now(&mut self, now: Duration) {
        self.now = now;
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.client.is_connected()
    }

    /// Returns the pause before the next retry of a failed operation.
    pub(crate) fn retry_delay(&self) -> Duration {
        self.streak.retry_delay(self.now)
    }

    pub(crate) fn streak(&self) -> &ErrorStreak {
        &self.streak
    }

    /// Forgets the current failure streak and any pending forced reset.
    pub(crate) fn clear_failures(&mut self) {
        self.streak.clear();
        self.reset = false;
    }

    /// Returns whether a sustained failure forced a disconnect since the last call.
    pub(crate) fn take_reset(&mut self) -> bool {
        std::mem::take(&mut self.reset)
    }

    /// Publishes and tracks the outcome. Returns `false` without tracking
    /// when there is no session.
    pub(crate) fn publish(&mut self, topic: &str, payload: &str, qos: QoS, retain: bool) -> bool {
        if !self.client.is_connected() {
            return false;
        }
        let message = Message::new(topic, payload, qos, retain);
        let result = self.client.publish(&message);
        self.track(topic, result)
    }

    /// Publishes retained metadata.
    pub(crate) fn publish_meta(&mut self, topic: &str, payload: &str) -> bool {
        self.publish(topic, payload, METADATA_QOS, true)
    }

    /// Publishes the current value of `property`.
    pub(crate) fn publish_value(&mut self, property: &Property) -> bool {
        match property.outgoing() {
            Outgoing::Nothing => true,
            Outgoing::Unavailable => false,
            Outgoing::Value {
                topic,
                payload,
                retain,
            } => self.publish(topic, &payload, VALUE_QOS, retain),
        }
    }

    pub(crate) fn subscribe(&mut self, topic: &str) -> bool {
        if !self.client.is_connected() {
            return false;
        }
        tracing::debug!(topic = %topic, "Subscribing");
        let result = self.client.subscribe(topic, SUBSCRIBE_QOS);
        self.track(topic, result)
    }

    /// Unsubscribes; failures are logged only.
    pub(crate) fn unsubscribe(&mut self, topic: &str) -> bool {
        match self.client.unsubscribe(topic) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(topic = %topic, error = %e, "Unsubscribe failed");
                false
            }
        }
    }

    fn track(&mut self, topic: &str, result: Result<(), ProtocolError>) -> bool {
        match result {
            Ok(()) => {
                self.streak.clear();
                true
            }
            Err(e) => {
                tracing::warn!(topic = %topic, error = %e, "MQTT request failed");
                if self.streak.record_failure(self.now) {
                    tracing::warn!("No successful publish for a full minute, dropping the session");
                    self.client.disconnect(true);
                    self.streak.clear();
                    self.reset = true;
                }
                false
            }
        }
    }
}
