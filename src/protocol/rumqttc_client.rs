// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `rumqttc`-backed MQTT client.
//!
//! Each `connect()` builds a fresh `rumqttc` session and spawns its event
//! loop on the ambient tokio runtime. The event loop task only forwards
//! what it sees (ConnAck, inbound publishes, session end) into a channel;
//! the device drains that channel from its own tick. The task never
//! reconnects by itself, reconnect pacing belongs to the device.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use rumqttc::{AsyncClient, EventLoop, MqttOptions};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{BrokerConfig, ClientEvent, DisconnectReason, LastWill, Message, MqttClient, QoS};
use crate::error::ProtocolError;

/// Global counter for generating unique client IDs.
static CLIENT_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Production [`MqttClient`] built on `rumqttc`.
///
/// Must be used from within a tokio runtime: `connect()` spawns the event
/// loop task. Outside a runtime the attempt fails immediately and is
/// reported as a failed connection.
///
/// # Examples
///
/// ```no_run
/// use homie_lib::protocol::{BrokerConfig, RumqttcClient};
/// use homie_lib::Device;
///
/// # fn example() -> homie_lib::Result<()> {
/// let config = BrokerConfig::from_url("mqtt://192.168.1.50:1883")?;
/// let device = Device::new("kitchen", "Kitchen", RumqttcClient::new(config));
/// # Ok(())
/// # }
/// ```
pub struct RumqttcClient {
    config: BrokerConfig,
    last_will: Option<LastWill>,
    client: Option<AsyncClient>,
    task: Option<JoinHandle<()>>,
    connected: Arc<AtomicBool>,
    events_tx: mpsc::UnboundedSender<ClientEvent>,
    events_rx: mpsc::UnboundedReceiver<ClientEvent>,
}

impl RumqttcClient {
    /// Creates a disconnected client for the given broker.
    #[must_use]
    pub fn new(config: BrokerConfig) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            config,
            last_will: None,
            client: None,
            task: None,
            connected: Arc::new(AtomicBool::new(false)),
            events_tx,
            events_rx,
        }
    }

    /// Returns the broker configuration.
    #[must_use]
    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    fn mqtt_options(&self) -> MqttOptions {
        let client_id = self.config.client_id().map_or_else(
            || {
                let counter = CLIENT_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
                format!("homie_{}_{}", std::process::id(), counter)
            },
            str::to_string,
        );

        let mut options = MqttOptions::new(client_id, self.config.host(), self.config.port());
        options.set_keep_alive(self.config.keep_alive());
        options.set_clean_session(true);

        if let Some((username, password)) = self.config.credentials() {
            options.set_credentials(username, password);
        }

        if let Some(will) = &self.last_will {
            options.set_last_will(rumqttc::LastWill::new(
                will.topic.clone(),
                will.payload.clone(),
                will.qos.into(),
                will.retain,
            ));
        }

        options
    }

    fn stop_event_loop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.client = None;
        self.connected.store(false, Ordering::Release);
    }

    fn session(&self) -> Result<&AsyncClient, ProtocolError> {
        if !self.is_connected() {
            return Err(ProtocolError::NotConnected);
        }
        self.client.as_ref().ok_or(ProtocolError::NotConnected)
    }
}

impl MqttClient for RumqttcClient {
    fn set_last_will(&mut self, will: LastWill) {
        self.last_will = Some(will);
    }

    fn connect(&mut self) {
        self.stop_event_loop();

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::error!("MQTT connect requires a tokio runtime");
            let _ = self.events_tx.send(ClientEvent::Disconnected {
                reason: DisconnectReason::Error("no tokio runtime".to_string()),
            });
            return;
        };

        let (client, event_loop) =
            AsyncClient::new(self.mqtt_options(), self.config.request_capacity());

        tracing::debug!(
            host = %self.config.host(),
            port = %self.config.port(),
            "Starting MQTT session"
        );

        let connected = Arc::clone(&self.connected);
        let events_tx = self.events_tx.clone();
        self.task = Some(runtime.spawn(forward_events(event_loop, connected, events_tx)));
        self.client = Some(client);
    }

    fn disconnect(&mut self, force: bool) {
        if !force
            && let Some(client) = &self.client
            && client.try_disconnect().is_ok()
        {
            // The event loop reports the end of the session itself.
            self.connected.store(false, Ordering::Release);
            return;
        }
        self.stop_event_loop();
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    fn publish(&mut self, message: &Message) -> Result<(), ProtocolError> {
        self.session()?.try_publish(
            message.topic.clone(),
            message.qos.into(),
            message.retain,
            message.payload.clone(),
        )?;
        Ok(())
    }

    fn subscribe(&mut self, topic: &str, qos: QoS) -> Result<(), ProtocolError> {
        self.session()?.try_subscribe(topic, qos.into())?;
        Ok(())
    }

    fn unsubscribe(&mut self, topic: &str) -> Result<(), ProtocolError> {
        self.session()?.try_unsubscribe(topic)?;
        Ok(())
    }

    fn poll_event(&mut self) -> Option<ClientEvent> {
        self.events_rx.try_recv().ok()
    }
}

impl Drop for RumqttcClient {
    fn drop(&mut self) {
        self.stop_event_loop();
    }
}

impl std::fmt::Debug for RumqttcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RumqttcClient")
            .field("host", &self.config.host())
            .field("port", &self.config.port())
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

/// Polls the `rumqttc` event loop until the session ends.
async fn forward_events(
    mut event_loop: EventLoop,
    connected: Arc<AtomicBool>,
    events_tx: mpsc::UnboundedSender<ClientEvent>,
) {
    use rumqttc::{Event, Packet};

    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(connack))) => {
                tracing::debug!(?connack, "MQTT broker connected");
                connected.store(true, Ordering::Release);
                let _ = events_tx.send(ClientEvent::Connected {
                    session_present: connack.session_present,
                });
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                tracing::trace!(topic = %publish.topic, "MQTT message received");
                let total = publish.payload.len();
                let _ = events_tx.send(ClientEvent::Message {
                    topic: publish.topic.clone(),
                    payload: publish.payload.to_vec(),
                    retain: publish.retain,
                    index: 0,
                    total,
                });
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                tracing::info!("MQTT broker closed the session");
                connected.store(false, Ordering::Release);
                let _ = events_tx.send(ClientEvent::Disconnected {
                    reason: DisconnectReason::Closed,
                });
                break;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %e, "MQTT event loop ended");
                connected.store(false, Ordering::Release);
                let _ = events_tx.send(ClientEvent::Disconnected {
                    reason: DisconnectReason::Error(e.to_string()),
                });
                break;
            }
        }
    }
}
