// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Broker connection settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// Settings used by [`RumqttcClient`](super::RumqttcClient) to reach a broker.
///
/// # Examples
///
/// ```
/// use homie_lib::protocol::BrokerConfig;
/// use std::time::Duration;
///
/// let config = BrokerConfig::builder()
///     .host("192.168.1.50")
///     .port(1883)
///     .credentials("user", "password")
///     .keep_alive(Duration::from_secs(60))
///     .build()
///     .unwrap();
/// assert_eq!(config.host(), "192.168.1.50");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    host: String,
    port: u16,
    credentials: Option<(String, String)>,
    client_id: Option<String>,
    #[serde(with = "crate::config::millis")]
    keep_alive: Duration,
    request_capacity: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 1883,
            credentials: None,
            client_id: None,
            keep_alive: Duration::from_secs(30),
            request_capacity: 64,
        }
    }
}

impl BrokerConfig {
    /// Creates a new builder.
    #[must_use]
    pub fn builder() -> BrokerConfigBuilder {
        BrokerConfigBuilder::default()
    }

    /// Parses a broker URL such as `mqtt://host:1883`, `tcp://host` or `host:port`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidAddress`] if the host is empty or the
    /// port is not a number.
    pub fn from_url(url: &str) -> Result<Self, ProtocolError> {
        let url = url
            .strip_prefix("mqtt://")
            .or_else(|| url.strip_prefix("tcp://"))
            .unwrap_or(url);

        let (host, port) = if let Some((h, p)) = url.rsplit_once(':') {
            let port = p
                .parse()
                .map_err(|_| ProtocolError::InvalidAddress(format!("Invalid port: {p}")))?;
            (h.to_string(), port)
        } else {
            (url.to_string(), 1883)
        };

        Self::builder().host(host).port(port).build()
    }

    /// Returns the broker host.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the broker port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Returns the credentials if configured.
    #[must_use]
    pub fn credentials(&self) -> Option<(&str, &str)> {
        self.credentials
            .as_ref()
            .map(|(u, p)| (u.as_str(), p.as_str()))
    }

    /// Returns the fixed client id, if any.
    #[must_use]
    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }

    /// Returns the keep-alive interval.
    #[must_use]
    pub fn keep_alive(&self) -> Duration {
        self.keep_alive
    }

    /// Returns the capacity of the outgoing request queue.
    #[must_use]
    pub fn request_capacity(&self) -> usize {
        self.request_capacity
    }
}

/// Builder for [`BrokerConfig`].
#[derive(Debug, Default)]
pub struct BrokerConfigBuilder {
    config: BrokerConfig,
}

impl BrokerConfigBuilder {
    /// Sets the broker host address.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    /// Sets the broker port (default: 1883).
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Sets authentication credentials.
    #[must_use]
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.config.credentials = Some((username.into(), password.into()));
        self
    }

    /// Uses a fixed client id instead of a generated one.
    #[must_use]
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.config.client_id = Some(client_id.into());
        self
    }

    /// Sets the keep-alive interval (default: 30 seconds).
    #[must_use]
    pub fn keep_alive(mut self, duration: Duration) -> Self {
        self.config.keep_alive = duration;
        self
    }

    /// Sets the outgoing request queue capacity (default: 64).
    ///
    /// A full queue makes publishes fail, which feeds the device's
    /// publish-error backoff.
    #[must_use]
    pub fn request_capacity(mut self, capacity: usize) -> Self {
        self.config.request_capacity = capacity;
        self
    }

    /// Validates and returns the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidAddress`] if no host is set.
    pub fn build(self) -> Result<BrokerConfig, ProtocolError> {
        if self.config.host.is_empty() {
            return Err(ProtocolError::InvalidAddress(
                "MQTT broker host is required".to_string(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_default_values() {
        let builder = BrokerConfigBuilder::default();
        assert_eq!(builder.config.port, 1883);
        assert!(builder.config.host.is_empty());
        assert!(builder.config.credentials.is_none());
        assert_eq!(builder.config.keep_alive, Duration::from_secs(30));
        assert_eq!(builder.config.request_capacity, 64);
    }

    #[test]
    fn builder_chain() {
        let config = BrokerConfig::builder()
            .host("192.168.1.50")
            .port(8883)
            .credentials("admin", "secret")
            .client_id("kitchen")
            .keep_alive(Duration::from_secs(45))
            .build()
            .unwrap();

        assert_eq!(config.host(), "192.168.1.50");
        assert_eq!(config.port(), 8883);
        assert_eq!(config.credentials(), Some(("admin", "secret")));
        assert_eq!(config.client_id(), Some("kitchen"));
        assert_eq!(config.keep_alive(), Duration::from_secs(45));
    }

    #[test]
    fn builder_missing_host_fails() {
        let err = BrokerConfig::builder().build().unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidAddress(_)));
    }

    #[test]
    fn from_url_variants() {
        let config = BrokerConfig::from_url("mqtt://broker.local:1884").unwrap();
        assert_eq!(config.host(), "broker.local");
        assert_eq!(config.port(), 1884);

        let config = BrokerConfig::from_url("tcp://10.0.0.2").unwrap();
        assert_eq!(config.host(), "10.0.0.2");
        assert_eq!(config.port(), 1883);

        assert!(BrokerConfig::from_url("host:abc").is_err());
        assert!(BrokerConfig::from_url("mqtt://").is_err());
    }

    #[test]
    fn deserialize_with_defaults() {
        let config: BrokerConfig =
            serde_json::from_str(r#"{"host": "broker", "keep_alive": 10000}"#).unwrap();
        assert_eq!(config.host(), "broker");
        assert_eq!(config.port(), 1883);
        assert_eq!(config.keep_alive(), Duration::from_secs(10));
    }
}
