// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the Homie library.
//!
//! Protocol-level failures (a publish that did not go out, a payload that
//! failed validation) are never fatal: the device retries or drops the
//! message and reports it through `tracing`. The types below describe
//! those failures, and the handful of application-side mistakes the model
//! API can detect.

use thiserror::Error;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// A raw value was rejected by a property's datatype rules.
    #[error("value error: {0}")]
    Value(#[from] ValueError),

    /// The MQTT client collaborator reported a failure.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The device model was used incorrectly.
    #[error("device error: {0}")]
    Device(#[from] DeviceError),

    /// A device description could not be loaded.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

/// Reasons a raw payload is rejected by [`Property`](crate::Property) validation.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValueError {
    /// The payload is not an integer.
    #[error("{0:?} is not an integer")]
    InvalidInteger(String),

    /// The payload is not a floating-point number.
    #[error("{0:?} is not a number")]
    InvalidFloat(String),

    /// An integer is outside the `min:max` range of the property format.
    #[error("integer {actual} is out of range [{min}, {max}]")]
    IntegerOutOfRange {
        /// Lower bound (inclusive).
        min: i64,
        /// Upper bound (inclusive).
        max: i64,
        /// The parsed value.
        actual: i64,
    },

    /// A float is outside the `min:max` range of the property format.
    #[error("float {actual} is out of range [{min}, {max}]")]
    FloatOutOfRange {
        /// Lower bound (inclusive).
        min: f64,
        /// Upper bound (inclusive).
        max: f64,
        /// The parsed value.
        actual: f64,
    },

    /// A boolean payload was neither `true` nor `false`.
    #[error("{0:?} is not a boolean (expected true or false)")]
    InvalidBoolean(String),

    /// An enum payload is not one of the allowed tokens.
    #[error("{value:?} is not one of {allowed}")]
    NotInEnum {
        /// The rejected payload.
        value: String,
        /// The comma separated allow-list.
        allowed: String,
    },
}

/// Errors reported by an [`MqttClient`](crate::protocol::MqttClient).
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The client has no broker session.
    #[error("not connected to the MQTT broker")]
    NotConnected,

    /// The rumqttc request queue refused the request.
    #[cfg(feature = "mqtt")]
    #[error("MQTT error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    /// The client refused the request for another reason.
    #[error("request rejected: {0}")]
    Rejected(String),

    /// Invalid broker address.
    #[error("invalid address: {0}")]
    InvalidAddress(String),
}

/// Errors from misuse of the device model.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// The node handle does not belong to this device.
    #[error("unknown node index {0}")]
    UnknownNode(usize),

    /// The property handle does not belong to this device.
    #[error("unknown property {node}/{property}")]
    UnknownProperty {
        /// Node index.
        node: usize,
        /// Property index within the node.
        property: usize,
    },

    /// Topology changes are not allowed once topics are frozen.
    #[error("device {0} is already initialized")]
    AlreadyInitialized(String),
}

/// Errors raised while loading a device description.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The description is not valid JSON or does not match the schema.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// An identifier is empty after normalisation.
    #[error("empty identifier for {0}")]
    EmptyId(String),

    /// Unknown datatype name.
    #[error("unknown datatype: {0}")]
    UnknownDataType(String),

    /// The described tree could not be assembled.
    #[error("invalid device tree: {0}")]
    Device(#[from] DeviceError),
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;
