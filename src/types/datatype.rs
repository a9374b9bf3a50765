// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Homie property datatypes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Datatype of a Homie property, advertised on `<property>/$datatype`.
///
/// # Examples
///
/// ```
/// use homie_lib::DataType;
///
/// let dt: DataType = "boolean".parse().unwrap();
/// assert_eq!(dt, DataType::Boolean);
/// assert_eq!(dt.default_payload(), "false");
/// assert!(!dt.allows_empty());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// Free-form text.
    #[default]
    String,
    /// Signed integer, optionally constrained by a `min:max` format.
    #[serde(alias = "int")]
    Integer,
    /// Floating-point number, optionally constrained by a `min:max` format.
    Float,
    /// `true` or `false`.
    #[serde(alias = "bool")]
    Boolean,
    /// One token of the comma separated format allow-list.
    Enum,
    /// Color triple, passed through verbatim.
    #[serde(alias = "colour")]
    Color,
}

impl DataType {
    /// Returns the name advertised on the `$datatype` topic.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::Enum => "enum",
            Self::Color => "color",
        }
    }

    /// Returns whether an empty payload is a valid value of this type.
    #[must_use]
    pub const fn allows_empty(&self) -> bool {
        matches!(self, Self::String)
    }

    /// Returns the payload published in place of an empty value.
    ///
    /// Enums have no fixed default; their first allowed token is used
    /// instead (see [`Property::default_payload`](crate::Property::default_payload)).
    #[must_use]
    pub const fn default_payload(&self) -> &'static str {
        match self {
            Self::String | Self::Enum => "",
            Self::Integer => "0",
            Self::Float => "0.0",
            Self::Boolean => "false",
            Self::Color => "100,100,100",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "string" => Ok(Self::String),
            "integer" | "int" => Ok(Self::Integer),
            "float" => Ok(Self::Float),
            "boolean" | "bool" => Ok(Self::Boolean),
            "enum" => Ok(Self::Enum),
            "color" | "colour" => Ok(Self::Color),
            _ => Err(ConfigError::UnknownDataType(s.to_string())),
        }
    }
}
