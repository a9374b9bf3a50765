// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Datatype validation of raw payloads.

use crate::error::ValueError;
use crate::types::{DataType, Range};

/// Validates `raw` against `datatype` and `format`.
///
/// Returns the canonical form to store on success.
///
/// # Errors
///
/// Returns the [`ValueError`] describing why `raw` is not acceptable.
pub fn validate(datatype: DataType, format: &str, raw: &str) -> Result<String, ValueError> {
    match datatype {
        DataType::String | DataType::Color => Ok(raw.to_string()),
        DataType::Integer => validate_integer(format, raw),
        DataType::Float => validate_float(format, raw),
        DataType::Boolean => match raw {
            "true" | "false" => Ok(raw.to_string()),
            _ => Err(ValueError::InvalidBoolean(raw.to_string())),
        },
        DataType::Enum => {
            if format.split(',').any(|token| token == raw) {
                Ok(raw.to_string())
            } else {
                Err(ValueError::NotInEnum {
                    value: raw.to_string(),
                    allowed: format.to_string(),
                })
            }
        }
    }
}

fn validate_integer(format: &str, raw: &str) -> Result<String, ValueError> {
    let value: i64 = raw
        .trim()
        .parse()
        .map_err(|_| ValueError::InvalidInteger(raw.to_string()))?;

    if let Some(range) = Range::<i64>::parse(format)
        && !range.contains(&value)
    {
        return Err(ValueError::IntegerOutOfRange {
            min: range.min,
            max: range.max,
            actual: value,
        });
    }

    Ok(value.to_string())
}

fn validate_float(format: &str, raw: &str) -> Result<String, ValueError> {
    let value: f64 = raw
        .trim()
        .parse()
        .ok()
        .filter(|v: &f64| v.is_finite())
        .ok_or_else(|| ValueError::InvalidFloat(raw.to_string()))?;

    if let Some(range) = Range::<f64>::parse(format)
        && !range.contains(&value)
    {
        return Err(ValueError::FloatOutOfRange {
            min: range.min,
            max: range.max,
            actual: value,
        });
    }

    Ok(canonical_float(value))
}

/// Formats a float so that whole numbers keep one decimal (`20.0`, not `20`).
fn canonical_float(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strings_and_colors_pass_verbatim() {
        assert_eq!(validate(DataType::String, "", "hello").unwrap(), "hello");
        assert_eq!(validate(DataType::String, "", "").unwrap(), "");
        assert_eq!(
            validate(DataType::Color, "rgb", "not,a,color").unwrap(),
            "not,a,color"
        );
    }

    #[test]
    fn integer_range_inclusive() {
        for v in 0..=100 {
            let raw = v.to_string();
            assert_eq!(validate(DataType::Integer, "0:100", &raw).unwrap(), raw);
        }
        assert!(matches!(
            validate(DataType::Integer, "0:100", "101"),
            Err(ValueError::IntegerOutOfRange { actual: 101, .. })
        ));
        assert!(matches!(
            validate(DataType::Integer, "0:100", "-1"),
            Err(ValueError::IntegerOutOfRange { actual: -1, .. })
        ));
    }

    #[test]
    fn integer_without_range() {
        assert_eq!(
            validate(DataType::Integer, "", "-123456").unwrap(),
            "-123456"
        );
        assert_eq!(validate(DataType::Integer, "", " 42 ").unwrap(), "42");
    }

    #[test]
    fn integer_rejects_garbage() {
        assert!(matches!(
            validate(DataType::Integer, "", "12abc"),
            Err(ValueError::InvalidInteger(_))
        ));
        assert!(validate(DataType::Integer, "", "").is_err());
        assert!(validate(DataType::Integer, "", "1.5").is_err());
    }

    #[test]
    fn float_range() {
        assert_eq!(validate(DataType::Float, "-10:40", "21.5").unwrap(), "21.5");
        assert_eq!(validate(DataType::Float, "-10:40", "40").unwrap(), "40.0");
        assert!(matches!(
            validate(DataType::Float, "-10:40", "40.01"),
            Err(ValueError::FloatOutOfRange { .. })
        ));
    }

    #[test]
    fn float_rejects_non_finite() {
        assert!(validate(DataType::Float, "", "NaN").is_err());
        assert!(validate(DataType::Float, "", "inf").is_err());
        assert!(validate(DataType::Float, "", "warm").is_err());
    }

    #[test]
    fn boolean_literals_only() {
        assert_eq!(validate(DataType::Boolean, "", "true").unwrap(), "true");
        assert_eq!(validate(DataType::Boolean, "", "false").unwrap(), "false");
        assert!(validate(DataType::Boolean, "", "1").is_err());
        assert!(validate(DataType::Boolean, "", "TRUE").is_err());
        assert!(validate(DataType::Boolean, "", "").is_err());
    }

    #[test]
    fn enum_exact_tokens() {
        let format = "red,green,blue";
        assert_eq!(validate(DataType::Enum, format, "green").unwrap(), "green");
        assert_eq!(validate(DataType::Enum, format, "red").unwrap(), "red");
        assert_eq!(validate(DataType::Enum, format, "blue").unwrap(), "blue");
        assert!(validate(DataType::Enum, format, "purple").is_err());
        assert!(validate(DataType::Enum, format, "gree").is_err());
        assert!(validate(DataType::Enum, format, "red,green").is_err());
    }
}
