// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `min:max` range constraints.

use std::str::FromStr;

/// Inclusive range parsed from a numeric property format such as `"0:100"`.
///
/// # Examples
///
/// ```
/// use homie_lib::Range;
///
/// let range: Range<i64> = Range::parse("-10:40").unwrap();
/// assert!(range.contains(&-10));
/// assert!(!range.contains(&41));
///
/// // No colon, no constraint
/// assert!(Range::<i64>::parse("").is_none());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Range<T> {
    /// Lower bound (inclusive).
    pub min: T,
    /// Upper bound (inclusive).
    pub max: T,
}

impl<T: FromStr + PartialOrd> Range<T> {
    /// Parses a `min:max` format.
    ///
    /// Each bound is read from its longest leading part that parses, so
    /// `"0.5:10"` read as integers is `0:10`. Returns `None` when the
    /// format carries no range (no colon, or a colon in first position)
    /// and, with a warning, when a bound has no numeric prefix at all.
    #[must_use]
    pub fn parse(format: &str) -> Option<Self> {
        let (min, max) = format.split_once(':')?;
        if min.is_empty() {
            return None;
        }
        if let (Some(min), Some(max)) = (leading(min), leading(max)) {
            Some(Self { min, max })
        } else {
            tracing::warn!(format = %format, "Malformed range format, values are not range checked");
            None
        }
    }

    /// Returns whether `value` lies within `[min, max]`.
    pub fn contains(&self, value: &T) -> bool {
        *value >= self.min && *value <= self.max
    }
}

/// Parses the longest prefix of `raw` that forms a valid `T`.
fn leading<T: FromStr>(raw: &str) -> Option<T> {
    let raw = raw.trim();
    raw.char_indices()
        .map(|(index, c)| index + c.len_utf8())
        .rev()
        .find_map(|end| raw[..end].parse().ok())
}
