// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Topic-safe ids from human readable names.

#[derive(Clone, Copy, PartialEq, Eq)]
enum Last {
    Hyphen,
    Upper,
    Lower,
    Digit,
}

/// Derives a Homie id from a display name.
///
/// ASCII letters are lower-cased, a lower-to-upper transition starts a new
/// word, and every run of other characters collapses into one hyphen.
///
/// # Examples
///
/// ```
/// use homie_lib::util::device_id_from_name;
///
/// assert_eq!(device_id_from_name("Kitchen Controller"), "kitchen-controller");
/// assert_eq!(device_id_from_name("LivingRoom2"), "living-room2");
/// assert_eq!(device_id_from_name("  Hall / Lamp "), "hall-lamp-");
/// ```
#[must_use]
pub fn device_id_from_name(name: &str) -> String {
    let mut id = String::with_capacity(name.len());
    let mut last = Last::Hyphen;

    for c in name.chars() {
        if c.is_ascii_digit() {
            id.push(c);
            last = Last::Digit;
        } else if c.is_ascii_uppercase() {
            if last == Last::Lower {
                id.push('-');
            }
            id.push(c.to_ascii_lowercase());
            last = Last::Upper;
        } else if c.is_ascii_lowercase() {
            id.push(c);
            last = Last::Lower;
        } else {
            if last != Last::Hyphen {
                id.push('-');
            }
            last = Last::Hyphen;
        }
    }

    id
}
