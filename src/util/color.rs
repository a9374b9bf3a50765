// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Color payload parsing.
//!
//! Homie color properties carry `r,g,b` or `h,s,v` triples. Both parsers
//! return the color packed as `0xRRGGBB`.

fn triple<T: std::str::FromStr>(payload: &str) -> Option<(T, T, T)> {
    let mut parts = payload.split(',').map(|part| part.trim().parse::<T>());
    let first = parts.next()?.ok()?;
    let second = parts.next()?.ok()?;
    let third = parts.next()?.ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((first, second, third))
}

const fn pack(r: u8, g: u8, b: u8) -> u32 {
    ((r as u32) << 16) | ((g as u32) << 8) | b as u32
}

/// Parses an `r,g,b` payload with components in `0..=255`.
///
/// # Examples
///
/// ```
/// use homie_lib::util::parse_rgb;
///
/// assert_eq!(parse_rgb("255,128,0"), Some(0xFF8000));
/// assert_eq!(parse_rgb("256,0,0"), None);
/// ```
#[must_use]
pub fn parse_rgb(payload: &str) -> Option<u32> {
    let (r, g, b) = triple::<u8>(payload)?;
    Some(pack(r, g, b))
}

/// Parses an `h,s,v` payload (hue `0..=360`, saturation and value `0..=100`).
///
/// # Examples
///
/// ```
/// use homie_lib::util::parse_hsv;
///
/// assert_eq!(parse_hsv("0,100,100"), Some(0xFF0000));
/// assert_eq!(parse_hsv("120,100,100"), Some(0x00FF00));
/// assert_eq!(parse_hsv("0,0,0"), Some(0x000000));
/// ```
#[must_use]
pub fn parse_hsv(payload: &str) -> Option<u32> {
    let (h, s, v) = triple::<u16>(payload)?;
    if h > 360 || s > 100 || v > 100 {
        return None;
    }
    let (r, g, b) = hsv_to_rgb(h, s, v);
    Some(pack(r, g, b))
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::many_single_char_names
)]
fn hsv_to_rgb(h: u16, s: u16, v: u16) -> (u8, u8, u8) {
    let h = f32::from(h);
    let s = f32::from(s) / 100.0;
    let v = f32::from(v) / 100.0;

    let c = v * s;
    let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
    let m = v - c;

    let (r, g, b) = match h {
        h if h < 60.0 => (c, x, 0.0),
        h if h < 120.0 => (x, c, 0.0),
        h if h < 180.0 => (0.0, c, x),
        h if h < 240.0 => (0.0, x, c),
        h if h < 300.0 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };

    let channel = |value: f32| ((value + m) * 255.0).round().clamp(0.0, 255.0) as u8;
    (channel(r), channel(g), channel(b))
}
