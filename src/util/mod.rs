// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Stateless formatting helpers.

mod color;
mod slug;

pub use color::{parse_hsv, parse_rgb};
pub use slug::device_id_from_name;
