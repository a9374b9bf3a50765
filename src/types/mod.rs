// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Value types shared by the Homie model.
//!
//! - [`DataType`] - the six Homie property datatypes and their defaults
//! - [`Range`] - the `min:max` constraint carried in a property format

mod datatype;
mod range;

pub use datatype::DataType;
pub use range::Range;
