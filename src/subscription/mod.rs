// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Value-change notification.
//!
//! Every [`Property`](crate::Property) owns a [`CallbackList`] of
//! observers that run when an inbound message is accepted.
//!
//! - [`SubscriptionId`] - handle returned on registration, used to remove a callback
//! - [`CallbackList`] - ordered observer list
//!
//! # Usage
//!
//! ```
//! use homie_lib::{DataType, Property};
//!
//! let mut power = Property::new("power", "Power", DataType::Boolean).with_settable(true);
//! let id = power.on_change(|prop| {
//!     println!("power is now {}", prop.value());
//! });
//!
//! // Later, stop listening
//! assert!(power.remove_callback(id));
//! ```

mod callback;

pub use callback::{CallbackList, SubscriptionId};
