// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Serialization of initial-publishing bursts.
//!
//! When several devices share one process and one uplink, only one of
//! them at a time may run its initial advertisement. The
//! [`PublishCoordinator`] is a single-slot token shared by those devices;
//! devices that cannot take it simply try again on their next tick.

use std::fmt;
use std::sync::{Arc, LazyLock};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

/// Global counter for generating unique device keys.
static DEVICE_KEY_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a [`Device`](crate::Device).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceKey(u64);

impl DeviceKey {
    /// Allocates a fresh key.
    #[must_use]
    pub fn next() -> Self {
        Self(DEVICE_KEY_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw key value.
    #[must_use]
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for DeviceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Single-slot token gating initial publishing.
///
/// Cloning shares the slot. Independent coordinators never interact.
///
/// # Examples
///
/// ```
/// use homie_lib::{DeviceKey, PublishCoordinator};
///
/// let coordinator = PublishCoordinator::new();
/// let (a, b) = (DeviceKey::next(), DeviceKey::next());
///
/// assert!(coordinator.acquire(a));
/// assert!(coordinator.acquire(a)); // re-entrant for the holder
/// assert!(!coordinator.acquire(b));
///
/// coordinator.release(a);
/// assert!(coordinator.acquire(b));
/// ```
#[derive(Debug, Clone, Default)]
pub struct PublishCoordinator {
    holder: Arc<Mutex<Option<DeviceKey>>>,
}

impl PublishCoordinator {
    /// Creates a coordinator with an empty slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the process-wide coordinator used by devices that were not
    /// given one explicitly.
    #[must_use]
    pub fn global() -> Self {
        static GLOBAL: LazyLock<PublishCoordinator> = LazyLock::new(PublishCoordinator::new);
        GLOBAL.clone()
    }

    /// Takes the token for `device` if the slot is empty or already held by it.
    pub fn acquire(&self, device: DeviceKey) -> bool {
        let mut holder = self.holder.lock();
        match *holder {
            Some(current) if current != device => false,
            Some(_) => true,
            None => {
                tracing::trace!(device = %device, "Publish token acquired");
                *holder = Some(device);
                true
            }
        }
    }

    /// Clears the slot if `device` holds it.
    ///
    /// Returns `true` if the token was released.
    pub fn release(&self, device: DeviceKey) -> bool {
        let mut holder = self.holder.lock();
        if *holder == Some(device) {
            tracing::trace!(device = %device, "Publish token released");
            *holder = None;
            true
        } else {
            false
        }
    }

    /// Returns the current holder.
    #[must_use]
    pub fn holder(&self) -> Option<DeviceKey> {
        *self.holder.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_unique() {
        assert_ne!(DeviceKey::next(), DeviceKey::next());
    }

    #[test]
    fn single_slot() {
        let coordinator = PublishCoordinator::new();
        let a = DeviceKey::next();
        let b = DeviceKey::next();

        assert!(coordinator.acquire(a));
        assert_eq!(coordinator.holder(), Some(a));
        assert!(!coordinator.acquire(b));
        assert_eq!(coordinator.holder(), Some(a));
    }

    #[test]
    fn release_only_by_holder() {
        let coordinator = PublishCoordinator::new();
        let a = DeviceKey::next();
        let b = DeviceKey::next();

        coordinator.acquire(a);
        assert!(!coordinator.release(b));
        assert_eq!(coordinator.holder(), Some(a));
        assert!(coordinator.release(a));
        assert_eq!(coordinator.holder(), None);
    }

    #[test]
    fn clones_share_the_slot() {
        let coordinator = PublishCoordinator::new();
        let shared = coordinator.clone();
        let a = DeviceKey::next();
        let b = DeviceKey::next();

        assert!(coordinator.acquire(a));
        assert!(!shared.acquire(b));
    }

    #[test]
    fn independent_coordinators() {
        let first = PublishCoordinator::new();
        let second = PublishCoordinator::new();
        let a = DeviceKey::next();
        let b = DeviceKey::next();

        assert!(first.acquire(a));
        assert!(second.acquire(b));
    }
}
