// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Observer lists.

use std::fmt;

/// Unique identifier for a registered callback.
///
/// IDs are unique within the list that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Returns the raw ID value.
    #[must_use]
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sub({})", self.0)
    }
}

type Callback<T> = Box<dyn Fn(&T) + Send + Sync>;

/// Ordered list of callbacks observing a `T`.
///
/// Callbacks run synchronously in registration order. They receive a
/// shared reference, so a callback cannot change the value it observes
/// from within the notification.
pub struct CallbackList<T: ?Sized> {
    next_id: u64,
    entries: Vec<(SubscriptionId, Callback<T>)>,
}

impl<T: ?Sized> Default for CallbackList<T> {
    fn default() -> Self {
        Self {
            next_id: 1,
            entries: Vec::new(),
        }
    }
}

impl<T: ?Sized> CallbackList<T> {
    /// Creates an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a callback.
    pub fn register<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, Box::new(callback)));
        id
    }

    /// Removes a callback.
    ///
    /// Returns `true` if a callback was found and removed.
    pub fn remove(&mut self, id: SubscriptionId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry, _)| *entry != id);
        self.entries.len() != before
    }

    /// Calls every callback with `value`, in registration order.
    pub fn dispatch(&self, value: &T) {
        for (_, callback) in &self.entries {
            callback(value);
        }
    }

    /// Returns the number of registered callbacks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether no callback is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes all callbacks.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<T: ?Sized> fmt::Debug for CallbackList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackList")
            .field("callbacks", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;

    #[test]
    fn dispatch_in_registration_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut list = CallbackList::<u32>::new();

        let first = Arc::clone(&seen);
        list.register(move |v| first.lock().push(("first", *v)));
        let second = Arc::clone(&seen);
        list.register(move |v| second.lock().push(("second", *v)));

        list.dispatch(&7);
        assert_eq!(*seen.lock(), vec![("first", 7), ("second", 7)]);
    }

    #[test]
    fn remove_callback() {
        let mut list = CallbackList::<str>::new();
        let id = list.register(|_| {});
        assert_eq!(list.len(), 1);
        assert!(list.remove(id));
        assert!(!list.remove(id));
        assert!(list.is_empty());
    }

    #[test]
    fn ids_are_unique() {
        let mut list = CallbackList::<u8>::new();
        let a = list.register(|_| {});
        let b = list.register(|_| {});
        assert_ne!(a, b);
        assert_eq!(a.to_string(), "Sub(1)");
    }
}
