// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Incoming topic routing.
//!
//! The [`TopicRouter`] maps every full topic a device listens on to the
//! property that owns it. A settable property owns two entries, its value
//! topic and its `/set` topic; a standard-MQTT property owns its external
//! topic.
//!
//! ```text
//! MQTT Message: homie/kitchen/light/power/set → true
//!                     ↓
//!             TopicRouter.lookup()
//!                     ↓
//!       PropertyId { node: 0, property: 0 }
//!                     ↓
//!       Device resolves the id and hands the payload over
//! ```

use std::collections::HashMap;

use crate::property::PropertyId;

/// Maps full topics to property handles.
#[derive(Debug, Default, Clone)]
pub struct TopicRouter {
    routes: HashMap<String, PropertyId>,
}

impl TopicRouter {
    /// Creates an empty router.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes `topic` to `property`, replacing any previous owner.
    pub fn insert(&mut self, topic: impl Into<String>, property: PropertyId) {
        let topic = topic.into();
        tracing::trace!(topic = %topic, ?property, "Registering route");
        self.routes.insert(topic, property);
    }

    /// Returns the property owning `topic`.
    #[must_use]
    pub fn lookup(&self, topic: &str) -> Option<PropertyId> {
        self.routes.get(topic).copied()
    }

    /// Removes the route for `topic`.
    ///
    /// Returns `true` if the topic was routed.
    pub fn remove(&mut self, topic: &str) -> bool {
        self.routes.remove(topic).is_some()
    }

    /// Returns the number of routed topics.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns whether no topic is routed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_routed_topics() {
        let mut router = TopicRouter::new();
        let power = PropertyId::new(0, 0);
        router.insert("homie/kitchen/light/power", power);
        router.insert("homie/kitchen/light/power/set", power);

        assert_eq!(router.lookup("homie/kitchen/light/power"), Some(power));
        assert_eq!(router.lookup("homie/kitchen/light/power/set"), Some(power));
        assert_eq!(router.lookup("homie/kitchen/light"), None);
        assert_eq!(router.len(), 2);
    }

    #[test]
    fn insert_replaces_owner() {
        let mut router = TopicRouter::new();
        router.insert("a/b", PropertyId::new(0, 0));
        router.insert("a/b", PropertyId::new(1, 2));
        assert_eq!(router.lookup("a/b"), Some(PropertyId::new(1, 2)));
        assert_eq!(router.len(), 1);
    }

    #[test]
    fn remove_route() {
        let mut router = TopicRouter::new();
        router.insert("a/b", PropertyId::new(0, 0));
        assert!(router.remove("a/b"));
        assert!(!router.remove("a/b"));
        assert!(router.is_empty());
    }
}
