// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Plain-text diagnostic sinks.
//!
//! Everything the library reports goes through `tracing`. Hosts that just
//! want lines of text (a serial console, a status page) can install a
//! [`TextSinkLayer`] and register callbacks on it.
//!
//! ```
//! use std::sync::{Arc, Mutex};
//! use tracing_subscriber::layer::SubscriberExt;
//! use homie_lib::diagnostics::TextSinkLayer;
//!
//! let layer = TextSinkLayer::new();
//! let lines = Arc::new(Mutex::new(Vec::new()));
//! let captured = Arc::clone(&lines);
//! layer.register(move |line| captured.lock().unwrap().push(line.to_string()));
//!
//! let subscriber = tracing_subscriber::registry().with(layer);
//! tracing::subscriber::with_default(subscriber, || {
//!     tracing::warn!(topic = "homie/kitchen/$state", "Publish failed");
//! });
//!
//! let lines = lines.lock().unwrap();
//! assert!(lines[0].starts_with("WARN "));
//! assert!(lines[0].ends_with(": Publish failed topic=homie/kitchen/$state"));
//! ```

use std::fmt::{self, Write as _};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

use crate::subscription::{CallbackList, SubscriptionId};

/// A `tracing` layer that renders events as single lines of text and
/// hands them to registered callbacks.
///
/// Clones share the same callbacks, so a clone can be kept to register
/// sinks after the layer has been installed. Events from targets outside
/// this crate are rendered too; filter with a `tracing_subscriber` filter
/// if that is not wanted.
#[derive(Clone, Default)]
pub struct TextSinkLayer {
    sinks: Arc<RwLock<CallbackList<str>>>,
}

impl TextSinkLayer {
    /// Creates a layer with no sinks.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a sink. Sinks run in registration order.
    pub fn register<F>(&self, sink: F) -> SubscriptionId
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.sinks.write().register(sink)
    }

    /// Removes a sink.
    pub fn unregister(&self, id: SubscriptionId) -> bool {
        self.sinks.write().remove(id)
    }

    /// Returns the number of registered sinks.
    #[must_use]
    pub fn sink_count(&self) -> usize {
        self.sinks.read().len()
    }
}

impl fmt::Debug for TextSinkLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextSinkLayer")
            .field("sinks", &self.sink_count())
            .finish()
    }
}

impl<S: Subscriber> Layer<S> for TextSinkLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let sinks = self.sinks.read();
        if sinks.is_empty() {
            return;
        }

        let mut line = LineVisitor::default();
        event.record(&mut line);

        let metadata = event.metadata();
        let rendered = format!("{} {}: {}", metadata.level(), metadata.target(), line.finish());
        sinks.dispatch(rendered.as_str());
    }
}

#[derive(Default)]
struct LineVisitor {
    message: String,
    fields: String,
}

impl LineVisitor {
    fn finish(self) -> String {
        self.message + &self.fields
    }
}

impl Visit for LineVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            let _ = write!(self.fields, " {}={value}", field.name());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{value:?}");
        } else {
            let _ = write!(self.fields, " {}={value:?}", field.name());
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use tracing_subscriber::layer::SubscriberExt;

    use super::*;

    fn capture(layer: &TextSinkLayer) -> Arc<Mutex<Vec<String>>> {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let captured = Arc::clone(&lines);
        layer.register(move |line| captured.lock().unwrap().push(line.to_string()));
        lines
    }

    #[test]
    fn renders_message_and_fields() {
        let layer = TextSinkLayer::new();
        let lines = capture(&layer);

        let subscriber = tracing_subscriber::registry().with(layer.clone());
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(device = "kitchen", stage = 3, "Initial publishing");
        });

        let lines = lines.lock().unwrap();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("INFO "));
        assert!(lines[0].ends_with("Initial publishing device=kitchen stage=3"));
    }

    #[test]
    fn sinks_run_in_order() {
        let layer = TextSinkLayer::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for n in 0..3 {
            let order = Arc::clone(&order);
            layer.register(move |_| order.lock().unwrap().push(n));
        }

        let subscriber = tracing_subscriber::registry().with(layer);
        tracing::subscriber::with_default(subscriber, || tracing::warn!("x"));

        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn unregistered_sink_is_silent() {
        let layer = TextSinkLayer::new();
        let lines = Arc::new(Mutex::new(Vec::new()));
        let captured = Arc::clone(&lines);
        let id = layer.register(move |line| captured.lock().unwrap().push(line.to_string()));
        assert!(layer.unregister(id));
        assert_eq!(layer.sink_count(), 0);

        let subscriber = tracing_subscriber::registry().with(layer);
        tracing::subscriber::with_default(subscriber, || tracing::warn!("x"));

        assert!(lines.lock().unwrap().is_empty());
    }
}
