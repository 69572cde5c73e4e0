//! Callback expectation registry
//!
//! Maps a correlation id to the fiat value registered for it. Written by
//! the reconciler on start/stop, read concurrently by HTTP handler tasks.
//! Uses DashMap so neither side ever blocks the other.

use dashmap::DashMap;
use uuid::Uuid;

pub struct CallbackRegistry {
    expectations: DashMap<Uuid, f64>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self {
            expectations: DashMap::new(),
        }
    }

    /// Register a correlation id with the fiat value its callbacks carry.
    ///
    /// Called before the create request goes out, so a callback racing
    /// ahead of the HTTP response still finds its registration.
    pub fn register(&self, correlation_id: Uuid, fiat_value: f64) {
        self.expectations.insert(correlation_id, fiat_value);
        tracing::debug!(%correlation_id, fiat_value, "Callback expectation registered");
    }

    /// Drop a registration. Safe to call for ids never registered.
    pub fn unregister(&self, correlation_id: &Uuid) {
        if self.expectations.remove(correlation_id).is_some() {
            tracing::debug!(%correlation_id, "Callback expectation unregistered");
        }
    }

    /// Registered fiat value for a correlation id, if any.
    pub fn expectation(&self, correlation_id: &Uuid) -> Option<f64> {
        self.expectations.get(correlation_id).map(|v| *v)
    }

    /// Number of live registrations.
    pub fn len(&self) -> usize {
        self.expectations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expectations.is_empty()
    }
}

impl Default for CallbackRegistry {
    fn default() -> Self {
        Self::new()
    }
}
