//! Model change subscription.
//!
//! The connection handler only needs two capabilities from a model: register a
//! change callback and release it again. [`InMemoryModel`] is the registry the
//! bundled server uses; embedders can plug in their own [`ModelListener`].

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use uuid::Uuid;

/// Callback invoked with every change notification
pub type ChangeCallback = Arc<dyn Fn(&Value) + Send + Sync>;

/// Opaque handle returned by [`ModelListener::register_listener`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(Uuid);

impl ListenerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ListenerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Source of change notifications
pub trait ModelListener: Send + Sync {
    fn register_listener(&self, callback: ChangeCallback) -> ListenerId;

    fn unregister_listener(&self, id: ListenerId);
}

/// Listener registry holding callbacks in a concurrent map
#[derive(Default)]
pub struct InMemoryModel {
    listeners: DashMap<ListenerId, ChangeCallback>,
}

impl InMemoryModel {
    pub fn new() -> Self {
        Self {
            listeners: DashMap::new(),
        }
    }

    /// Notify every registered listener of `change`.
    ///
    /// Callbacks run outside the map lock so they may unregister themselves.
    /// Returns the number of listeners notified.
    pub fn publish(&self, change: &Value) -> usize {
        let callbacks: Vec<ChangeCallback> = self
            .listeners
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        for callback in &callbacks {
            callback(change);
        }

        tracing::debug!(listeners = callbacks.len(), "Published model change");
        callbacks.len()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl ModelListener for InMemoryModel {
    fn register_listener(&self, callback: ChangeCallback) -> ListenerId {
        let id = ListenerId::new();
        self.listeners.insert(id, callback);
        tracing::debug!(listener_id = %id, "Model listener registered");
        id
    }

    fn unregister_listener(&self, id: ListenerId) {
        if self.listeners.remove(&id).is_some() {
            tracing::debug!(listener_id = %id, "Model listener unregistered");
        }
    }
}
