use std::sync::Arc;

use agora_codec::{AppendOnlyPayload, ProtectedStorageEntry};
use parking_lot::Mutex;

/// Listener for main-map mutations.
pub trait EntryMapListener: Send + Sync {
    fn on_added(&self, entries: &[ProtectedStorageEntry]);
    fn on_removed(&self, entries: &[ProtectedStorageEntry]);
}

/// Listener for append-only ingest.
pub trait AppendOnlyListener: Send + Sync {
    fn on_added(&self, payload: &AppendOnlyPayload);
}

/// Copy-on-write listener registry.
///
/// Iteration works on a snapshot so user callbacks never run under the
/// registry lock (or the main-map lock).
pub struct ListenerSet<L: ?Sized> {
    listeners: Mutex<Vec<Arc<L>>>,
}

impl<L: ?Sized> Default for ListenerSet<L> {
    fn default() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
        }
    }
}

impl<L: ?Sized> ListenerSet<L> {
    pub fn add(&self, listener: Arc<L>) {
        self.listeners.lock().push(listener);
    }

    /// Removes a previously added listener by identity.
    pub fn remove(&self, listener: &Arc<L>) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|l| !Arc::ptr_eq(l, listener));
        listeners.len() != before
    }

    pub fn snapshot(&self) -> Vec<Arc<L>> {
        self.listeners.lock().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.lock().is_empty()
    }
}
