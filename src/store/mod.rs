//! Record Store
//!
//! Owns the in-memory record collection the UI renders from. Readers take
//! snapshots or subscribe to changes; only the optimistic engine can replace
//! the collection, which keeps every visible mutation rollback-able.

use crate::records::Record;
use std::sync::Arc;
use tokio::sync::watch;

/// Shared handle to the record collection.
///
/// Cloning the handle shares the same collection.
pub struct RecordStore<R> {
    tx: Arc<watch::Sender<Arc<Vec<R>>>>,
}

impl<R> Clone for RecordStore<R> {
    fn clone(&self) -> Self {
        Self {
            tx: Arc::clone(&self.tx),
        }
    }
}

impl<R: Record> RecordStore<R> {
    pub fn new() -> Self {
        Self::with_records(Vec::new())
    }

    pub fn with_records(records: Vec<R>) -> Self {
        let (tx, _rx) = watch::channel(Arc::new(records));
        Self { tx: Arc::new(tx) }
    }

    /// Current collection. Cheap; the vector is shared, not copied.
    pub fn snapshot(&self) -> Arc<Vec<R>> {
        Arc::clone(&self.tx.borrow())
    }

    pub fn get(&self, id: &str) -> Option<R> {
        self.tx.borrow().iter().find(|r| r.id() == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.tx.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.borrow().is_empty()
    }

    /// Receiver that observes every state replacement.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Vec<R>>> {
        self.tx.subscribe()
    }

    pub(crate) fn set_state(&self, records: Arc<Vec<R>>) {
        self.tx.send_replace(records);
    }
}

impl<R: Record> Default for RecordStore<R> {
    fn default() -> Self {
        Self::new()
    }
}
