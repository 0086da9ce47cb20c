//! Correlation table for requests awaiting a reply.
//!
//! Each outstanding request owns one entry: an id mapped to the sending half
//! of a oneshot channel. The reader loop fulfils the entry when a payload with
//! that id arrives; the requester removes it if its wait times out.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;

/// Pending-request table shared by the reader loop and every requester.
#[derive(Debug)]
pub struct PendingTable {
    next_id: AtomicU64,
    entries: Mutex<HashMap<u64, oneshot::Sender<Value>>>,
}

impl PendingTable {
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<u64, oneshot::Sender<Value>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Allocate a fresh id and register an entry for it.
    ///
    /// The id is distinct from every id currently outstanding.
    pub fn register(&self) -> (u64, oneshot::Receiver<Value>) {
        let (tx, rx) = oneshot::channel();
        let mut entries = self.entries();
        loop {
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            // 0 is skipped after wrap-around so ids stay positive on the wire
            if id == 0 || entries.contains_key(&id) {
                continue;
            }
            entries.insert(id, tx);
            return (id, rx);
        }
    }

    /// Deliver a reply to the entry registered under `id`.
    ///
    /// Returns the payload back if no such entry exists.
    pub fn resolve(&self, id: u64, payload: Value) -> Result<(), Value> {
        let Some(tx) = self.entries().remove(&id) else {
            return Err(payload);
        };
        // The requester may have given up between lookup and send.
        let _ = tx.send(payload);
        Ok(())
    }

    /// Drop the entry for `id`, releasing the id for reuse.
    pub fn remove(&self, id: u64) -> bool {
        self.entries().remove(&id).is_some()
    }

    /// Whether `id` is currently outstanding.
    #[must_use]
    pub fn contains(&self, id: u64) -> bool {
        self.entries().contains_key(&id)
    }

    /// Drop every entry. Waiters observe a closed channel.
    pub fn clear(&self) {
        self.entries().clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

impl Default for PendingTable {
    fn default() -> Self {
        Self::new()
    }
}
