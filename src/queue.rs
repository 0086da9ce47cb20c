//! Outbound send queue.
//!
//! Any task may enqueue; only the writer loop drains. Enqueueing stores a
//! wake-up permit so a writer that is not currently waiting still sees it.

use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

#[derive(Debug, Default)]
pub struct SendQueue {
    items: Mutex<VecDeque<Value>>,
    signal: Notify,
}

impl SendQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn items(&self) -> MutexGuard<'_, VecDeque<Value>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueue a payload and wake the writer.
    pub fn push(&self, payload: Value) {
        self.items().push_back(payload);
        self.signal.notify_one();
    }

    /// Take everything queued, in enqueue order.
    pub fn drain(&self) -> Vec<Value> {
        self.items().drain(..).collect()
    }

    /// Resolves on the next [`SendQueue::push`], or immediately if a push
    /// happened since the last wake-up.
    pub async fn notified(&self) {
        self.signal.notified().await;
    }

    pub fn clear(&self) {
        self.items().clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items().is_empty()
    }
}
