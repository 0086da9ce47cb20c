//! Action requests.
//!
//! Every builder (keyboard, mouse, shared memory, tool, system) is a thin
//! wrapper around [`RequestGenerator`]: it turns its arguments into an
//! [`Action`], queues the envelope, and waits for the correlated reply.

mod keyboard;
mod mouse;
mod shared_memory;
mod system;
mod tool;

pub use keyboard::KeyboardRequest;
pub use mouse::MouseRequest;
pub use shared_memory::{SharedMemoryInstance, SharedMemoryRequest};
pub(crate) use system::SystemRequest;
pub use tool::ToolRequest;

use crate::pending::PendingTable;
use crate::protocol::{Action, RequestEnvelope, reply_succeeded};
use crate::queue::SendQueue;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// State shared between a [`Client`](crate::Client) and its requesters.
#[derive(Debug)]
pub(crate) struct Link {
    pub(crate) pending: PendingTable,
    pub(crate) queue: SendQueue,
    pub(crate) request_timeout: Duration,
}

impl Link {
    pub(crate) fn new(request_timeout: Duration) -> Self {
        Self {
            pending: PendingTable::new(),
            queue: SendQueue::new(),
            request_timeout,
        }
    }
}

/// A request registered in the pending table but not yet sent.
pub(crate) struct Prepared {
    pub(crate) id: u64,
    pub(crate) payload: Value,
    pub(crate) reply: oneshot::Receiver<Value>,
}

/// Shared request/reply behaviour for every action type.
///
/// Each call allocates its own id and parameter set, so one generator can
/// be used from several tasks at once.
#[derive(Debug, Clone)]
pub struct RequestGenerator {
    link: Arc<Link>,
}

impl RequestGenerator {
    pub(crate) const fn new(link: Arc<Link>) -> Self {
        Self { link }
    }

    /// Register a fresh id for `action` and build its envelope.
    pub(crate) fn prepare(&self, action: &Action) -> Option<Prepared> {
        let (id, reply) = self.link.pending.register();
        match serde_json::to_value(RequestEnvelope::new(id, action)) {
            Ok(payload) => Some(Prepared { id, payload, reply }),
            Err(e) => {
                self.link.pending.remove(id);
                warn!(id, error = %e, "Failed to serialize request");
                None
            }
        }
    }

    /// Queue `action` and wait for its reply.
    ///
    /// Returns `None` if no reply arrives within the client timeout or the
    /// connection is stopped while waiting.
    pub async fn send_request(&self, action: Action) -> Option<Value> {
        let Prepared { id, payload, reply } = self.prepare(&action)?;
        debug!(
            id,
            device = action.device(),
            action = action.name(),
            "Queueing request"
        );
        self.link.queue.push(payload);
        self.wait_for_reply(id, reply).await
    }

    pub(crate) async fn wait_for_reply(
        &self,
        id: u64,
        reply: oneshot::Receiver<Value>,
    ) -> Option<Value> {
        match tokio::time::timeout(self.link.request_timeout, reply).await {
            Ok(Ok(payload)) => Some(payload),
            Ok(Err(_)) => {
                debug!(id, "Pending request dropped before a reply arrived");
                None
            }
            Err(_) => {
                self.link.pending.remove(id);
                warn!(id, "Timed out waiting for reply");
                None
            }
        }
    }

    /// Wait for a reply on a background task, only logging the outcome.
    pub(crate) fn wait_detached(&self, id: u64, reply: oneshot::Receiver<Value>) {
        let generator = self.clone();
        tokio::spawn(async move {
            if generator.wait_for_reply(id, reply).await.is_some() {
                debug!(id, "Server acknowledged system request");
            }
        });
    }
}

/// `true` when a reply arrived and does not report failure.
pub(crate) fn acknowledged(reply: Option<Value>) -> bool {
    reply.is_some_and(|r| reply_succeeded(&r))
}

/// Everything a user task can drive on the host.
#[derive(Debug, Clone)]
pub struct Controller {
    pub key: KeyboardRequest,
    pub mouse: MouseRequest,
    pub mem: SharedMemoryRequest,
    pub tool: ToolRequest,
}

impl Controller {
    pub(crate) fn new(link: &Arc<Link>) -> Self {
        let generator = RequestGenerator::new(Arc::clone(link));
        Self {
            key: KeyboardRequest::new(generator.clone()),
            mouse: MouseRequest::new(generator.clone()),
            mem: SharedMemoryRequest::new(generator.clone()),
            tool: ToolRequest::new(generator),
        }
    }
}
