//! Handling of inbound messages that are not replies.
//!
//! The server pushes task-control messages over the same connection. Each
//! one is handed to an [`InboundDispatcher`] and its [`DispatchReply`] is
//! queued for sending.

use crate::protocol::DispatchReply;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio_util::task::AbortOnDropHandle;
use tracing::warn;

/// Turns an inbound message into the reply sent back to the server.
#[async_trait]
pub trait InboundDispatcher: Send + Sync {
    async fn dispatch(&self, message: Value) -> DispatchReply;
}

/// Rejects every inbound message.
#[derive(Debug, Clone, Copy, Default)]
pub struct RejectAll;

#[async_trait]
impl InboundDispatcher for RejectAll {
    async fn dispatch(&self, _message: Value) -> DispatchReply {
        DispatchReply::failure("No task handler is installed")
    }
}

/// Run the dispatcher on its own task so a panic becomes a failure reply.
///
/// Dropping the returned future aborts the dispatcher task.
pub(crate) async fn dispatch_guarded(
    dispatcher: Arc<dyn InboundDispatcher>,
    message: Value,
) -> DispatchReply {
    let job = AbortOnDropHandle::new(tokio::spawn(async move {
        dispatcher.dispatch(message).await
    }));
    match job.await {
        Ok(reply) => reply,
        Err(e) => {
            warn!(error = %e, "Inbound dispatcher failed");
            DispatchReply::failure(format!("Dispatcher failed: {e}"))
        }
    }
}
