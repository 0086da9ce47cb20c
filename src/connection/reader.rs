//! Reader loop and inbound dispatch worker.

use crate::codec::FrameDecoder;
use crate::dispatch::{InboundDispatcher, dispatch_guarded};
use crate::protocol::{correlation_id, is_marked_reply};
use crate::request::Link;
use serde_json::Value;
use std::io::ErrorKind;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::net::tcp::OwnedReadHalf;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Errors that mean the peer is gone rather than a transient failure.
const fn is_disconnect(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe
            | ErrorKind::NotConnected
            | ErrorKind::UnexpectedEof
    )
}

/// Read frames until cancelled or the server disconnects.
///
/// A disconnect cancels the whole session.
pub(super) async fn run(
    mut stream: OwnedReadHalf,
    link: Arc<Link>,
    inbound: mpsc::UnboundedSender<Value>,
    cancel: CancellationToken,
    buffer_size: usize,
) {
    let mut decoder = FrameDecoder::new();
    let mut buf = vec![0u8; buffer_size.max(1)];

    loop {
        let received = tokio::select! {
            () = cancel.cancelled() => {
                info!("Read loop cancelled");
                break;
            }
            result = stream.read(&mut buf) => result,
        };

        match received {
            // Readable with nothing to read: the server closed its end.
            Ok(0) => {
                info!("Socket not connected. Terminating...");
                cancel.cancel();
                break;
            }
            Ok(n) => {
                trace!(bytes = n, "Received data");
                decoder.extend(&buf[..n]);
                for frame in decoder.frames() {
                    match frame {
                        Ok(payload) => route(payload, &link, &inbound),
                        Err(e) => warn!(error = %e, "Dropping malformed frame"),
                    }
                }
            }
            Err(e) if is_disconnect(e.kind()) => {
                info!(error = %e, "Connection lost. Terminating...");
                cancel.cancel();
                break;
            }
            Err(e) => warn!(error = %e, "Error while receiving data"),
        }
    }

    info!("Read loop terminated");
}

/// Complete a pending request, or hand the payload to the dispatcher.
fn route(payload: Value, link: &Link, inbound: &mpsc::UnboundedSender<Value>) {
    let payload = match correlation_id(&payload) {
        Some(id) => match link.pending.resolve(id, payload) {
            Ok(()) => {
                debug!(id, "Reply delivered");
                return;
            }
            Err(payload) => payload,
        },
        None => payload,
    };

    if is_marked_reply(&payload) {
        debug!(id = ?correlation_id(&payload), "Dropping reply with no pending request");
        return;
    }

    if inbound.send(payload).is_err() {
        debug!("Dispatch worker stopped, dropping inbound message");
    }
}

/// Dispatch inbound messages one at a time, in arrival order, and queue
/// each reply for the writer.
pub(super) async fn dispatch_loop(
    mut inbound: mpsc::UnboundedReceiver<Value>,
    dispatcher: Arc<dyn InboundDispatcher>,
    link: Arc<Link>,
    cancel: CancellationToken,
) {
    loop {
        let message = tokio::select! {
            () = cancel.cancelled() => break,
            message = inbound.recv() => match message {
                Some(message) => message,
                None => break,
            },
        };

        // Dropping the dispatch future on cancel aborts its task.
        let reply = tokio::select! {
            () = cancel.cancelled() => {
                debug!("Dispatch aborted by shutdown");
                break;
            }
            reply = dispatch_guarded(Arc::clone(&dispatcher), message) => reply,
        };
        debug!(status = ?reply.status, "Queueing dispatcher reply");
        link.queue.push(reply.into_value());
    }
    debug!("Dispatch worker terminated");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::DispatchReply;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    struct Stalling {
        finished: Arc<AtomicBool>,
    }

    #[async_trait]
    impl InboundDispatcher for Stalling {
        async fn dispatch(&self, _message: Value) -> DispatchReply {
            tokio::time::sleep(Duration::from_millis(200)).await;
            self.finished.store(true, Ordering::SeqCst);
            DispatchReply::success("done")
        }
    }

    #[tokio::test]
    async fn test_cancel_aborts_running_dispatch() {
        let link = Arc::new(Link::new(Duration::from_secs(1)));
        let finished = Arc::new(AtomicBool::new(false));
        let dispatcher = Arc::new(Stalling {
            finished: Arc::clone(&finished),
        });
        let cancel = CancellationToken::new();
        let (tx, rx) = mpsc::unbounded_channel();

        let worker = tokio::spawn(dispatch_loop(
            rx,
            dispatcher,
            Arc::clone(&link),
            cancel.clone(),
        ));
        tx.send(json!({"task_action": "run_task"})).expect("send");
        tokio::time::sleep(Duration::from_millis(50)).await;

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), worker)
            .await
            .expect("worker should stop on cancel")
            .expect("join");

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(!finished.load(Ordering::SeqCst));
        assert!(link.queue.is_empty());
    }

    #[test]
    fn test_disconnect_kinds() {
        assert!(is_disconnect(ErrorKind::ConnectionReset));
        assert!(is_disconnect(ErrorKind::BrokenPipe));
        assert!(!is_disconnect(ErrorKind::Interrupted));
        assert!(!is_disconnect(ErrorKind::WouldBlock));
    }

    #[tokio::test]
    async fn test_route_prefers_pending_request() {
        let link = Link::new(Duration::from_secs(1));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (id, reply) = link.pending.register();

        route(json!({"id": id, "status": "ok"}), &link, &tx);

        assert_eq!(reply.await.expect("reply")["status"], "ok");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_route_drops_stale_reply() {
        let link = Link::new(Duration::from_secs(1));
        let (tx, mut rx) = mpsc::unbounded_channel();

        route(json!({"id": 77, "is_reply_message": true}), &link, &tx);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_route_forwards_task_messages() {
        let link = Link::new(Duration::from_secs(1));
        let (tx, mut rx) = mpsc::unbounded_channel();

        let message = json!({"task_action": "remove_task", "parameters": ["abc"]});
        route(message.clone(), &link, &tx);
        assert_eq!(rx.try_recv().expect("forwarded"), message);
    }
}
