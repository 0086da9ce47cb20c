//! Writer loop: the only task that writes to the socket once running.

use super::ClientError;
use crate::codec::encode_frame;
use crate::request::{Link, RequestGenerator, SystemRequest};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Encode `payload` and write it as one frame.
pub(super) async fn send_frame<W>(stream: &mut W, payload: &Value) -> Result<(), ClientError>
where
    W: AsyncWrite + Unpin,
{
    let frame = encode_frame(payload).map_err(ClientError::Encode)?;
    stream.write_all(&frame).await.map_err(ClientError::Io)?;
    trace!(bytes = frame.len(), "Sent frame");
    Ok(())
}

/// Drain the send queue until cancelled.
///
/// Waits at most `idle` for work. If the wait times out with nothing
/// queued, a keep-alive goes out instead so the server keeps the session.
pub(super) async fn run(
    mut stream: OwnedWriteHalf,
    link: Arc<Link>,
    cancel: CancellationToken,
    idle: Duration,
) {
    let system = SystemRequest::new(RequestGenerator::new(Arc::clone(&link)));

    loop {
        let woken = tokio::select! {
            () = cancel.cancelled() => {
                info!("Write loop cancelled");
                break;
            }
            result = tokio::time::timeout(idle, link.queue.notified()) => result.is_ok(),
        };

        let batch = link.queue.drain();
        if batch.is_empty() {
            // A leftover wake-up from an already drained push is not idleness.
            if !woken {
                keep_alive(&mut stream, &system).await;
            }
            continue;
        }

        for payload in batch {
            if let Err(e) = send_frame(&mut stream, &payload).await {
                warn!(error = %e, "Exception while sending message");
            }
        }
    }

    if let Err(e) = stream.shutdown().await {
        debug!(error = %e, "Socket shutdown failed");
    }
    info!("Write loop terminated");
}

async fn keep_alive(stream: &mut OwnedWriteHalf, system: &SystemRequest) {
    let Some((id, payload)) = system.keep_alive() else {
        return;
    };
    match send_frame(stream, &payload).await {
        Ok(()) => debug!(id, "Sent keep-alive"),
        Err(e) => warn!(id, error = %e, "Failed to send keep-alive"),
    }
}
