//! Stub automation server for tests.
//!
//! Speaks the wire framing over loopback TCP so scenarios can script the
//! server side of a session:
//!
//! ```ignore
//! let server = StubServer::bind().await;
//! let mut client = Client::new(ClientConfig::new(server.port()));
//! client.start().await?;
//!
//! let mut conn = server.accept().await;
//! let identify = conn.recv(Duration::from_secs(1)).await;
//! let request = conn.recv_request(Duration::from_secs(1)).await.expect("request");
//! conn.reply(&request, json!({"status": "ok"})).await;
//! ```

use crate::codec::{FrameDecoder, encode_frame};
use serde_json::Value;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::Instant;
use tracing::warn;

/// How long [`StubServer::accept`] waits for the client.
const ACCEPT_TIMEOUT: Duration = Duration::from_secs(5);

/// Loopback listener standing in for the automation server.
pub struct StubServer {
    listener: TcpListener,
}

impl StubServer {
    /// Bind to an ephemeral loopback port.
    ///
    /// # Panics
    /// If no loopback port can be bound.
    pub async fn bind() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind stub server");
        Self { listener }
    }

    /// A loopback port with nothing listening on it.
    ///
    /// # Panics
    /// If no loopback port can be bound.
    pub async fn unused_port() -> u16 {
        Self::bind().await.port()
    }

    /// Port the stub listens on.
    ///
    /// # Panics
    /// If the listener has no local address.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.listener
            .local_addr()
            .expect("stub server address")
            .port()
    }

    /// Accept the next client connection.
    ///
    /// # Panics
    /// If no client connects within five seconds.
    pub async fn accept(&self) -> StubConnection {
        let (stream, _) = tokio::time::timeout(ACCEPT_TIMEOUT, self.listener.accept())
            .await
            .expect("client did not connect in time")
            .expect("accept client");
        StubConnection {
            stream,
            decoder: FrameDecoder::new(),
            ready: VecDeque::new(),
        }
    }
}

/// Server side of one accepted client connection.
pub struct StubConnection {
    stream: TcpStream,
    decoder: FrameDecoder,
    ready: VecDeque<Value>,
}

impl StubConnection {
    /// Next decoded payload, or `None` on timeout or disconnect.
    pub async fn recv(&mut self, timeout: Duration) -> Option<Value> {
        let deadline = Instant::now() + timeout;
        let mut buf = [0u8; 4096];

        loop {
            if let Some(payload) = self.ready.pop_front() {
                return Some(payload);
            }

            let read = tokio::time::timeout_at(deadline, self.stream.read(&mut buf)).await;
            match read {
                Ok(Ok(0) | Err(_)) | Err(_) => return None,
                Ok(Ok(n)) => {
                    self.decoder.extend(&buf[..n]);
                    for frame in self.decoder.frames() {
                        match frame {
                            Ok(payload) => self.ready.push_back(payload),
                            Err(e) => warn!(error = %e, "Stub server got malformed frame"),
                        }
                    }
                }
            }
        }
    }

    /// Next payload accepted by `pred`; others are discarded.
    pub async fn recv_matching<F>(&mut self, timeout: Duration, pred: F) -> Option<Value>
    where
        F: Fn(&Value) -> bool,
    {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let payload = self.recv(remaining).await?;
            if pred(&payload) {
                return Some(payload);
            }
        }
    }

    /// Next non-system request (skips identify and keep-alive).
    pub async fn recv_request(&mut self, timeout: Duration) -> Option<Value> {
        self.recv_matching(timeout, |p| p["type"] != "system").await
    }

    /// Send one framed payload.
    ///
    /// # Panics
    /// If the client has gone away.
    pub async fn send(&mut self, payload: &Value) {
        let frame = encode_frame(payload).expect("encode frame");
        self.send_raw(&frame).await;
    }

    /// Write raw bytes, e.g. several frames in one packet.
    ///
    /// # Panics
    /// If the client has gone away.
    pub async fn send_raw(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).await.expect("write to client");
    }

    /// Answer `request` with `body` plus the request's id.
    ///
    /// # Panics
    /// If `body` is not a JSON object or the client has gone away.
    pub async fn reply(&mut self, request: &Value, mut body: Value) {
        body.as_object_mut()
            .expect("reply body must be an object")
            .insert("id".to_string(), request["id"].clone());
        self.send(&body).await;
    }

    /// Close the connection from the server side.
    pub async fn close(mut self) {
        let _ = self.stream.shutdown().await;
    }
}
