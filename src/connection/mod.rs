//! Connection to the automation server.
//!
//! A [`Client`] owns one TCP session at a time. Starting it connects, sends
//! the identify handshake, then spawns:
//!
//! - the reader loop, which decodes frames and either completes a pending
//!   request or forwards the message to the inbound dispatcher,
//! - the writer loop, which drains the send queue and emits keep-alives
//!   when idle,
//! - a dispatch worker, which runs inbound messages through the
//!   [`InboundDispatcher`] in arrival order.
//!
//! All three share one cancellation token. Stopping cancels it and joins
//! them.

mod reader;
mod writer;

use crate::codec::FrameError;
use crate::config::ClientConfig;
use crate::dispatch::{InboundDispatcher, RejectAll};
use crate::request::{Controller, Link, RequestGenerator, SystemRequest};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpSocket;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Errors surfaced by [`Client::start`].
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("unable to connect to server at {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("identify handshake failed: {0}")]
    Handshake(#[source] Box<ClientError>),

    #[error("failed to encode frame: {0}")]
    Encode(#[source] FrameError),

    #[error("I/O error: {0}")]
    Io(#[source] std::io::Error),
}

/// Handles of a live session.
struct Session {
    cancel: CancellationToken,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
    dispatch: JoinHandle<()>,
    local_port: u16,
}

impl Session {
    fn is_alive(&self) -> bool {
        !self.reader.is_finished() || !self.writer.is_finished()
    }

    async fn shutdown(self) {
        self.cancel.cancel();
        for (name, handle) in [
            ("reader", self.reader),
            ("writer", self.writer),
            ("dispatch", self.dispatch),
        ] {
            if let Err(e) = handle.await {
                warn!(task = name, error = %e, "Connection task ended abnormally");
            }
        }
    }
}

/// Client side of the automation protocol.
pub struct Client {
    config: ClientConfig,
    link: Arc<Link>,
    dispatcher: Arc<dyn InboundDispatcher>,
    session: Option<Session>,
}

impl Client {
    /// Create a stopped client. Inbound messages are rejected until a
    /// dispatcher is installed with [`Client::with_dispatcher`].
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        let link = Arc::new(Link::new(config.client_timeout()));
        Self {
            config,
            link,
            dispatcher: Arc::new(RejectAll),
            session: None,
        }
    }

    /// Install the handler for inbound task-control messages.
    #[must_use]
    pub fn with_dispatcher(mut self, dispatcher: Arc<dyn InboundDispatcher>) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    /// Request builders bound to this client. They stay valid across
    /// restarts.
    #[must_use]
    pub fn controller(&self) -> Controller {
        Controller::new(&self.link)
    }

    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Number of requests currently awaiting a reply.
    #[must_use]
    pub fn pending_requests(&self) -> usize {
        self.link.pending.len()
    }

    /// Local port of the live connection.
    #[must_use]
    pub fn local_port(&self) -> Option<u16> {
        self.session.as_ref().map(|s| s.local_port)
    }

    /// Connect, identify, and start the connection tasks.
    ///
    /// Does nothing if already running. A failed connect is logged and
    /// returned; the client stays stopped and is not retried.
    pub async fn start(&mut self) -> Result<(), ClientError> {
        if self.is_running() {
            warn!("Cannot start client: already running");
            return Ok(());
        }
        if let Some(stale) = self.session.take() {
            stale.shutdown().await;
        }
        self.link.pending.clear();
        self.link.queue.clear();

        let addr = self.config.server_addr();
        info!(%addr, "Establishing connection");
        let stream = match self.connect(addr).await {
            Ok(stream) => stream,
            Err(source) => {
                error!(%addr, error = %source, "Unable to connect to server");
                return Err(ClientError::Connect { addr, source });
            }
        };
        info!("Connection established");

        let local_port = stream.local_addr().map_err(ClientError::Io)?.port();
        let (read_half, mut write_half) = stream.into_split();
        self.identify(&mut write_half, local_port).await?;

        let cancel = CancellationToken::new();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let reader = tokio::spawn(reader::run(
            read_half,
            Arc::clone(&self.link),
            inbound_tx,
            cancel.clone(),
            self.config.receive_buffer_size,
        ));
        let writer = tokio::spawn(writer::run(
            write_half,
            Arc::clone(&self.link),
            cancel.clone(),
            self.config.client_timeout(),
        ));
        let dispatch = tokio::spawn(reader::dispatch_loop(
            inbound_rx,
            Arc::clone(&self.dispatcher),
            Arc::clone(&self.link),
            cancel.clone(),
        ));

        self.session = Some(Session {
            cancel,
            reader,
            writer,
            dispatch,
            local_port,
        });
        Ok(())
    }

    async fn connect(&self, addr: SocketAddr) -> std::io::Result<tokio::net::TcpStream> {
        let socket = TcpSocket::new_v4()?;
        let size = u32::try_from(self.config.receive_buffer_size).unwrap_or(u32::MAX);
        if let Err(e) = socket.set_recv_buffer_size(size) {
            debug!(error = %e, "Could not set socket receive buffer size");
        }
        socket.connect(addr).await
    }

    /// Send the identify request before any loop runs, so it is always the
    /// first frame on the connection.
    async fn identify(
        &self,
        write_half: &mut OwnedWriteHalf,
        local_port: u16,
    ) -> Result<(), ClientError> {
        let system = SystemRequest::new(RequestGenerator::new(Arc::clone(&self.link)));
        let Some((id, payload)) = system.identify(&self.config.client_name, local_port) else {
            return Err(ClientError::Handshake(Box::new(ClientError::Io(
                std::io::Error::other("identify request could not be built"),
            ))));
        };
        writer::send_frame(write_half, &payload)
            .await
            .map_err(|e| ClientError::Handshake(Box::new(e)))?;
        debug!(id, local_port, "Sent identify");
        Ok(())
    }

    /// Stop the connection tasks and close the socket.
    ///
    /// Idempotent. Requests still waiting when the pending table is cleared
    /// return `None`.
    pub async fn stop(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        let was_running = session.is_alive();
        self.link.pending.clear();
        session.shutdown().await;
        if was_running {
            info!("Stopped");
        }
    }

    /// True while the reader or writer loop is alive.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.session.as_ref().is_some_and(Session::is_alive)
    }

    /// Resolves once the session is cancelled, either by [`Client::stop`]
    /// or because the server closed the connection. Returns immediately
    /// when not started.
    pub async fn terminated(&self) {
        if let Some(session) = &self.session {
            session.cancel.cancelled().await;
        }
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        if let Some(session) = &self.session {
            session.cancel.cancel();
        }
    }
}
