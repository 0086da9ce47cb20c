//! Client configuration.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Port the automation server listens on by default.
pub const DEFAULT_PORT: u16 = 9999;

/// Bytes requested per socket read.
pub const DEFAULT_RECEIVE_BUFFER: usize = 1024;

/// The server drops sessions idle for longer than this.
pub const DEFAULT_SERVER_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection settings for [`Client`](crate::Client).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Server port on the loopback interface.
    pub port: u16,
    /// Size of the buffer used for each socket read.
    pub receive_buffer_size: usize,
    /// Idle timeout enforced by the server.
    pub server_timeout: Duration,
    /// Name announced in the identify handshake.
    pub client_name: String,
}

impl ClientConfig {
    #[must_use]
    pub fn new(port: u16) -> Self {
        Self {
            port,
            ..Self::default()
        }
    }

    /// Set the server idle timeout.
    #[must_use]
    pub const fn with_server_timeout(mut self, timeout: Duration) -> Self {
        self.server_timeout = timeout;
        self
    }

    /// The server is always local.
    #[must_use]
    pub const fn server_addr(&self) -> SocketAddr {
        SocketAddr::new(std::net::IpAddr::V4(Ipv4Addr::LOCALHOST), self.port)
    }

    /// 80% of the server idle timeout.
    ///
    /// Bounds every reply wait and the writer's idle wait, so a keep-alive
    /// goes out before the server gives up on the session.
    #[must_use]
    pub fn client_timeout(&self) -> Duration {
        self.server_timeout * 4 / 5
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            receive_buffer_size: DEFAULT_RECEIVE_BUFFER,
            server_timeout: DEFAULT_SERVER_TIMEOUT,
            client_name: "rust".to_string(),
        }
    }
}
