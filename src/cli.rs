//! Command-line interface for repeat-client.

use crate::config::{ClientConfig, DEFAULT_PORT};
use clap::Parser;
use std::time::Duration;

/// Automation client for the Repeat server.
#[derive(Debug, Parser)]
#[command(name = "repeat-client", version, about)]
pub struct Cli {
    /// Server port on localhost.
    #[arg(long, env = "REPEAT_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Server idle timeout in milliseconds; the client keeps 80% of it.
    #[arg(
        long,
        env = "REPEAT_SERVER_TIMEOUT_MS",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub server_timeout_ms: Option<u64>,

    /// Enable verbose logging.
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Client configuration selected by the flags.
    #[must_use]
    pub fn config(&self) -> ClientConfig {
        let config = ClientConfig::new(self.port);
        match self.server_timeout_ms {
            Some(ms) => config.with_server_timeout(Duration::from_millis(ms)),
            None => config,
        }
    }
}
