//! Session-level requests: identify and keep-alive.
//!
//! Both are written straight onto the socket by the connection rather than
//! queued: identify goes out before the loops start, keep-alive is emitted
//! by the writer loop itself. Their replies are awaited in the background.

use super::{Prepared, RequestGenerator};
use crate::protocol::{Action, SystemAction};
use serde_json::Value;

#[derive(Debug, Clone)]
pub(crate) struct SystemRequest {
    generator: RequestGenerator,
}

impl SystemRequest {
    pub(crate) const fn new(generator: RequestGenerator) -> Self {
        Self { generator }
    }

    pub(crate) fn identify(&self, name: &str, port: u16) -> Option<(u64, Value)> {
        self.prepare(SystemAction::Identify {
            name: name.to_string(),
            port,
        })
    }

    pub(crate) fn keep_alive(&self) -> Option<(u64, Value)> {
        self.prepare(SystemAction::KeepAlive)
    }

    fn prepare(&self, action: SystemAction) -> Option<(u64, Value)> {
        let Prepared { id, payload, reply } = self.generator.prepare(&Action::System(action))?;
        self.generator.wait_detached(id, reply);
        Some((id, payload))
    }
}
