//! Shared memory requests.
//!
//! The server keeps string variables grouped by namespace, visible to every
//! client. Values are read and written through a namespaced
//! [`SharedMemoryInstance`].

use super::{RequestGenerator, acknowledged};
use crate::protocol::{Action, SharedMemoryAction, reply_message};
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct SharedMemoryRequest {
    generator: RequestGenerator,
}

impl SharedMemoryRequest {
    pub(crate) const fn new(generator: RequestGenerator) -> Self {
        Self { generator }
    }

    /// Variables scoped to `namespace`.
    pub fn instance(&self, namespace: impl Into<String>) -> SharedMemoryInstance {
        SharedMemoryInstance {
            generator: self.generator.clone(),
            namespace: namespace.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SharedMemoryInstance {
    generator: RequestGenerator,
    namespace: String,
}

impl SharedMemoryInstance {
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Value of `variable`, or `None` if unset or unreachable.
    pub async fn get(&self, variable: &str) -> Option<String> {
        let reply = self
            .generator
            .send_request(Action::SharedMemory(SharedMemoryAction::Get {
                namespace: self.namespace.clone(),
                variable: variable.to_string(),
            }))
            .await?;
        reply_message(&reply)
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    pub async fn set(&self, variable: &str, value: &str) -> bool {
        let action = SharedMemoryAction::Set {
            namespace: self.namespace.clone(),
            variable: variable.to_string(),
            value: value.to_string(),
        };
        acknowledged(self.generator.send_request(Action::SharedMemory(action)).await)
    }

    pub async fn delete(&self, variable: &str) -> bool {
        let action = SharedMemoryAction::Delete {
            namespace: self.namespace.clone(),
            variable: variable.to_string(),
        };
        acknowledged(self.generator.send_request(Action::SharedMemory(action)).await)
    }
}
