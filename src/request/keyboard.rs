//! Keyboard requests.

use super::{RequestGenerator, acknowledged};
use crate::protocol::{Action, KeyboardAction};

/// Presses, releases and types keys on the host. Keys are virtual key codes.
#[derive(Debug, Clone)]
pub struct KeyboardRequest {
    generator: RequestGenerator,
}

impl KeyboardRequest {
    pub(crate) const fn new(generator: RequestGenerator) -> Self {
        Self { generator }
    }

    async fn perform(&self, action: KeyboardAction) -> bool {
        acknowledged(self.generator.send_request(Action::Keyboard(action)).await)
    }

    pub async fn press(&self, key: i64) -> bool {
        self.perform(KeyboardAction::Press(key)).await
    }

    pub async fn release(&self, key: i64) -> bool {
        self.perform(KeyboardAction::Release(key)).await
    }

    /// Press and release each key in turn.
    pub async fn type_keys(&self, keys: &[i64]) -> bool {
        self.perform(KeyboardAction::Type(keys.to_vec())).await
    }

    /// Type each string as text.
    pub async fn type_string<S: AsRef<str>>(&self, strings: &[S]) -> bool {
        let strings = strings.iter().map(|s| s.as_ref().to_string()).collect();
        self.perform(KeyboardAction::TypeString(strings)).await
    }

    /// Press all keys in order, then release them in reverse.
    pub async fn combination(&self, keys: &[i64]) -> bool {
        self.perform(KeyboardAction::Combination(keys.to_vec())).await
    }
}
