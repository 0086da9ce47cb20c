//! Host utility requests.

use super::{RequestGenerator, acknowledged};
use crate::protocol::{Action, ToolAction, reply_message};
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct ToolRequest {
    generator: RequestGenerator,
}

impl ToolRequest {
    pub(crate) const fn new(generator: RequestGenerator) -> Self {
        Self { generator }
    }

    async fn text(&self, action: ToolAction) -> Option<String> {
        let reply = self.generator.send_request(Action::Tool(action)).await?;
        reply_message(&reply)
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    /// Text currently on the host clipboard.
    pub async fn clipboard(&self) -> Option<String> {
        self.text(ToolAction::GetClipboard).await
    }

    pub async fn set_clipboard(&self, text: &str) -> bool {
        let action = ToolAction::SetClipboard(text.to_string());
        acknowledged(self.generator.send_request(Action::Tool(action)).await)
    }

    /// Run a shell command on the host and return its output.
    pub async fn execute(&self, command: &str, cwd: Option<&str>) -> Option<String> {
        self.text(ToolAction::Execute {
            command: command.to_string(),
            cwd: cwd.map(str::to_string),
        })
        .await
    }
}
