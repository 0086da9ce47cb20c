//! Mouse requests.

use super::{RequestGenerator, acknowledged};
use crate::protocol::{Action, MouseAction, MouseButton, reply_message};
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct MouseRequest {
    generator: RequestGenerator,
}

impl MouseRequest {
    pub(crate) const fn new(generator: RequestGenerator) -> Self {
        Self { generator }
    }

    async fn perform(&self, action: MouseAction) -> bool {
        acknowledged(self.generator.send_request(Action::Mouse(action)).await)
    }

    pub async fn click(&self, button: MouseButton) -> bool {
        self.perform(MouseAction::Click(button)).await
    }

    pub async fn left_click(&self) -> bool {
        self.click(MouseButton::Left).await
    }

    pub async fn right_click(&self) -> bool {
        self.click(MouseButton::Right).await
    }

    pub async fn press(&self, button: MouseButton) -> bool {
        self.perform(MouseAction::Press(button)).await
    }

    pub async fn release(&self, button: MouseButton) -> bool {
        self.perform(MouseAction::Release(button)).await
    }

    /// Move the cursor to absolute screen coordinates.
    pub async fn move_to(&self, x: i64, y: i64) -> bool {
        self.perform(MouseAction::Move { x, y }).await
    }

    pub async fn move_by(&self, dx: i64, dy: i64) -> bool {
        self.perform(MouseAction::MoveBy { dx, dy }).await
    }

    /// Drag with the left button held to absolute coordinates.
    pub async fn drag(&self, x: i64, y: i64) -> bool {
        self.perform(MouseAction::Drag { x, y }).await
    }

    pub async fn drag_by(&self, dx: i64, dy: i64) -> bool {
        self.perform(MouseAction::DragBy { dx, dy }).await
    }

    /// Current cursor position as `(x, y)`.
    pub async fn position(&self) -> Option<(i64, i64)> {
        let reply = self
            .generator
            .send_request(Action::Mouse(MouseAction::GetPosition))
            .await?;
        parse_position(reply_message(&reply)?)
    }
}

fn parse_position(message: &Value) -> Option<(i64, i64)> {
    match message {
        Value::Array(coords) if coords.len() == 2 => {
            Some((coords[0].as_i64()?, coords[1].as_i64()?))
        }
        Value::Object(fields) => Some((fields.get("x")?.as_i64()?, fields.get("y")?.as_i64()?)),
        _ => None,
    }
}
