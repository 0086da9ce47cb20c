//! Message types exchanged with the automation server.
//!
//! Outbound requests are built from an [`Action`], a tagged variant over every
//! supported device/action pair, and serialized as a [`RequestEnvelope`].
//! Inbound payloads are either replies correlated by `id` or task-control
//! messages for the [`InboundDispatcher`](crate::dispatch::InboundDispatcher).

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Marker set on payloads that answer an earlier message.
pub const REPLY_MARKER: &str = "is_reply_message";

/// Mouse button, encoded as the server's button-down mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
}

impl MouseButton {
    #[must_use]
    pub const fn mask(self) -> i64 {
        match self {
            Self::Left => 1 << 10,
            Self::Middle => 1 << 11,
            Self::Right => 1 << 12,
        }
    }
}

/// Keyboard actions. Keys are virtual key codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyboardAction {
    Press(i64),
    Release(i64),
    Type(Vec<i64>),
    TypeString(Vec<String>),
    Combination(Vec<i64>),
}

/// Mouse actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MouseAction {
    Click(MouseButton),
    Press(MouseButton),
    Release(MouseButton),
    Move { x: i64, y: i64 },
    MoveBy { dx: i64, dy: i64 },
    Drag { x: i64, y: i64 },
    DragBy { dx: i64, dy: i64 },
    GetPosition,
}

/// Shared memory actions, scoped by namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SharedMemoryAction {
    Get {
        namespace: String,
        variable: String,
    },
    Set {
        namespace: String,
        variable: String,
        value: String,
    },
    Delete {
        namespace: String,
        variable: String,
    },
}

/// Host tool actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolAction {
    GetClipboard,
    SetClipboard(String),
    Execute {
        command: String,
        cwd: Option<String>,
    },
}

/// Session-level requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SystemAction {
    /// Announce this client to the server.
    Identify { name: String, port: u16 },
    /// Reset the server's idle-session timer.
    KeepAlive,
}

/// Every request the client can issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Keyboard(KeyboardAction),
    Mouse(MouseAction),
    SharedMemory(SharedMemoryAction),
    Tool(ToolAction),
    System(SystemAction),
}

/// Positional parameters carried by a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    pub ints: Vec<i64>,
    pub strings: Vec<String>,
    pub objects: Vec<Value>,
}

impl Params {
    fn ints(ints: Vec<i64>) -> Self {
        Self {
            ints,
            ..Self::default()
        }
    }

    fn strings(strings: Vec<String>) -> Self {
        Self {
            strings,
            ..Self::default()
        }
    }
}

impl Action {
    /// Request category (`type` field).
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::System(_) => "system",
            _ => "action",
        }
    }

    /// Target subsystem (`device` field).
    #[must_use]
    pub const fn device(&self) -> &'static str {
        match self {
            Self::Keyboard(_) => "keyboard",
            Self::Mouse(_) => "mouse",
            Self::SharedMemory(_) => "shared_memory",
            Self::Tool(_) => "tool",
            Self::System(_) => "system",
        }
    }

    /// Operation name (`action` field).
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Keyboard(k) => match k {
                KeyboardAction::Press(_) => "press",
                KeyboardAction::Release(_) => "release",
                KeyboardAction::Type(_) => "type",
                KeyboardAction::TypeString(_) => "type_string",
                KeyboardAction::Combination(_) => "combination",
            },
            Self::Mouse(m) => match m {
                MouseAction::Click(_) => "click",
                MouseAction::Press(_) => "press",
                MouseAction::Release(_) => "release",
                MouseAction::Move { .. } => "move",
                MouseAction::MoveBy { .. } => "move_by",
                MouseAction::Drag { .. } => "drag",
                MouseAction::DragBy { .. } => "drag_by",
                MouseAction::GetPosition => "get_position",
            },
            Self::SharedMemory(s) => match s {
                SharedMemoryAction::Get { .. } => "get",
                SharedMemoryAction::Set { .. } => "set",
                SharedMemoryAction::Delete { .. } => "del",
            },
            Self::Tool(t) => match t {
                ToolAction::GetClipboard => "get_clipboard",
                ToolAction::SetClipboard(_) => "set_clipboard",
                ToolAction::Execute { .. } => "execute",
            },
            Self::System(s) => match s {
                SystemAction::Identify { .. } => "identify",
                SystemAction::KeepAlive => "keep_alive",
            },
        }
    }

    /// Parameters for the wire envelope.
    #[must_use]
    pub fn params(&self) -> Params {
        match self {
            Self::Keyboard(k) => match k {
                KeyboardAction::Press(key) | KeyboardAction::Release(key) => {
                    Params::ints(vec![*key])
                }
                KeyboardAction::Type(keys) | KeyboardAction::Combination(keys) => {
                    Params::ints(keys.clone())
                }
                KeyboardAction::TypeString(strings) => Params::strings(strings.clone()),
            },
            Self::Mouse(m) => match m {
                MouseAction::Click(b) | MouseAction::Press(b) | MouseAction::Release(b) => {
                    Params::ints(vec![b.mask()])
                }
                MouseAction::Move { x, y } | MouseAction::Drag { x, y } => {
                    Params::ints(vec![*x, *y])
                }
                MouseAction::MoveBy { dx, dy } | MouseAction::DragBy { dx, dy } => {
                    Params::ints(vec![*dx, *dy])
                }
                MouseAction::GetPosition => Params::default(),
            },
            Self::SharedMemory(s) => match s {
                SharedMemoryAction::Get {
                    namespace,
                    variable,
                }
                | SharedMemoryAction::Delete {
                    namespace,
                    variable,
                } => Params::strings(vec![namespace.clone(), variable.clone()]),
                SharedMemoryAction::Set {
                    namespace,
                    variable,
                    value,
                } => Params::strings(vec![namespace.clone(), variable.clone(), value.clone()]),
            },
            Self::Tool(t) => match t {
                ToolAction::GetClipboard => Params::default(),
                ToolAction::SetClipboard(text) => Params::strings(vec![text.clone()]),
                ToolAction::Execute { command, cwd } => {
                    let mut strings = vec![command.clone()];
                    strings.extend(cwd.clone());
                    Params::strings(strings)
                }
            },
            Self::System(s) => match s {
                SystemAction::Identify { name, port } => Params {
                    ints: vec![i64::from(*port)],
                    strings: vec![name.clone()],
                    objects: Vec::new(),
                },
                SystemAction::KeepAlive => Params::default(),
            },
        }
    }
}

/// Outbound request as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    #[serde(rename = "type")]
    pub category: String,
    pub device: String,
    pub action: String,
    pub id: u64,
    #[serde(default)]
    pub params_int: Vec<i64>,
    #[serde(default)]
    pub params_string: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params_object: Vec<Value>,
}

impl RequestEnvelope {
    #[must_use]
    pub fn new(id: u64, action: &Action) -> Self {
        let params = action.params();
        Self {
            category: action.category().to_string(),
            device: action.device().to_string(),
            action: action.name().to_string(),
            id,
            params_int: params.ints,
            params_string: params.strings,
            params_object: params.objects,
        }
    }
}

/// Whether a reply acknowledges its request.
///
/// Any reply counts unless its `status` is `"Failure"` or `false`.
#[must_use]
pub fn reply_succeeded(reply: &Value) -> bool {
    match reply.get("status") {
        Some(Value::Bool(ok)) => *ok,
        Some(Value::String(s)) => s != "Failure",
        _ => true,
    }
}

/// The `message` body of a successful reply.
#[must_use]
pub fn reply_message(reply: &Value) -> Option<&Value> {
    if reply_succeeded(reply) {
        reply.get("message")
    } else {
        None
    }
}

/// Whether a payload is marked as a reply.
#[must_use]
pub fn is_marked_reply(payload: &Value) -> bool {
    payload.get(REPLY_MARKER).and_then(Value::as_bool) == Some(true)
}

/// Correlation id of an inbound payload, if it carries one.
#[must_use]
pub fn correlation_id(payload: &Value) -> Option<u64> {
    payload.get("id").and_then(Value::as_u64)
}

/// Outcome of handling an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplyStatus {
    Success,
    Failure,
}

/// Reply produced for every inbound task-control message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchReply {
    pub status: ReplyStatus,
    pub message: Value,
    #[serde(rename = "is_reply_message", default = "default_true")]
    pub is_reply: bool,
}

const fn default_true() -> bool {
    true
}

impl DispatchReply {
    pub fn success(message: impl Into<Value>) -> Self {
        Self {
            status: ReplyStatus::Success,
            message: message.into(),
            is_reply: true,
        }
    }

    pub fn failure(message: impl Into<Value>) -> Self {
        Self {
            status: ReplyStatus::Failure,
            message: message.into(),
            is_reply: true,
        }
    }

    /// Convert into the JSON payload sent on the wire.
    #[must_use]
    pub fn into_value(self) -> Value {
        json!({
            "status": self.status,
            "message": self.message,
            "is_reply_message": self.is_reply,
        })
    }
}
