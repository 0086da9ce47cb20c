//! repeat-client: automation client for the Repeat server
//!
//! Keeps one TCP session to a local automation server, sends keyboard,
//! mouse, shared-memory and tool requests correlated to their replies, and
//! answers the task-control messages the server pushes back.

// Error documentation is deferred - the errors are self-explanatory from types
#![allow(clippy::missing_errors_doc)]

pub mod cli;
pub mod codec;
pub mod config;
pub mod connection;
pub mod dispatch;
pub mod pending;
pub mod protocol;
pub mod queue;
pub mod request;
pub mod tasks;
pub mod testing;

pub use cli::Cli;
pub use codec::{FrameDecoder, FrameError, encode_frame};
pub use config::{ClientConfig, DEFAULT_PORT};
pub use connection::{Client, ClientError};
pub use dispatch::{InboundDispatcher, RejectAll};
pub use protocol::{Action, DispatchReply, MouseButton, ReplyStatus};
pub use request::{
    Controller, KeyboardRequest, MouseRequest, RequestGenerator, SharedMemoryInstance,
    SharedMemoryRequest, ToolRequest,
};
pub use tasks::{
    ActionRegistry, ActionResult, Activation, ActivationVariable, CompileError, TaskCommand,
    TaskCompiler, TaskError, TaskManager, UserAction,
};
pub use testing::{StubConnection, StubServer};
