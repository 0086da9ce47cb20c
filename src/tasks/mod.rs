//! User task lifecycle driven by the server.
//!
//! The server tells the client which task files to load (`create_task`),
//! when to run them (`run_task`), and when to forget them (`remove_task`).
//! Loading a file goes through a [`TaskCompiler`], which turns its source
//! into a runnable [`UserAction`].

mod activation;
mod command;

pub use activation::{Activation, ActivationVariable};
pub use command::TaskCommand;

use crate::dispatch::InboundDispatcher;
use crate::protocol::DispatchReply;
use crate::request::Controller;
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::error::Error as StdError;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio_util::task::AbortOnDropHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Why a task-control message could not be handled.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Unknown action {0}")]
    UnknownAction(String),

    #[error("Missing {0} parameter")]
    MissingParameter(&'static str),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(#[source] serde_json::Error),

    #[error("Unknown action with id {0}")]
    UnknownTask(String),
}

/// Why a task source could not be turned into a [`UserAction`].
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("no action registered for '{0}'")]
    NotRegistered(String),

    #[error("{0}")]
    Rejected(String),
}

/// Outcome of one task run.
pub type ActionResult = Result<(), Box<dyn StdError + Send + Sync>>;

/// A loaded task.
#[async_trait]
pub trait UserAction: Send + Sync {
    async fn run(&self, controller: &Controller, activation: &Activation) -> ActionResult;
}

/// Turns task source files into runnable actions.
pub trait TaskCompiler: Send + Sync {
    /// Build the action defined by `source`, read from `path`.
    fn compile(&self, path: &Path, source: &str) -> Result<Arc<dyn UserAction>, CompileError>;
}

/// Compiler backed by actions registered in-process, keyed by file stem.
///
/// `tasks/greet.rs` resolves to the action registered as `"greet"`.
#[derive(Default, Clone)]
pub struct ActionRegistry {
    actions: HashMap<String, Arc<dyn UserAction>>,
}

impl ActionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `action` under `name`, replacing any earlier one.
    #[must_use]
    pub fn register(mut self, name: impl Into<String>, action: Arc<dyn UserAction>) -> Self {
        self.actions.insert(name.into(), action);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl std::fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("actions", &self.actions.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl TaskCompiler for ActionRegistry {
    fn compile(&self, path: &Path, _source: &str) -> Result<Arc<dyn UserAction>, CompileError> {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.actions
            .get(&stem)
            .cloned()
            .ok_or(CompileError::NotRegistered(stem))
    }
}

struct Task {
    file_name: String,
    action: Arc<dyn UserAction>,
}

/// Owns the loaded tasks and answers task-control messages.
pub struct TaskManager {
    controller: Controller,
    compiler: Arc<dyn TaskCompiler>,
    tasks: Mutex<HashMap<String, Task>>,
}

impl TaskManager {
    #[must_use]
    pub fn new(controller: Controller, compiler: Arc<dyn TaskCompiler>) -> Self {
        Self {
            controller,
            compiler,
            tasks: Mutex::new(HashMap::new()),
        }
    }

    /// Number of loaded tasks.
    pub async fn task_count(&self) -> usize {
        self.tasks.lock().await.len()
    }

    /// Run one parsed command.
    pub async fn handle(&self, command: TaskCommand) -> DispatchReply {
        match command {
            TaskCommand::Create { path } => self.create_task(&path).await,
            TaskCommand::Run {
                task_id,
                activation,
            } => self.run_task(&task_id, activation).await,
            TaskCommand::Remove { task_id } => self.remove_task(&task_id).await,
        }
    }

    /// Read and compile `path`, registering it under a fresh id.
    pub async fn create_task(&self, path: &Path) -> DispatchReply {
        let file_name = path.display().to_string();

        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            warn!(file = %file_name, "Task file does not exist");
            return DispatchReply::failure(format!("File {file_name} does not exist."));
        }

        let source = match tokio::fs::read_to_string(path).await {
            Ok(source) => source,
            Err(e) => {
                warn!(file = %file_name, error = %e, "Task file unreadable");
                return DispatchReply::failure(format!("Unreadable file {file_name}"));
            }
        };

        let action = match self.compiler.compile(path, &source) {
            Ok(action) => action,
            Err(e) => {
                warn!(file = %file_name, error = %e, "Task failed to compile");
                return DispatchReply::failure(format!("Cannot compile file {file_name}"));
            }
        };

        let id = Uuid::new_v4().to_string();
        self.tasks.lock().await.insert(
            id.clone(),
            Task {
                file_name: file_name.clone(),
                action,
            },
        );
        info!(id = %id, file = %file_name, "Task created");
        DispatchReply::success(task_info(&id, &file_name))
    }

    /// Run task `id` with `activation`.
    ///
    /// A task that returns an error or panics yields a failure reply.
    /// Dropping the returned future aborts the running task.
    pub async fn run_task(&self, id: &str, activation: Activation) -> DispatchReply {
        let (file_name, action) = {
            let tasks = self.tasks.lock().await;
            match tasks.get(id) {
                Some(task) => (task.file_name.clone(), Arc::clone(&task.action)),
                None => {
                    let err = TaskError::UnknownTask(id.to_string());
                    warn!(error = %err, "Run requested for unknown task");
                    return DispatchReply::failure(err.to_string());
                }
            }
        };

        debug!(id, file = %file_name, "Running task");
        let controller = self.controller.clone();
        let job = AbortOnDropHandle::new(tokio::spawn(async move {
            action.run(&controller, &activation).await
        }));

        let failure = match job.await {
            Ok(Ok(())) => return DispatchReply::success(task_info(id, &file_name)),
            Ok(Err(e)) => e.to_string(),
            Err(e) => e.to_string(),
        };
        warn!(id, file = %file_name, error = %failure, "Task failed");
        DispatchReply::failure(format!(
            "Encountered exception while executing task\n{failure}"
        ))
    }

    /// Forget task `id`. Succeeds whether or not it was loaded.
    pub async fn remove_task(&self, id: &str) -> DispatchReply {
        let removed = self.tasks.lock().await.remove(id);
        let file_name = removed.map(|task| task.file_name).unwrap_or_default();
        info!(id, file = %file_name, "Task removed");
        DispatchReply::success(task_info(id, &file_name))
    }
}

impl std::fmt::Debug for TaskManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskManager").finish_non_exhaustive()
    }
}

#[async_trait]
impl InboundDispatcher for TaskManager {
    async fn dispatch(&self, message: Value) -> DispatchReply {
        match TaskCommand::parse(&message) {
            Ok(command) => self.handle(command).await,
            Err(e) => {
                warn!(error = %e, "Rejected task message");
                DispatchReply::failure(e.to_string())
            }
        }
    }
}

fn task_info(id: &str, file_name: &str) -> Value {
    json!({ "id": id, "file_name": file_name })
}
