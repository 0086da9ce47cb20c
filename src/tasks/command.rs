//! Task-control messages pushed by the server.

use super::TaskError;
use super::activation::Activation;
use serde_json::Value;
use std::path::PathBuf;

/// A parsed `task_action` message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskCommand {
    /// Load and register the task defined in a source file.
    Create { path: PathBuf },
    /// Run a registered task.
    Run {
        task_id: String,
        activation: Activation,
    },
    /// Forget a registered task.
    Remove { task_id: String },
}

impl TaskCommand {
    /// Parse `{ "task_action": ..., "parameters": [...] }`.
    pub fn parse(message: &Value) -> Result<Self, TaskError> {
        let action = message
            .get("task_action")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let parameters = message
            .get("parameters")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        match action {
            "create_task" => Ok(Self::Create {
                path: PathBuf::from(first_string(parameters, "file name")?),
            }),
            "run_task" => {
                let task_id = first_string(parameters, "task id")?;
                let activation = match parameters.get(1) {
                    Some(value) => {
                        Activation::from_value(value).map_err(TaskError::InvalidParameters)?
                    }
                    None => Activation::default(),
                };
                Ok(Self::Run {
                    task_id,
                    activation,
                })
            }
            "remove_task" => Ok(Self::Remove {
                task_id: first_string(parameters, "task id")?,
            }),
            other => Err(TaskError::UnknownAction(other.to_string())),
        }
    }
}

fn first_string(parameters: &[Value], what: &'static str) -> Result<String, TaskError> {
    parameters
        .first()
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(TaskError::MissingParameter(what))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_create() {
        let command =
            TaskCommand::parse(&json!({"task_action": "create_task", "parameters": ["a.rs"]}))
                .expect("parse");
        assert_eq!(
            command,
            TaskCommand::Create {
                path: PathBuf::from("a.rs")
            }
        );
    }

    #[test]
    fn test_parse_run_with_activation() {
        let command = TaskCommand::parse(&json!({
            "task_action": "run_task",
            "parameters": ["task-1", {"hotkey": [[{"key": 65}]]}],
        }))
        .expect("parse");

        let TaskCommand::Run {
            task_id,
            activation,
        } = command
        else {
            panic!("expected run command");
        };
        assert_eq!(task_id, "task-1");
        assert_eq!(activation.hotkeys, vec![65]);
    }

    #[test]
    fn test_parse_run_without_activation() {
        let command =
            TaskCommand::parse(&json!({"task_action": "run_task", "parameters": ["t"]}))
                .expect("parse");
        assert!(matches!(command, TaskCommand::Run { activation, .. } if activation == Activation::default()));
    }

    #[test]
    fn test_unknown_action() {
        let err = TaskCommand::parse(&json!({"task_action": "explode", "parameters": []}))
            .expect_err("should fail");
        assert_eq!(err.to_string(), "Unknown action explode");

        let err = TaskCommand::parse(&json!({"something": "else"})).expect_err("should fail");
        assert!(matches!(err, TaskError::UnknownAction(name) if name.is_empty()));
    }

    #[test]
    fn test_missing_parameter() {
        let err = TaskCommand::parse(&json!({"task_action": "remove_task"}))
            .expect_err("should fail");
        assert!(matches!(err, TaskError::MissingParameter("task id")));
    }
}
