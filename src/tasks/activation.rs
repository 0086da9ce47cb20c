//! What triggered a task run.

use serde::Deserialize;
use serde_json::Value;

/// A shared-memory variable whose change triggered the task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ActivationVariable {
    pub namespace: String,
    pub name: String,
}

/// Trigger details passed to a running task.
///
/// The server may send several alternatives for each trigger kind; only the
/// first of each is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Activation {
    pub hotkeys: Vec<i64>,
    pub key_sequence: Vec<i64>,
    pub variable: Option<ActivationVariable>,
    pub phrase: Option<String>,
    pub mouse_gesture: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawKey {
    key: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawVariable {
    variable: ActivationVariable,
}

#[derive(Debug, Deserialize)]
struct RawPhrase {
    value: String,
}

#[derive(Debug, Deserialize)]
struct RawGesture {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawActivation {
    hotkey: Vec<Vec<RawKey>>,
    key_sequence: Vec<Vec<RawKey>>,
    variables: Vec<RawVariable>,
    phrases: Vec<RawPhrase>,
    mouse_gesture: Vec<RawGesture>,
}

fn first_keys(lists: Vec<Vec<RawKey>>) -> Vec<i64> {
    lists
        .into_iter()
        .next()
        .map(|keys| keys.into_iter().map(|k| k.key).collect())
        .unwrap_or_default()
}

impl Activation {
    /// Parse the activation object sent with `run_task`.
    pub fn from_value(value: &Value) -> Result<Self, serde_json::Error> {
        let raw = RawActivation::deserialize(value)?;
        Ok(Self {
            hotkeys: first_keys(raw.hotkey),
            key_sequence: first_keys(raw.key_sequence),
            variable: raw.variables.into_iter().next().map(|v| v.variable),
            phrase: raw.phrases.into_iter().next().map(|p| p.value),
            mouse_gesture: raw.mouse_gesture.into_iter().next().map(|g| g.name),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_full_activation() {
        let value = json!({
            "hotkey": [[{"key": 17}, {"key": 65}], [{"key": 18}]],
            "key_sequence": [[{"key": 72}, {"key": 73}]],
            "variables": [{"variable": {"namespace": "global", "name": "counter"}}],
            "phrases": [{"value": "open sesame"}, {"value": "ignored"}],
            "mouse_gesture": [{"name": "circle"}],
        });

        let activation = Activation::from_value(&value).expect("parse");
        assert_eq!(activation.hotkeys, vec![17, 65]);
        assert_eq!(activation.key_sequence, vec![72, 73]);
        assert_eq!(
            activation.variable,
            Some(ActivationVariable {
                namespace: "global".into(),
                name: "counter".into(),
            })
        );
        assert_eq!(activation.phrase.as_deref(), Some("open sesame"));
        assert_eq!(activation.mouse_gesture.as_deref(), Some("circle"));
    }

    #[test]
    fn test_missing_triggers_stay_empty() {
        let activation = Activation::from_value(&json!({})).expect("parse");
        assert_eq!(activation, Activation::default());

        let activation =
            Activation::from_value(&json!({"hotkey": [], "phrases": []})).expect("parse");
        assert!(activation.hotkeys.is_empty());
        assert!(activation.phrase.is_none());
    }

    #[test]
    fn test_variable_without_fields_defaults_to_empty() {
        let activation =
            Activation::from_value(&json!({"variables": [{"other": 1}]})).expect("parse");
        assert_eq!(activation.variable, Some(ActivationVariable::default()));
    }

    #[test]
    fn test_malformed_activation_is_rejected() {
        assert!(Activation::from_value(&json!({"hotkey": "ctrl+a"})).is_err());
    }
}
