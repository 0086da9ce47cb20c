//! Fuzz target for inbound task-control parsing.
//!
//! Uses arbitrary to build task messages with odd parameter shapes and
//! verifies parsing doesn't panic.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use repeat_client::{Activation, TaskCommand};
use serde_json::{Value, json};

#[derive(Debug, Arbitrary)]
enum FuzzParam {
    Text(String),
    Number(i64),
    Keys(Vec<Vec<i64>>),
    Raw(Vec<u8>),
}

impl FuzzParam {
    fn into_value(self) -> Value {
        match self {
            Self::Text(s) => json!(s),
            Self::Number(n) => json!(n),
            Self::Keys(lists) => {
                let hotkey: Vec<Vec<Value>> = lists
                    .into_iter()
                    .map(|keys| keys.into_iter().map(|key| json!({"key": key})).collect())
                    .collect();
                json!({"hotkey": hotkey, "key_sequence": hotkey})
            }
            Self::Raw(bytes) => serde_json::from_slice(&bytes).unwrap_or(Value::Null),
        }
    }
}

fuzz_target!(|input: (String, Vec<FuzzParam>)| {
    let (action, params) = input;
    let parameters: Vec<Value> = params.into_iter().map(FuzzParam::into_value).collect();

    for value in &parameters {
        let _ = Activation::from_value(value);
    }

    let message = json!({"task_action": action, "parameters": parameters});
    let _ = TaskCommand::parse(&message);

    for name in ["create_task", "run_task", "remove_task"] {
        let message = json!({"task_action": name, "parameters": parameters});
        let _ = TaskCommand::parse(&message);
    }
});
