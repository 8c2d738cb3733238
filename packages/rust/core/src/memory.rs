//! Updates to the free-form assistant memory stored on the user profile.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

/// Interest tag recorded after a successful course build.
pub const COURSE_CREATION: &str = "course_creation";

/// Add `workflow` to `workflows_of_interest` (set union) and stamp `last_updated`.
///
/// Other keys are preserved. A non-object memory is replaced by a fresh object.
pub fn remember_workflow(memory: &Value, workflow: &str, now: DateTime<Utc>) -> Value {
    let mut object = match memory {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };

    let mut workflows: Vec<Value> = match object.get("workflows_of_interest") {
        Some(Value::Array(items)) => items.clone(),
        _ => Vec::new(),
    };
    if !workflows.iter().any(|w| w.as_str() == Some(workflow)) {
        workflows.push(Value::String(workflow.to_string()));
    }

    object.insert("workflows_of_interest".into(), Value::Array(workflows));
    object.insert("last_updated".into(), Value::String(now.to_rfc3339()));
    Value::Object(object)
}
