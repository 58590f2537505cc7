//! Turning raw agent output into an [`Action`].
//!
//! Accepted shapes, tried in order:
//!
//! ```json
//! {"action": "place", "params": {"cell": 4}}
//! {"action": "place", "cell": 4, "reasoning": "take the centre"}
//! {"cell": 4}                                   // only legal action is implied
//! "I'll go with {\"action\": \"place\", \"cell\": 4} since ..."
//! ```
//!
//! `reasoning` is always dropped. Whether the action is *legal* is not
//! checked here; that is the rule engine's call.

use boardroom_protocol::{Action, ActionSpec};
use serde_json::{Map, Value};

/// Parses one agent answer.
///
/// # Errors
/// Returns a human-readable reason when the output holds no JSON object,
/// the action name is not a string, or no name is given while more than
/// one action is legal.
pub fn parse_decision(raw: Value, actions: &[ActionSpec]) -> Result<Action, String> {
    let value = match raw {
        Value::String(text) => extract_object(&text)?,
        other => other,
    };
    let mut fields = match value {
        Value::Object(fields) => fields,
        other => return Err(format!("expected a JSON object, got {other}")),
    };
    fields.remove("reasoning");

    let named = match fields.remove("action").or_else(|| fields.remove("name")) {
        Some(Value::String(name)) => Some(name),
        Some(other) => {
            return Err(format!("action name must be a string, got {other}"));
        }
        None => None,
    };
    let name = match (named, actions) {
        (Some(name), _) => name,
        (None, [only]) => only.name.clone(),
        (None, []) => return Err("no action name and no legal actions".into()),
        (None, _) => return Err("no action name in agent output".into()),
    };

    let params = match fields.remove("params") {
        Some(Value::Object(params)) => params,
        Some(other) => {
            let mut params = Map::new();
            params.insert("params".into(), other);
            params.extend(fields);
            params
        }
        None => fields,
    };
    Ok(Action::with_params(name, Value::Object(params)))
}

/// Pulls the outermost `{...}` out of free text and parses it.
fn extract_object(text: &str) -> Result<Value, String> {
    let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) else {
        return Err("agent output holds no JSON object".into());
    };
    if end < start {
        return Err("agent output holds no JSON object".into());
    }
    serde_json::from_str(&text[start..=end])
        .map_err(|e| format!("agent output is not valid JSON: {e}"))
}
