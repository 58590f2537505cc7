//! An agent that plays uniformly at random among the legal actions.

use async_trait::async_trait;
use boardroom_protocol::ActionSpec;
use rand::Rng;
use serde_json::{Map, Value, json};

use crate::{Agent, AgentError, DecisionRequest};

/// Picks a random legal action and fills its parameters from the schema.
///
/// Understands two schema hints per property: an `enum` list, and an
/// integer `minimum`/`maximum` pair. Other properties are left out.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomAgent;

#[async_trait]
impl Agent for RandomAgent {
    async fn decide(&self, request: &DecisionRequest) -> Result<Value, AgentError> {
        pick(&request.actions).ok_or(AgentError::NoLegalAction)
    }
}

fn pick(actions: &[ActionSpec]) -> Option<Value> {
    if actions.is_empty() {
        return None;
    }
    let mut rng = rand::rng();
    let spec = &actions[rng.random_range(0..actions.len())];

    let mut params = Map::new();
    let properties = spec
        .schema
        .as_ref()
        .and_then(|schema| schema.get("properties"))
        .and_then(Value::as_object);
    for (key, property) in properties.into_iter().flatten() {
        if let Some(value) = sample(property, &mut rng) {
            params.insert(key.clone(), value);
        }
    }
    Some(json!({"action": spec.name, "params": params}))
}

fn sample(property: &Value, rng: &mut impl Rng) -> Option<Value> {
    if let Some(options) = property.get("enum").and_then(Value::as_array) {
        if options.is_empty() {
            return None;
        }
        return Some(options[rng.random_range(0..options.len())].clone());
    }
    let min = property.get("minimum").and_then(Value::as_i64)?;
    let max = property.get("maximum").and_then(Value::as_i64)?;
    (min <= max).then(|| json!(rng.random_range(min..=max)))
}
