//! An agent that replays prepared answers, optionally slowly.
//!
//! Useful for replaying a recorded game and for exercising the gateway's
//! failure paths (malformed output, slow responses) deterministically.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::{Agent, AgentError, DecisionRequest};

pub struct ScriptedAgent {
    script: Mutex<VecDeque<Result<Value, AgentError>>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl ScriptedAgent {
    /// Answers with each output in turn, then with [`AgentError::Exhausted`].
    pub fn new(outputs: impl IntoIterator<Item = Value>) -> Self {
        Self::from_results(outputs.into_iter().map(Ok))
    }

    /// Like [`new`](Self::new), but individual answers may be errors.
    pub fn from_results(
        results: impl IntoIterator<Item = Result<Value, AgentError>>,
    ) -> Self {
        Self {
            script: Mutex::new(results.into_iter().collect()),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Sleeps this long before every answer.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// How many times `decide` has been called.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Agent for ScriptedAgent {
    async fn decide(&self, _request: &DecisionRequest) -> Result<Value, AgentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.script
            .lock()
            .await
            .pop_front()
            .unwrap_or(Err(AgentError::Exhausted))
    }
}
