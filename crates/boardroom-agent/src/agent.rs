//! The `Agent` trait and the request it answers.

use async_trait::async_trait;
use boardroom_protocol::{ActionSpec, Participant, SessionId, ViewPayload};
use serde_json::Value;
use tokio::time::Instant;

/// Everything an agent gets to decide with.
///
/// The view is already projected for the deciding participant, so an
/// agent sees exactly what a human in the same seat would.
#[derive(Debug, Clone)]
pub struct DecisionRequest {
    pub session_id: SessionId,
    pub participant: Participant,
    pub view: ViewPayload,
    /// Legal actions as reported by the rule engine. May be empty for
    /// games that don't enumerate them.
    pub actions: Vec<ActionSpec>,
    /// The gateway abandons the call at this instant.
    pub deadline: Instant,
}

/// Errors an agent may report instead of a decision.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// The backing service could not be reached or refused the call.
    #[error("agent unavailable: {0}")]
    Unavailable(String),

    /// The agent found nothing it could play.
    #[error("no legal action to choose from")]
    NoLegalAction,

    /// A scripted agent ran out of prepared answers.
    #[error("agent script exhausted")]
    Exhausted,
}

/// An opaque per-seat decision source.
///
/// Implementations return raw JSON (for a language-model backed agent,
/// typically whatever the model produced). The gateway parses it; see
/// [`parse_decision`](crate::parse_decision) for the accepted shapes.
///
/// `async_trait` keeps the trait object-safe: a session holds its
/// agents as `Arc<dyn Agent>`, one per automated seat.
#[async_trait]
pub trait Agent: Send + Sync + 'static {
    async fn decide(&self, request: &DecisionRequest) -> Result<Value, AgentError>;
}
