//! The gateway: a deadline around every agent call.

use std::time::Duration;

use boardroom_protocol::{ActionSpec, Action, Participant, SessionId, ViewPayload};
use tokio::time::Instant;

use crate::{Agent, DecisionRequest, parse_decision};

/// Why an agent attempt produced no usable action.
///
/// The session treats every variant as one invalid attempt by the seat.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AgentFailure {
    #[error("agent timed out after {0:?}")]
    Timeout(Duration),

    #[error("malformed agent output: {0}")]
    Malformed(String),

    #[error("agent failed: {0}")]
    Failed(String),
}

/// Calls agents with a bounded deadline.
///
/// Cheap to clone; each session actor keeps one and moves a clone into
/// every decision task it spawns.
#[derive(Debug, Clone)]
pub struct AgentGateway {
    timeout: Duration,
}

impl AgentGateway {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Builds a request whose deadline starts now.
    pub fn request(
        &self,
        session_id: SessionId,
        participant: Participant,
        view: ViewPayload,
        actions: Vec<ActionSpec>,
    ) -> DecisionRequest {
        DecisionRequest {
            session_id,
            participant,
            view,
            actions,
            deadline: Instant::now() + self.timeout,
        }
    }

    /// Asks `agent` for one decision.
    ///
    /// Makes exactly one call. When the deadline passes the call is
    /// dropped and [`AgentFailure::Timeout`] returned; there is no retry.
    pub async fn decide(
        &self,
        agent: &dyn Agent,
        request: &DecisionRequest,
    ) -> Result<Action, AgentFailure> {
        let session_id = request.session_id;
        let participant = request.participant.id;

        let raw = match tokio::time::timeout_at(request.deadline, agent.decide(request)).await {
            Err(_) => {
                tracing::warn!(
                    %session_id,
                    %participant,
                    timeout = ?self.timeout,
                    "agent decision timed out"
                );
                return Err(AgentFailure::Timeout(self.timeout));
            }
            Ok(Err(e)) => {
                tracing::warn!(%session_id, %participant, error = %e, "agent failed");
                return Err(AgentFailure::Failed(e.to_string()));
            }
            Ok(Ok(raw)) => raw,
        };

        parse_decision(raw, &request.actions).map_err(|reason| {
            tracing::debug!(%session_id, %participant, %reason, "malformed agent output");
            AgentFailure::Malformed(reason)
        })
    }
}

impl Default for AgentGateway {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TIMEOUT)
    }
}
