//! Why a request against a session was refused.
//!
//! Rejections are ordinary values, not failures of the server: every one
//! of them leaves the session running (a session that must stop reports
//! it through a `SessionEnded` event instead). They derive `Serialize` so
//! the connection handler can forward them to clients verbatim.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{EndReason, ParticipantId, SessionId};

/// The per-request error taxonomy.
///
/// ```json
/// {"kind": "turn_mismatch", "participant": 1, "current_actor": 0, "version": 4, "stale": false}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Rejection {
    /// The rule engine refused the action. Counted toward elimination.
    #[error(
        "invalid action from {participant} ({attempts} in a row): {reason}"
    )]
    ValidationRejected {
        participant: ParticipantId,
        reason: String,
        attempts: u32,
        eliminated: bool,
    },

    /// Wrong participant for the current turn, or a stale expected version.
    /// Not counted toward elimination.
    #[error("not {participant}'s turn at version {version}")]
    TurnMismatch {
        participant: ParticipantId,
        current_actor: Option<ParticipantId>,
        version: u64,
        stale: bool,
    },

    /// An agent missed its deadline. Counted like `ValidationRejected`.
    #[error("agent for {participant} timed out ({attempts} in a row)")]
    AgentTimeout {
        participant: ParticipantId,
        attempts: u32,
        eliminated: bool,
    },

    /// The session has ended; nothing can change it any more.
    #[error("session is over: {reason}")]
    SessionTerminal { reason: EndReason },

    /// Too many sessions created from this origin; retry after `reset_at`.
    #[error("rate limited until {reset_at}")]
    RateLimited { reset_at: DateTime<Utc> },

    #[error("{participant} is not part of this session")]
    NotParticipant { participant: ParticipantId },

    #[error("{participant} has been eliminated")]
    Eliminated { participant: ParticipantId },

    #[error("session {session_id} not found")]
    SessionNotFound { session_id: SessionId },

    /// The session's serializer is gone (shut down or crashed).
    #[error("session {session_id} is unavailable")]
    Unavailable { session_id: SessionId },
}

impl Rejection {
    /// An HTTP-style status code used in wire error messages.
    pub fn code(&self) -> u16 {
        match self {
            Self::ValidationRejected { .. } => 422,
            Self::TurnMismatch { .. } => 409,
            Self::AgentTimeout { .. } => 408,
            Self::SessionTerminal { .. } => 410,
            Self::RateLimited { .. } => 429,
            Self::NotParticipant { .. } | Self::Eliminated { .. } => 403,
            Self::SessionNotFound { .. } => 404,
            Self::Unavailable { .. } => 503,
        }
    }

    /// Returns `true` for rejections that feed the elimination tracker.
    pub fn counts_toward_elimination(&self) -> bool {
        matches!(
            self,
            Self::ValidationRejected { .. } | Self::AgentTimeout { .. }
        )
    }
}
