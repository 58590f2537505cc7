//! Messages exchanged over a live connection.
//!
//! Every frame is an [`Envelope`] around either a [`ClientMessage`] or a
//! [`ServerMessage`]. Both enums are internally tagged by `type`:
//!
//! ```json
//! {"seq": 3, "timestamp": 1200, "payload": {"type": "subscribe", "session_id": "…", "participant": 0}}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    Action, ActionSpec, Event, GameMeta, HistoryEntry, ParticipantId,
    Rejection, SeatSpec, SessionId, SessionInfo, ViewPayload,
};

/// The current protocol version. Clients must send it in `hello`.
pub const PROTOCOL_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// Outer frame for every message.
///
/// - `seq` increases per sender so either side can spot gaps.
/// - `timestamp` is milliseconds since the sender's connection started.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<P> {
    pub seq: u64,
    pub timestamp: u64,
    pub payload: P,
}

impl<P> Envelope<P> {
    pub fn new(seq: u64, timestamp: u64, payload: P) -> Self {
        Self {
            seq,
            timestamp,
            payload,
        }
    }
}

// ---------------------------------------------------------------------------
// Client → server
// ---------------------------------------------------------------------------

/// Requests a client can make.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Must be the first message on a connection.
    Hello { version: u32 },

    Heartbeat { client_time: u64 },

    ListGames,

    CreateSession {
        game_type: String,
        seats: Vec<SeatSpec>,
        #[serde(default)]
        config: Value,
    },

    /// Metadata, plus the participant's view when `participant` is set.
    GetSession {
        session_id: SessionId,
        #[serde(default)]
        participant: Option<ParticipantId>,
    },

    ListActions {
        session_id: SessionId,
        participant: ParticipantId,
    },

    GetHistory { session_id: SessionId },

    Submit {
        session_id: SessionId,
        participant: ParticipantId,
        action: Action,
        /// Rejects the action as stale if the session has moved on.
        #[serde(default)]
        expected_version: Option<u64>,
    },

    Subscribe {
        session_id: SessionId,
        participant: ParticipantId,
    },

    Unsubscribe { session_id: SessionId },

    Disconnect { reason: String },
}

// ---------------------------------------------------------------------------
// Server → client
// ---------------------------------------------------------------------------

/// Responses and pushed updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome { protocol_version: u32 },

    HeartbeatAck { client_time: u64, server_time: u64 },

    GameList { games: Vec<GameMeta> },

    SessionCreated { session_id: SessionId },

    SessionState {
        info: SessionInfo,
        view: Option<ViewPayload>,
    },

    Actions {
        session_id: SessionId,
        participant: ParticipantId,
        actions: Vec<ActionSpec>,
    },

    History {
        session_id: SessionId,
        entries: Vec<HistoryEntry>,
    },

    /// The submitted action was applied.
    Accepted { event: Event },

    /// The request was refused; the session is unaffected.
    Rejected { rejection: Rejection },

    /// First message of a subscription: the current view.
    Subscribed { snapshot: ViewPayload },

    /// A live update for a subscription, in version order.
    Event { event: Event },

    Unsubscribed { session_id: SessionId },

    /// A request could not be processed at all.
    Error { code: u16, message: String },
}
