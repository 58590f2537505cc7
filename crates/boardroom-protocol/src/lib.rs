//! Shared vocabulary for Boardroom.
//!
//! This crate defines the types every other layer speaks:
//!
//! - **Types** ([`Participant`], [`Action`], [`ViewPayload`], [`Event`],
//!   [`HistoryEntry`], ...): the session data model.
//! - **Rejections** ([`Rejection`]): why a request against a session
//!   was refused, serializable so it can travel to clients unchanged.
//! - **Wire** ([`Envelope`], [`ClientMessage`], [`ServerMessage`]): the
//!   messages exchanged over a live connection.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how wire messages are
//!   turned into bytes and back.
//!
//! ```text
//! Transport (bytes) → Protocol (Envelope) → Session registry (actors)
//! ```

// ---------------------------------------------------------------------------
// Module declarations
// ---------------------------------------------------------------------------

mod codec;
mod error;
mod rejection;
mod types;
mod wire;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use rejection::Rejection;
pub use types::{
    Action, ActionSpec, EliminationPolicy, EndReason, Event, EventKind,
    GameMeta, HistoryEntry, HistoryRecord, Participant, ParticipantId,
    SeatKind, SeatSpec, SessionId, SessionInfo, SessionStatus, ViewPayload,
};
pub use wire::{ClientMessage, Envelope, ServerMessage, PROTOCOL_VERSION};
