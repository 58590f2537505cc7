//! The session data model shared by every Boardroom crate.
//!
//! Nothing in here knows about a specific game. Game state is owned by a
//! rule engine and never appears in these types; what leaves a session is
//! always a role-scoped [`ViewPayload`], an [`Event`], or a [`HistoryEntry`].

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for one running session.
///
/// Random (UUID v4) rather than sequential so that a session id handed
/// to one client does not let it guess the ids of other sessions.
/// `#[serde(transparent)]` puts the bare UUID string on the wire.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Generates a fresh random session id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A participant's seat index within its session's player list.
///
/// Seats are numbered from zero in the order they were specified at
/// creation and never change afterwards.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ParticipantId(pub u32);

impl ParticipantId {
    /// Returns the seat as a `usize` for indexing the participant list.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "seat-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Seats and participants
// ---------------------------------------------------------------------------

/// Who decides for a seat.
///
/// ```json
/// "human"
/// {"agent": {"profile": "random"}}
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeatKind {
    /// Actions arrive from outside through `submit`, with no deadline.
    #[default]
    Human,
    /// Actions come from the named agent profile, with a bounded deadline.
    Agent { profile: String },
}

impl SeatKind {
    /// Shorthand for an agent seat.
    pub fn agent(profile: impl Into<String>) -> Self {
        Self::Agent {
            profile: profile.into(),
        }
    }
}

/// One seat as requested by whoever creates a session.
///
/// Every field is optional on the wire: a missing name, role, or team
/// falls back to the game's default seat at the same index, and a
/// missing kind means a human seat.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeatSpec {
    pub name: Option<String>,
    pub role: Option<String>,
    pub team: Option<String>,
    pub kind: SeatKind,
}

impl SeatSpec {
    /// A human seat with no overrides.
    pub fn human() -> Self {
        Self::default()
    }

    /// An agent seat driven by the given profile.
    pub fn agent(profile: impl Into<String>) -> Self {
        Self {
            kind: SeatKind::agent(profile),
            ..Self::default()
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn team(mut self, team: impl Into<String>) -> Self {
        self.team = Some(team.into());
        self
    }
}

/// A session-bound seat.
///
/// `id`, `name`, `role`, `team` and `kind` are fixed when the session
/// is created. `consecutive_invalid` and `eliminated` are only ever
/// changed by the session's elimination tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub name: String,
    pub role: Option<String>,
    pub team: Option<String>,
    pub kind: SeatKind,
    pub consecutive_invalid: u32,
    pub eliminated: bool,
}

impl Participant {
    /// Creates an active participant with a clean record.
    pub fn new(id: ParticipantId, name: impl Into<String>, kind: SeatKind) -> Self {
        Self {
            id,
            name: name.into(),
            role: None,
            team: None,
            kind,
            consecutive_invalid: 0,
            eliminated: false,
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn with_team(mut self, team: impl Into<String>) -> Self {
        self.team = Some(team.into());
        self
    }

    /// Returns `true` if an agent, not a person, decides for this seat.
    pub fn is_agent(&self) -> bool {
        matches!(self.kind, SeatKind::Agent { .. })
    }
}

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

fn empty_params() -> Value {
    Value::Object(serde_json::Map::new())
}

/// A named operation plus its structured parameters.
///
/// Only the rule engine knows what a name means. The core routes the
/// action to the engine and, once accepted, appends it to the session's
/// history unchanged.
#[must_use]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub name: String,
    #[serde(default = "empty_params")]
    pub params: Value,
}

impl Action {
    /// An action with no parameters.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: empty_params(),
        }
    }

    /// An action with the given parameter object.
    pub fn with_params(name: impl Into<String>, params: Value) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }

    /// Looks up a single parameter by key.
    pub fn param(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }
}

/// Describes one action a participant may currently take.
///
/// `schema` is free-form JSON describing the parameters. Built-in agents
/// understand `{"properties": {"<key>": {"enum": [...]}}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionSpec {
    pub name: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,
}

impl ActionSpec {
    pub fn new(name: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            display_name: display_name.into(),
            schema: None,
        }
    }

    pub fn with_schema(mut self, schema: Value) -> Self {
        self.schema = Some(schema);
        self
    }
}

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

/// A role-scoped projection of a session's state.
///
/// Fields are kept in a `BTreeMap` so the same projection always
/// serializes to the same bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewPayload {
    pub session_id: SessionId,
    pub participant: ParticipantId,
    /// The session version this view was projected at.
    pub version: u64,
    pub fields: BTreeMap<String, Value>,
}

impl ViewPayload {
    /// Looks up a single field by name.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}

// ---------------------------------------------------------------------------
// Session lifecycle
// ---------------------------------------------------------------------------

/// What a game declares should happen to an eliminated participant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EliminationPolicy {
    /// The rule engine drops the participant from its turn order.
    #[default]
    RemoveFromRotation,
    /// The participant keeps their seat, but the game's default action
    /// is played for them whenever the turn reaches them.
    Forfeit,
}

/// Why a session stopped accepting actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// The rule engine reported a terminal state.
    Completed,
    /// Nobody left can take the current turn.
    NoEligibleActor,
    /// The rule engine failed while applying a change.
    EngineFault { message: String },
    /// No activity within the configured idle window.
    IdleTimeout,
    /// The registry shut the session down.
    Shutdown,
}

impl EndReason {
    /// Everything except a normal game end is abnormal.
    pub fn is_abnormal(&self) -> bool {
        !matches!(self, Self::Completed)
    }
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::NoEligibleActor => write!(f, "no eligible actor"),
            Self::EngineFault { message } => write!(f, "engine fault: {message}"),
            Self::IdleTimeout => write!(f, "idle timeout"),
            Self::Shutdown => write!(f, "shutdown"),
        }
    }
}

/// Lifecycle state of a session. `Terminal` is absorbing.
///
/// ```text
/// Active ──(accepted / rejected action)──→ Active
/// Active ──(terminal state, no eligible actor, fault, idle, shutdown)──→ Terminal
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Terminal { reason: EndReason },
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminal { .. })
    }

    /// The end reason, if the session has ended.
    pub fn end_reason(&self) -> Option<&EndReason> {
        match self {
            Self::Active => None,
            Self::Terminal { reason } => Some(reason),
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Terminal { reason } => write!(f, "terminal ({reason})"),
        }
    }
}

// ---------------------------------------------------------------------------
// Events and history
// ---------------------------------------------------------------------------

/// What changed at a given version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    /// An action was applied. `forced` marks a default action the session
    /// played on behalf of an eliminated participant.
    ActionApplied {
        participant: ParticipantId,
        action: Action,
        forced: bool,
    },
    /// A participant hit the invalid-attempt threshold.
    ParticipantEliminated {
        participant: ParticipantId,
        attempts: u32,
        policy: EliminationPolicy,
    },
    /// The session reached `Terminal`. Always the last event of a session.
    SessionEnded { reason: EndReason },
}

/// A state-change notification, projected for one participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub session_id: SessionId,
    pub version: u64,
    pub kind: EventKind,
    /// The recipient's view of the state right after this event.
    pub view: ViewPayload,
}

/// One state-changing step in a session's append-only history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HistoryRecord {
    Action {
        participant: ParticipantId,
        action: Action,
        forced: bool,
    },
    /// The rule engine removed an eliminated participant from its rotation.
    Removed { participant: ParticipantId },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub version: u64,
    pub at: DateTime<Utc>,
    pub record: HistoryRecord,
}

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

/// Session metadata readable without entering the session's serializer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: SessionId,
    pub game_type: String,
    pub version: u64,
    pub status: SessionStatus,
    pub participants: Vec<Participant>,
    pub current_actor: Option<ParticipantId>,
    pub created_at: DateTime<Utc>,
    pub origin: String,
    pub subscribers: usize,
    pub history_len: usize,
}

/// Catalog entry describing a registered game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameMeta {
    /// The tag used to select this game at session creation.
    pub game_type: String,
    pub title: String,
    pub description: String,
    pub min_players: usize,
    pub max_players: usize,
    /// Seat names, roles, and teams used when a request leaves them out.
    pub default_seats: Vec<SeatSpec>,
    pub tags: Vec<String>,
}

impl GameMeta {
    /// Metadata for a two-player game with no default seats.
    pub fn new(game_type: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            game_type: game_type.into(),
            title: title.into(),
            description: String::new(),
            min_players: 2,
            max_players: 2,
            default_seats: Vec::new(),
            tags: Vec::new(),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn players(mut self, min: usize, max: usize) -> Self {
        self.min_players = min;
        self.max_players = max;
        self
    }

    pub fn seat(mut self, seat: SeatSpec) -> Self {
        self.default_seats.push(seat);
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Returns `true` if a session with `count` seats is allowed.
    pub fn accepts_players(&self, count: usize) -> bool {
        (self.min_players..=self.max_players).contains(&count)
    }
}
