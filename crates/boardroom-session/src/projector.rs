//! Role-scoped views of game state.

use std::collections::BTreeMap;

use boardroom_protocol::{Participant, ParticipantId, Rejection, SessionId, ViewPayload};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::RuleEngine;

// ---------------------------------------------------------------------------
// ViewFields
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
struct ViewField {
    value: Value,
    debug_only: bool,
}

/// What a rule engine returns from [`RuleEngine::view`].
///
/// Fields marked with [`debug`](Self::debug) are only kept when the
/// projector runs in [`ProjectionMode::Debug`].
///
/// ```
/// use boardroom_session::ViewFields;
/// use serde_json::json;
///
/// let fields = ViewFields::new()
///     .field("board", json!([0, 1, 2]))
///     .debug("deck", json!(["7h", "2c"]));
/// assert_eq!(fields.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewFields {
    fields: BTreeMap<String, ViewField>,
}

impl ViewFields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field the viewer may always see.
    pub fn field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Adds a field that only survives debug projection.
    pub fn debug(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert_debug(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(
            key.into(),
            ViewField {
                value: value.into(),
                debug_only: false,
            },
        );
    }

    pub fn insert_debug(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(
            key.into(),
            ViewField {
                value: value.into(),
                debug_only: true,
            },
        );
    }

    /// The value stored under `key`, debug-only or not.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key).map(|field| &field.value)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

// ---------------------------------------------------------------------------
// ViewProjector
// ---------------------------------------------------------------------------

/// Whether debug-only fields leave the session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectionMode {
    #[default]
    Production,
    Debug,
}

/// The session a view is being projected for.
#[derive(Debug, Clone, Copy)]
pub struct ProjectionScope<'a> {
    pub session_id: SessionId,
    pub version: u64,
    pub participants: &'a [Participant],
}

/// Turns engine state into a [`ViewPayload`] for one participant.
///
/// Every view, snapshot, and event payload goes through here, so a field
/// an engine marks debug-only never reaches a production client.
#[derive(Debug, Clone, Copy, Default)]
pub struct ViewProjector {
    mode: ProjectionMode,
}

impl ViewProjector {
    pub fn new(mode: ProjectionMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> ProjectionMode {
        self.mode
    }

    /// Projects `state` for `participant`.
    ///
    /// # Errors
    /// [`Rejection::NotParticipant`] if `participant` has no seat in scope.
    pub fn project<G: RuleEngine>(
        &self,
        engine: &G,
        state: &G::State,
        scope: &ProjectionScope<'_>,
        participant: ParticipantId,
    ) -> Result<ViewPayload, Rejection> {
        let viewer = scope
            .participants
            .get(participant.index())
            .filter(|p| p.id == participant)
            .ok_or(Rejection::NotParticipant { participant })?;

        let keep_debug = self.mode == ProjectionMode::Debug;
        let fields = engine
            .view(state, viewer)
            .fields
            .into_iter()
            .filter(|(_, field)| keep_debug || !field.debug_only)
            .map(|(key, field)| (key, field.value))
            .collect();

        Ok(ViewPayload {
            session_id: scope.session_id,
            participant,
            version: scope.version,
            fields,
        })
    }
}
