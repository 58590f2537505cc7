//! The `RuleEngine` trait, the one extension point a game implements.
//!
//! The session core never looks inside game state. It asks the engine
//! whose turn it is, whether an action is legal, what the next state is,
//! and what each participant may see. Everything else (turn enforcement,
//! elimination, history, fan-out) is handled around it.

use boardroom_protocol::{Action, ActionSpec, GameMeta, Participant, ParticipantId};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::{EliminationRules, RuleError, ViewFields};

/// The rules of one game.
///
/// Engines must be deterministic: the same state, actor and action always
/// produce the same next state. That is what lets a session be replayed
/// from its initial state and history.
///
/// `apply` returns a fresh state instead of mutating in place, so the
/// session can hand the previous state to readers while it works.
pub trait RuleEngine: Send + Sync + 'static {
    /// Game-specific settings, decoded from the `config` object sent at
    /// creation. A missing config uses `Default`.
    type Config: DeserializeOwned + Default + Send + 'static;

    /// The full game state, hidden information included.
    type State: Clone + Send + Sync + Serialize + 'static;

    /// Catalog metadata. `game_type` is the tag clients create sessions with.
    fn meta(&self) -> GameMeta;

    /// Builds the initial state for the given seats.
    ///
    /// # Errors
    /// [`RuleError::InvalidConfig`] or [`RuleError::Seating`] abort
    /// session creation.
    fn init(
        &self,
        config: &Self::Config,
        participants: &[Participant],
    ) -> Result<Self::State, RuleError>;

    /// Whose turn it is, or `None` if nobody can act.
    fn current_actor(&self, state: &Self::State) -> Option<ParticipantId>;

    /// Returns `true` once the game is over.
    fn is_terminal(&self, state: &Self::State) -> bool;

    /// Checks an action without changing anything. The `Err` string is
    /// sent back to the actor as the rejection reason.
    fn validate(
        &self,
        state: &Self::State,
        actor: &Participant,
        action: &Action,
    ) -> Result<(), String>;

    /// Applies an action that passed `validate`.
    ///
    /// # Errors
    /// Any error here ends the session with an engine fault.
    fn apply(
        &self,
        state: &Self::State,
        actor: &Participant,
        action: &Action,
    ) -> Result<Self::State, RuleError>;

    /// What `viewer` is allowed to see of `state`.
    fn view(&self, state: &Self::State, viewer: &Participant) -> ViewFields;

    /// Actions `actor` may take right now. Agents choose from this list.
    fn valid_actions(&self, _state: &Self::State, _actor: &Participant) -> Vec<ActionSpec> {
        Vec::new()
    }

    /// Elimination threshold and policy. A `None` threshold uses the
    /// registry default.
    fn elimination_rules(&self) -> EliminationRules {
        EliminationRules::default()
    }

    /// The action played for an eliminated participant under
    /// [`EliminationPolicy::Forfeit`](boardroom_protocol::EliminationPolicy::Forfeit).
    fn default_action(&self, _state: &Self::State, _actor: &Participant) -> Option<Action> {
        None
    }

    /// Drops an eliminated participant from the turn order under
    /// [`EliminationPolicy::RemoveFromRotation`](boardroom_protocol::EliminationPolicy::RemoveFromRotation).
    ///
    /// The default keeps the state unchanged. If the removed participant
    /// still holds the turn afterwards the session ends with
    /// `NoEligibleActor`.
    fn remove_participant(
        &self,
        state: &Self::State,
        _participant: &Participant,
    ) -> Result<Self::State, RuleError> {
        Ok(state.clone())
    }
}
