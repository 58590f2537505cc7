//! A small counting game used by unit tests.
//!
//! Players take turns adding 1 to 3 to a shared total; the game ends at
//! the target. Each seat holds a secret number only it can see, and the
//! move counter is a debug-only field.

use boardroom_protocol::{
    Action, ActionSpec, GameMeta, Participant, ParticipantId, SeatKind,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{EliminationRules, RuleEngine, RuleError, ViewFields};

#[derive(Debug, Clone)]
pub(crate) struct Tally {
    pub(crate) rules: EliminationRules,
    /// Whether `remove_participant` actually drops the seat.
    pub(crate) rotates: bool,
    pub(crate) forfeit_amount: i64,
}

impl Default for Tally {
    fn default() -> Self {
        Self {
            rules: EliminationRules::default(),
            rotates: true,
            forfeit_amount: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub(crate) struct TallyConfig {
    pub(crate) target: i64,
    /// `apply` fails once the total reaches this.
    pub(crate) fault_at: Option<i64>,
}

impl Default for TallyConfig {
    fn default() -> Self {
        Self {
            target: 10,
            fault_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct TallyState {
    pub(crate) total: i64,
    pub(crate) target: i64,
    pub(crate) fault_at: Option<i64>,
    pub(crate) order: Vec<ParticipantId>,
    pub(crate) turn: usize,
    pub(crate) secrets: Vec<i64>,
    pub(crate) moves: u32,
}

impl RuleEngine for Tally {
    type Config = TallyConfig;
    type State = TallyState;

    fn meta(&self) -> GameMeta {
        GameMeta::new("tally", "Tally").players(2, 4)
    }

    fn init(
        &self,
        config: &TallyConfig,
        participants: &[Participant],
    ) -> Result<TallyState, RuleError> {
        if participants.len() < 2 {
            return Err(RuleError::Seating("tally needs two players".into()));
        }
        Ok(TallyState {
            total: 0,
            target: config.target,
            fault_at: config.fault_at,
            order: participants.iter().map(|p| p.id).collect(),
            turn: 0,
            secrets: (0..participants.len() as i64).map(|i| i * 7 + 1).collect(),
            moves: 0,
        })
    }

    fn current_actor(&self, state: &TallyState) -> Option<ParticipantId> {
        if state.total >= state.target {
            return None;
        }
        state.order.get(state.turn).copied()
    }

    fn is_terminal(&self, state: &TallyState) -> bool {
        state.total >= state.target || state.order.len() < 2
    }

    fn validate(
        &self,
        _state: &TallyState,
        _actor: &Participant,
        action: &Action,
    ) -> Result<(), String> {
        if action.name != "add" {
            return Err(format!("unknown action '{}'", action.name));
        }
        let amount = action
            .param("amount")
            .and_then(|v| v.as_i64())
            .ok_or("missing amount")?;
        if !(1..=3).contains(&amount) {
            return Err("amount must be between 1 and 3".into());
        }
        Ok(())
    }

    fn apply(
        &self,
        state: &TallyState,
        _actor: &Participant,
        action: &Action,
    ) -> Result<TallyState, RuleError> {
        let amount = action.param("amount").and_then(|v| v.as_i64()).unwrap_or(0);
        let mut next = state.clone();
        next.total += amount;
        if next.fault_at.is_some_and(|limit| next.total >= limit) {
            return Err(RuleError::Fault("tally overflowed".into()));
        }
        next.moves += 1;
        next.turn = (next.turn + 1) % next.order.len();
        Ok(next)
    }

    fn view(&self, state: &TallyState, viewer: &Participant) -> ViewFields {
        ViewFields::new()
            .field("total", state.total)
            .field("target", state.target)
            .field("secret", state.secrets[viewer.id.index()])
            .debug("moves", state.moves)
    }

    fn valid_actions(&self, _state: &TallyState, _actor: &Participant) -> Vec<ActionSpec> {
        vec![ActionSpec::new("add", "Add to the tally").with_schema(json!({
            "properties": {"amount": {"type": "integer", "minimum": 1, "maximum": 3}}
        }))]
    }

    fn elimination_rules(&self) -> EliminationRules {
        self.rules
    }

    fn default_action(&self, _state: &TallyState, _actor: &Participant) -> Option<Action> {
        Some(add(self.forfeit_amount))
    }

    fn remove_participant(
        &self,
        state: &TallyState,
        participant: &Participant,
    ) -> Result<TallyState, RuleError> {
        let mut next = state.clone();
        if !self.rotates {
            return Ok(next);
        }
        if let Some(pos) = next.order.iter().position(|id| *id == participant.id) {
            next.order.remove(pos);
            if pos < next.turn {
                next.turn -= 1;
            }
            if next.turn >= next.order.len() {
                next.turn = 0;
            }
        }
        Ok(next)
    }
}

pub(crate) fn seats(n: u32) -> Vec<Participant> {
    (0..n)
        .map(|i| Participant::new(ParticipantId(i), format!("P{i}"), SeatKind::Human))
        .collect()
}

pub(crate) fn add(amount: i64) -> Action {
    Action::with_params("add", json!({ "amount": amount }))
}
