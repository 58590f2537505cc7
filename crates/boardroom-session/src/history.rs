//! Rebuilding a session's state from its history.

use boardroom_protocol::{HistoryEntry, HistoryRecord, Participant};

use crate::{RuleEngine, RuleError};

/// Replays `history` on top of `initial`.
///
/// Because rule engines are deterministic, the result equals the state
/// the live session reached after the same entries.
///
/// # Errors
/// [`RuleError::Fault`] if an entry names a seat that does not exist, or
/// whatever the engine reports while re-applying an entry.
pub fn replay<G: RuleEngine>(
    engine: &G,
    initial: &G::State,
    participants: &[Participant],
    history: &[HistoryEntry],
) -> Result<G::State, RuleError> {
    let mut state = initial.clone();
    for entry in history {
        let id = match &entry.record {
            HistoryRecord::Action { participant, .. } | HistoryRecord::Removed { participant } => {
                *participant
            }
        };
        let seat = participants
            .get(id.index())
            .filter(|p| p.id == id)
            .ok_or_else(|| {
                RuleError::Fault(format!("history entry {} names unknown {id}", entry.version))
            })?;

        state = match &entry.record {
            HistoryRecord::Action { action, .. } => engine.apply(&state, seat, action)?,
            HistoryRecord::Removed { .. } => engine.remove_participant(&state, seat)?,
        };
    }
    Ok(state)
}
