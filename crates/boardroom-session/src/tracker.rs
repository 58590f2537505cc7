//! Consecutive invalid attempts and elimination.

use boardroom_protocol::{EliminationPolicy, Participant, ParticipantId};

/// What a game declares about elimination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EliminationRules {
    /// Attempts before elimination. `None` uses the registry default.
    pub threshold: Option<u32>,
    pub policy: EliminationPolicy,
}

impl EliminationRules {
    pub fn remove_from_rotation() -> Self {
        Self {
            threshold: None,
            policy: EliminationPolicy::RemoveFromRotation,
        }
    }

    pub fn forfeit() -> Self {
        Self {
            threshold: None,
            policy: EliminationPolicy::Forfeit,
        }
    }

    pub fn with_threshold(mut self, threshold: u32) -> Self {
        self.threshold = Some(threshold);
        self
    }
}

/// Result of recording one invalid attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strike {
    Counted { attempts: u32 },
    /// This attempt crossed the threshold.
    Eliminated { attempts: u32 },
}

/// Counts invalid attempts per participant and decides elimination.
///
/// The counters themselves live on [`Participant`] so they travel with
/// session metadata; the tracker only owns the rules.
#[derive(Debug, Clone, Copy)]
pub struct EliminationTracker {
    threshold: u32,
    policy: EliminationPolicy,
}

impl EliminationTracker {
    /// A threshold of zero is treated as one.
    pub fn new(threshold: u32, policy: EliminationPolicy) -> Self {
        Self {
            threshold: threshold.max(1),
            policy,
        }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn policy(&self) -> EliminationPolicy {
        self.policy
    }

    /// Counts one invalid attempt (rejected action, timeout, malformed
    /// agent output) against `participant`.
    pub fn record_invalid(&self, participant: &mut Participant) -> Strike {
        participant.consecutive_invalid = participant.consecutive_invalid.saturating_add(1);
        let attempts = participant.consecutive_invalid;
        if !participant.eliminated && attempts >= self.threshold {
            participant.eliminated = true;
            Strike::Eliminated { attempts }
        } else {
            Strike::Counted { attempts }
        }
    }

    /// Resets the counter of `actor` after an accepted action.
    ///
    /// Eliminated participants are reset too: their record stops growing
    /// once they are out.
    pub fn record_accepted(&self, participants: &mut [Participant], actor: ParticipantId) {
        for participant in participants {
            if participant.id == actor || participant.eliminated {
                participant.consecutive_invalid = 0;
            }
        }
    }

    /// Participants not yet eliminated.
    pub fn eligible(participants: &[Participant]) -> usize {
        participants.iter().filter(|p| !p.eliminated).count()
    }
}
