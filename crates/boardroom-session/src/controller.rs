//! The turn controller: one session's state machine.
//!
//! A `TurnController` owns a session's game state, participants, history
//! and version counter. It is plain synchronous code with no channels;
//! the session actor is the only thing that holds one, which is what
//! makes every mutation serialized.
//!
//! Every state change bumps the version by exactly one and produces one
//! [`EventRecord`]:
//!
//! ```text
//! submit ─→ checks ─→ validate ─┬─ ok ──→ apply ──→ ActionApplied ─→ settle
//!                               └─ err ─→ strike ─┬─ counted ──→ (no event)
//!                                                 └─ eliminated → ParticipantEliminated ─→ settle
//! settle: forced actions for forfeited seats, then SessionEnded if the
//!         game is over or nobody can act.
//! ```

use std::sync::Arc;

use boardroom_agent::AgentFailure;
use boardroom_protocol::{
    Action, ActionSpec, EliminationPolicy, EndReason, EventKind, HistoryEntry,
    HistoryRecord, Participant, ParticipantId, Rejection, SessionId, SessionStatus,
};
use chrono::Utc;

use crate::{EliminationTracker, RuleEngine, RuleError, Strike};

/// One state change, with the state right after it.
///
/// The actor projects `state` separately for every recipient.
#[derive(Debug, Clone)]
pub struct EventRecord<S> {
    pub version: u64,
    pub kind: EventKind,
    pub state: S,
}

/// Result of a submission or an agent failure.
#[derive(Debug)]
pub struct Outcome<S> {
    /// The version the submitted action was applied at, or why not.
    pub result: Result<u64, Rejection>,
    /// Every state change this call caused, in version order. A rejected
    /// attempt can still produce events (an elimination, a session end).
    pub events: Vec<EventRecord<S>>,
}

impl<S> Outcome<S> {
    fn rejected(rejection: Rejection) -> Self {
        Self {
            result: Err(rejection),
            events: Vec::new(),
        }
    }
}

pub struct TurnController<G: RuleEngine> {
    engine: Arc<G>,
    session_id: SessionId,
    initial: G::State,
    state: G::State,
    participants: Vec<Participant>,
    tracker: EliminationTracker,
    history: Vec<HistoryEntry>,
    version: u64,
    status: SessionStatus,
}

impl<G: RuleEngine> TurnController<G> {
    /// Initializes the game and settles it once.
    ///
    /// The returned events are non-empty only when the initial state
    /// already ends the session.
    ///
    /// # Errors
    /// Whatever [`RuleEngine::init`] reports.
    pub fn new(
        engine: Arc<G>,
        session_id: SessionId,
        participants: Vec<Participant>,
        config: &G::Config,
        default_threshold: u32,
    ) -> Result<(Self, Vec<EventRecord<G::State>>), RuleError> {
        let state = engine.init(config, &participants)?;
        let rules = engine.elimination_rules();
        let tracker =
            EliminationTracker::new(rules.threshold.unwrap_or(default_threshold), rules.policy);

        let mut controller = Self {
            engine,
            session_id,
            initial: state.clone(),
            state,
            participants,
            tracker,
            history: Vec::new(),
            version: 0,
            status: SessionStatus::Active,
        };
        let events = controller.settle();
        Ok((controller, events))
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn engine(&self) -> &Arc<G> {
        &self.engine
    }

    pub fn state(&self) -> &G::State {
        &self.state
    }

    pub fn initial_state(&self) -> &G::State {
        &self.initial
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn participant(&self, id: ParticipantId) -> Option<&Participant> {
        self.participants.get(id.index()).filter(|p| p.id == id)
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn status(&self) -> &SessionStatus {
        &self.status
    }

    pub fn tracker(&self) -> &EliminationTracker {
        &self.tracker
    }

    /// The participant allowed to act now. Always `None` once terminal.
    pub fn current_actor(&self) -> Option<&Participant> {
        if self.status.is_terminal() {
            return None;
        }
        self.engine
            .current_actor(&self.state)
            .and_then(|id| self.participant(id))
    }

    /// Legal actions for `participant`; empty when it is not their turn
    /// or the session is over.
    pub fn valid_actions(&self, participant: ParticipantId) -> Vec<ActionSpec> {
        match self.current_actor() {
            Some(actor) if actor.id == participant && !actor.eliminated => {
                self.engine.valid_actions(&self.state, actor)
            }
            _ => Vec::new(),
        }
    }

    /// Submits an action on behalf of `participant`.
    ///
    /// With `expected_version` set, the action is refused as stale unless
    /// the session is still at that version.
    pub fn submit(
        &mut self,
        participant: ParticipantId,
        action: Action,
        expected_version: Option<u64>,
    ) -> Outcome<G::State> {
        let idx = match self.check_turn(participant, expected_version) {
            Ok(idx) => idx,
            Err(rejection) => {
                tracing::debug!(
                    session_id = %self.session_id,
                    %participant,
                    %rejection,
                    "submission refused"
                );
                return Outcome::rejected(rejection);
            }
        };

        if let Err(reason) = self.engine.validate(&self.state, &self.participants[idx], &action) {
            tracing::debug!(
                session_id = %self.session_id,
                %participant,
                action = %action.name,
                %reason,
                "action failed validation"
            );
            return self.strike(idx, |attempts, eliminated| Rejection::ValidationRejected {
                participant,
                reason,
                attempts,
                eliminated,
            });
        }

        match self.apply_action(idx, action, false) {
            Ok(record) => {
                let version = record.version;
                let mut events = vec![record];
                events.extend(self.settle());
                Outcome {
                    result: Ok(version),
                    events,
                }
            }
            Err((reason, events)) => Outcome {
                result: Err(Rejection::SessionTerminal { reason }),
                events,
            },
        }
    }

    /// Counts a failed agent attempt for the seat that held the turn at
    /// `version`. A late failure for a turn that has moved on is refused
    /// as stale and not counted.
    pub fn record_agent_failure(
        &mut self,
        participant: ParticipantId,
        version: u64,
        failure: &AgentFailure,
    ) -> Outcome<G::State> {
        let idx = match self.check_turn(participant, Some(version)) {
            Ok(idx) => idx,
            Err(rejection) => return Outcome::rejected(rejection),
        };

        match failure {
            AgentFailure::Timeout(_) => {
                self.strike(idx, |attempts, eliminated| Rejection::AgentTimeout {
                    participant,
                    attempts,
                    eliminated,
                })
            }
            other => {
                let reason = other.to_string();
                self.strike(idx, |attempts, eliminated| Rejection::ValidationRejected {
                    participant,
                    reason,
                    attempts,
                    eliminated,
                })
            }
        }
    }

    /// Ends the session from outside (idle timeout, shutdown). Does
    /// nothing if it has already ended.
    pub fn terminate(&mut self, reason: EndReason) -> Vec<EventRecord<G::State>> {
        self.end(reason)
    }

    // -- internals ----------------------------------------------------------

    fn check_turn(
        &self,
        participant: ParticipantId,
        expected_version: Option<u64>,
    ) -> Result<usize, Rejection> {
        if let SessionStatus::Terminal { reason } = &self.status {
            return Err(Rejection::SessionTerminal {
                reason: reason.clone(),
            });
        }
        let Some(seat) = self.participant(participant) else {
            return Err(Rejection::NotParticipant { participant });
        };
        if seat.eliminated {
            return Err(Rejection::Eliminated { participant });
        }

        let current_actor = self.engine.current_actor(&self.state);
        let stale = expected_version.is_some_and(|v| v != self.version);
        if stale || current_actor != Some(participant) {
            return Err(Rejection::TurnMismatch {
                participant,
                current_actor,
                version: self.version,
                stale,
            });
        }
        Ok(participant.index())
    }

    fn strike(
        &mut self,
        idx: usize,
        rejection: impl FnOnce(u32, bool) -> Rejection,
    ) -> Outcome<G::State> {
        let participant = self.participants[idx].id;
        match self.tracker.record_invalid(&mut self.participants[idx]) {
            Strike::Counted { attempts } => {
                tracing::debug!(
                    session_id = %self.session_id,
                    %participant,
                    attempts,
                    threshold = self.tracker.threshold(),
                    "invalid attempt counted"
                );
                Outcome::rejected(rejection(attempts, false))
            }
            Strike::Eliminated { attempts } => {
                let mut events = self.eliminate(idx, attempts);
                events.extend(self.settle());
                Outcome {
                    result: Err(rejection(attempts, true)),
                    events,
                }
            }
        }
    }

    fn eliminate(&mut self, idx: usize, attempts: u32) -> Vec<EventRecord<G::State>> {
        let participant = self.participants[idx].id;
        let policy = self.tracker.policy();
        tracing::info!(
            session_id = %self.session_id,
            %participant,
            attempts,
            ?policy,
            "participant eliminated"
        );

        let mut fault = None;
        if policy == EliminationPolicy::RemoveFromRotation {
            match self.engine.remove_participant(&self.state, &self.participants[idx]) {
                Ok(next) => self.state = next,
                Err(e) => fault = Some(e),
            }
        }

        let record = self.bump(EventKind::ParticipantEliminated {
            participant,
            attempts,
            policy,
        });
        if policy == EliminationPolicy::RemoveFromRotation && fault.is_none() {
            self.history.push(HistoryEntry {
                version: record.version,
                at: Utc::now(),
                record: HistoryRecord::Removed { participant },
            });
        }

        let mut events = vec![record];
        if let Some(e) = fault {
            events.extend(self.end(EndReason::EngineFault {
                message: e.to_string(),
            }));
        }
        events
    }

    fn apply_action(
        &mut self,
        idx: usize,
        action: Action,
        forced: bool,
    ) -> Result<EventRecord<G::State>, (EndReason, Vec<EventRecord<G::State>>)> {
        let participant = self.participants[idx].id;
        match self.engine.apply(&self.state, &self.participants[idx], &action) {
            Ok(next) => self.state = next,
            Err(e) => {
                let reason = EndReason::EngineFault {
                    message: e.to_string(),
                };
                let events = self.end(reason.clone());
                return Err((reason, events));
            }
        }

        self.tracker.record_accepted(&mut self.participants, participant);
        let record = self.bump(EventKind::ActionApplied {
            participant,
            action: action.clone(),
            forced,
        });
        tracing::debug!(
            session_id = %self.session_id,
            %participant,
            action = %action.name,
            version = record.version,
            forced,
            "action applied"
        );
        self.history.push(HistoryEntry {
            version: record.version,
            at: Utc::now(),
            record: HistoryRecord::Action {
                participant,
                action,
                forced,
            },
        });
        Ok(record)
    }

    /// Brings the session to a state where someone eligible holds the
    /// turn, or ends it.
    ///
    /// Under `Forfeit`, default actions are played for eliminated seats
    /// that hold the turn. At most one forced action per seat is played
    /// in a row; past that, nobody can make progress.
    fn settle(&mut self) -> Vec<EventRecord<G::State>> {
        let mut events = Vec::new();
        let mut forced_turns = 0;

        loop {
            if self.status.is_terminal() {
                return events;
            }
            if self.engine.is_terminal(&self.state) {
                events.extend(self.end(EndReason::Completed));
                return events;
            }
            if EliminationTracker::eligible(&self.participants) == 0 {
                events.extend(self.end(EndReason::NoEligibleActor));
                return events;
            }

            let Some(actor_id) = self.engine.current_actor(&self.state) else {
                events.extend(self.end(EndReason::NoEligibleActor));
                return events;
            };
            let Some(actor) = self.participant(actor_id) else {
                events.extend(self.end(EndReason::EngineFault {
                    message: format!("turn given to unknown participant {actor_id}"),
                }));
                return events;
            };
            if !actor.eliminated {
                return events;
            }

            if self.tracker.policy() == EliminationPolicy::RemoveFromRotation
                || forced_turns >= self.participants.len()
            {
                events.extend(self.end(EndReason::NoEligibleActor));
                return events;
            }

            let idx = actor_id.index();
            let forced = self
                .engine
                .default_action(&self.state, actor)
                .filter(|action| self.engine.validate(&self.state, actor, action).is_ok());
            let Some(action) = forced else {
                tracing::warn!(
                    session_id = %self.session_id,
                    participant = %actor_id,
                    "no valid default action for forfeited seat"
                );
                events.extend(self.end(EndReason::NoEligibleActor));
                return events;
            };

            forced_turns += 1;
            match self.apply_action(idx, action, true) {
                Ok(record) => events.push(record),
                Err((_, ended)) => {
                    events.extend(ended);
                    return events;
                }
            }
        }
    }

    fn end(&mut self, reason: EndReason) -> Vec<EventRecord<G::State>> {
        if self.status.is_terminal() {
            return Vec::new();
        }
        if reason.is_abnormal() {
            tracing::warn!(session_id = %self.session_id, %reason, "session ended");
        } else {
            tracing::info!(session_id = %self.session_id, %reason, "session ended");
        }
        self.status = SessionStatus::Terminal {
            reason: reason.clone(),
        };
        vec![self.bump(EventKind::SessionEnded { reason })]
    }

    fn bump(&mut self, kind: EventKind) -> EventRecord<G::State> {
        self.version += 1;
        EventRecord {
            version: self.version,
            kind,
            state: self.state.clone(),
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
