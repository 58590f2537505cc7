//! Session actor: an isolated Tokio task that owns one session.
//!
//! Every mutation (submissions, agent decisions, subscriptions, shutdown)
//! goes through the actor's bounded command queue and is applied in
//! arrival order by a single task. Reads do not: after each change the
//! actor publishes an immutable snapshot on a `watch` channel, and
//! [`SessionHandle::info`] / [`SessionHandle::view`] read that snapshot
//! directly. A pending agent decision therefore never blocks a reader.
//!
//! ```text
//! handles ──commands──→ ┌──────────────┐ ──SessionFeed──→ subscribers
//!                       │ SessionActor │
//! agent tasks ─decide─→ │ (controller) │ ──snapshot────→ readers
//!                       └──────────────┘
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use boardroom_agent::{Agent, AgentFailure, AgentGateway};
use boardroom_protocol::{
    Action, ActionSpec, EndReason, Event, HistoryEntry, ParticipantId, Rejection,
    SessionId, SessionInfo, ViewPayload,
};
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::SessionSettings;
use crate::{EventRecord, ProjectionScope, RuleEngine, RuleError, TurnController, ViewProjector};

// ---------------------------------------------------------------------------
// Feeds and subscriptions
// ---------------------------------------------------------------------------

/// What a subscriber receives: one snapshot, then events in version order.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionFeed {
    Snapshot(ViewPayload),
    Event(Event),
}

type FeedSender = mpsc::UnboundedSender<SessionFeed>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// A live feed of one participant's view of a session.
///
/// The first item is always [`SessionFeed::Snapshot`]. Dropping the
/// subscription unsubscribes it.
pub struct Subscription {
    id: SubscriberId,
    session_id: SessionId,
    participant: ParticipantId,
    feed: mpsc::UnboundedReceiver<SessionFeed>,
    commands: mpsc::Sender<SessionCommand>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn participant(&self) -> ParticipantId {
        self.participant
    }

    /// Next item, or `None` once the session has stopped and everything
    /// queued was delivered.
    pub async fn recv(&mut self) -> Option<SessionFeed> {
        self.feed.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        // A full queue is fine: the actor also drops closed feeds itself.
        let _ = self.commands.try_send(SessionCommand::Unsubscribe {
            subscriber: self.id,
        });
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("session_id", &self.session_id)
            .field("participant", &self.participant)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

pub(crate) enum SessionCommand {
    Submit {
        participant: ParticipantId,
        action: Action,
        expected_version: Option<u64>,
        reply: oneshot::Sender<Result<Event, Rejection>>,
    },
    Subscribe {
        participant: ParticipantId,
        sender: FeedSender,
        reply: oneshot::Sender<Result<SubscriberId, Rejection>>,
    },
    Unsubscribe {
        subscriber: SubscriberId,
    },
    History {
        reply: oneshot::Sender<Vec<HistoryEntry>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

/// A frozen copy of a session, readable from any task.
pub(crate) trait SessionSnapshot: Send + Sync {
    fn info(&self) -> &SessionInfo;
    fn view(&self, participant: ParticipantId) -> Result<ViewPayload, Rejection>;
    fn valid_actions(&self, participant: ParticipantId) -> Result<Vec<ActionSpec>, Rejection>;
}

struct Snapshot<G: RuleEngine> {
    engine: Arc<G>,
    projector: ViewProjector,
    state: G::State,
    info: SessionInfo,
}

impl<G: RuleEngine> Snapshot<G> {
    fn scope(&self) -> ProjectionScope<'_> {
        ProjectionScope {
            session_id: self.info.session_id,
            version: self.info.version,
            participants: &self.info.participants,
        }
    }
}

impl<G: RuleEngine> SessionSnapshot for Snapshot<G> {
    fn info(&self) -> &SessionInfo {
        &self.info
    }

    fn view(&self, participant: ParticipantId) -> Result<ViewPayload, Rejection> {
        self.projector
            .project(self.engine.as_ref(), &self.state, &self.scope(), participant)
    }

    fn valid_actions(&self, participant: ParticipantId) -> Result<Vec<ActionSpec>, Rejection> {
        let seat = self
            .info
            .participants
            .get(participant.index())
            .filter(|p| p.id == participant)
            .ok_or(Rejection::NotParticipant { participant })?;
        if self.info.current_actor != Some(participant) || seat.eliminated {
            return Ok(Vec::new());
        }
        Ok(self.engine.valid_actions(&self.state, seat))
    }
}

// ---------------------------------------------------------------------------
// SessionHandle
// ---------------------------------------------------------------------------

/// Handle to a running session actor.
///
/// Cheap to clone. Mutating calls queue a command and wait for the
/// actor's reply; `info`, `view` and `valid_actions` read the latest
/// snapshot without queueing.
#[derive(Clone)]
pub struct SessionHandle {
    session_id: SessionId,
    commands: mpsc::Sender<SessionCommand>,
    snapshot: watch::Receiver<Arc<dyn SessionSnapshot>>,
}

impl SessionHandle {
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Session metadata as of the last completed change.
    pub fn info(&self) -> SessionInfo {
        self.snapshot.borrow().info().clone()
    }

    /// `participant`'s view as of the last completed change.
    pub fn view(&self, participant: ParticipantId) -> Result<ViewPayload, Rejection> {
        self.snapshot.borrow().view(participant)
    }

    /// Legal actions for `participant`; empty unless it is their turn.
    pub fn valid_actions(&self, participant: ParticipantId) -> Result<Vec<ActionSpec>, Rejection> {
        self.snapshot.borrow().valid_actions(participant)
    }

    /// Returns `true` once the actor has stopped.
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    /// Submits an action and waits for the verdict.
    pub async fn submit(
        &self,
        participant: ParticipantId,
        action: Action,
        expected_version: Option<u64>,
    ) -> Result<Event, Rejection> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(SessionCommand::Submit {
            participant,
            action,
            expected_version,
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| self.unavailable())?
    }

    /// Opens a feed of `participant`'s view.
    pub async fn subscribe(&self, participant: ParticipantId) -> Result<Subscription, Rejection> {
        let (feed_tx, feed_rx) = mpsc::unbounded_channel();
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(SessionCommand::Subscribe {
            participant,
            sender: feed_tx,
            reply: reply_tx,
        })
        .await?;
        let id = reply_rx.await.map_err(|_| self.unavailable())??;
        Ok(Subscription {
            id,
            session_id: self.session_id,
            participant,
            feed: feed_rx,
            commands: self.commands.clone(),
        })
    }

    /// The session's full history.
    pub async fn history(&self) -> Result<Vec<HistoryEntry>, Rejection> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(SessionCommand::History { reply: reply_tx }).await?;
        reply_rx.await.map_err(|_| self.unavailable())
    }

    /// Ends the session (if still active) and stops the actor once the
    /// end has been broadcast.
    pub async fn shutdown(&self) -> Result<(), Rejection> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(SessionCommand::Shutdown { reply: reply_tx }).await?;
        reply_rx.await.map_err(|_| self.unavailable())
    }

    /// Waits until the session metadata satisfies `predicate`.
    ///
    /// # Errors
    /// [`Rejection::Unavailable`] if the actor stops first.
    pub async fn wait_for(
        &self,
        mut predicate: impl FnMut(&SessionInfo) -> bool,
    ) -> Result<SessionInfo, Rejection> {
        let mut snapshot = self.snapshot.clone();
        loop {
            {
                let current = snapshot.borrow_and_update();
                if predicate(current.info()) {
                    return Ok(current.info().clone());
                }
            }
            snapshot.changed().await.map_err(|_| self.unavailable())?;
        }
    }

    async fn send(&self, command: SessionCommand) -> Result<(), Rejection> {
        self.commands
            .send(command)
            .await
            .map_err(|_| self.unavailable())
    }

    fn unavailable(&self) -> Rejection {
        Rejection::Unavailable {
            session_id: self.session_id,
        }
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("session_id", &self.session_id)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

/// Everything needed to start a session.
pub(crate) struct SessionSeed<G: RuleEngine> {
    pub(crate) engine: Arc<G>,
    pub(crate) session_id: SessionId,
    pub(crate) game_type: String,
    pub(crate) origin: String,
    pub(crate) participants: Vec<boardroom_protocol::Participant>,
    pub(crate) config: G::Config,
    pub(crate) agents: HashMap<ParticipantId, Arc<dyn Agent>>,
    pub(crate) settings: SessionSettings,
}

struct Subscriber {
    participant: ParticipantId,
    sender: FeedSender,
}

struct PendingDecision {
    participant: ParticipantId,
    version: u64,
    task: JoinHandle<()>,
}

struct AgentDecision {
    participant: ParticipantId,
    version: u64,
    result: Result<Action, AgentFailure>,
}

struct SessionActor<G: RuleEngine> {
    controller: TurnController<G>,
    projector: ViewProjector,
    game_type: String,
    origin: String,
    created_at: DateTime<Utc>,
    gateway: AgentGateway,
    agents: HashMap<ParticipantId, Arc<dyn Agent>>,
    subscribers: BTreeMap<SubscriberId, Subscriber>,
    next_subscriber: u64,
    pending: Option<PendingDecision>,
    decisions_tx: mpsc::UnboundedSender<AgentDecision>,
    decisions: mpsc::UnboundedReceiver<AgentDecision>,
    commands: mpsc::Receiver<SessionCommand>,
    snapshot: watch::Sender<Arc<dyn SessionSnapshot>>,
    idle_timeout: Duration,
}

impl<G: RuleEngine> SessionActor<G> {
    async fn run(mut self) {
        let session_id = self.controller.session_id();
        tracing::info!(
            %session_id,
            game_type = %self.game_type,
            participants = self.controller.participants().len(),
            "session actor started"
        );

        self.drive_agents();
        let idle = tokio::time::sleep_until(self.idle_deadline());
        tokio::pin!(idle);

        loop {
            tokio::select! {
                command = self.commands.recv() => {
                    let Some(command) = command else {
                        tracing::debug!(%session_id, "all handles dropped");
                        break;
                    };
                    idle.as_mut().reset(self.idle_deadline());
                    if !self.handle_command(command) {
                        break;
                    }
                }
                Some(decision) = self.decisions.recv() => {
                    idle.as_mut().reset(self.idle_deadline());
                    self.handle_decision(decision);
                }
                () = &mut idle => {
                    tracing::info!(%session_id, "session idle, stopping");
                    let events = self.controller.terminate(EndReason::IdleTimeout);
                    self.publish(events);
                    break;
                }
            }
        }

        self.cancel_pending();
        tracing::info!(%session_id, version = self.controller.version(), "session actor stopped");
    }

    /// Returns `false` when the actor should stop.
    fn handle_command(&mut self, command: SessionCommand) -> bool {
        match command {
            SessionCommand::Submit {
                participant,
                action,
                expected_version,
                reply,
            } => {
                let outcome = self.controller.submit(participant, action, expected_version);
                let response = outcome.result.and_then(|version| {
                    outcome
                        .events
                        .iter()
                        .find(|record| record.version == version)
                        .ok_or(Rejection::Unavailable {
                            session_id: self.controller.session_id(),
                        })
                        .and_then(|record| self.project_event(record, participant))
                });
                self.publish(outcome.events);
                let _ = reply.send(response);
            }
            SessionCommand::Subscribe {
                participant,
                sender,
                reply,
            } => {
                let _ = reply.send(self.handle_subscribe(participant, sender));
            }
            SessionCommand::Unsubscribe { subscriber } => {
                if self.subscribers.remove(&subscriber).is_some() {
                    tracing::debug!(
                        session_id = %self.controller.session_id(),
                        %subscriber,
                        "subscriber removed"
                    );
                    self.refresh();
                }
            }
            SessionCommand::History { reply } => {
                let _ = reply.send(self.controller.history().to_vec());
            }
            SessionCommand::Shutdown { reply } => {
                tracing::info!(session_id = %self.controller.session_id(), "session shutting down");
                let events = self.controller.terminate(EndReason::Shutdown);
                self.publish(events);
                let _ = reply.send(());
                return false;
            }
        }
        true
    }

    /// The snapshot is queued before the subscriber is registered, so it
    /// always precedes any event. An ended session has no more events to
    /// offer and refuses new subscribers.
    fn handle_subscribe(
        &mut self,
        participant: ParticipantId,
        sender: FeedSender,
    ) -> Result<SubscriberId, Rejection> {
        if let Some(reason) = self.controller.status().end_reason() {
            return Err(Rejection::SessionTerminal {
                reason: reason.clone(),
            });
        }
        let snapshot = self.project_current(participant)?;
        let id = SubscriberId(self.next_subscriber);
        self.next_subscriber += 1;

        if sender.send(SessionFeed::Snapshot(snapshot)).is_ok() {
            self.subscribers.insert(
                id,
                Subscriber {
                    participant,
                    sender,
                },
            );
            tracing::debug!(
                session_id = %self.controller.session_id(),
                subscriber = %id,
                %participant,
                version = self.controller.version(),
                "subscriber added"
            );
            self.refresh();
        }
        Ok(id)
    }

    fn handle_decision(&mut self, decision: AgentDecision) {
        let expected = self
            .pending
            .as_ref()
            .is_some_and(|p| p.participant == decision.participant && p.version == decision.version);
        if !expected {
            tracing::debug!(
                session_id = %self.controller.session_id(),
                participant = %decision.participant,
                version = decision.version,
                "stale agent decision dropped"
            );
            return;
        }
        self.pending = None;

        let outcome = match decision.result {
            Ok(action) => {
                self.controller
                    .submit(decision.participant, action, Some(decision.version))
            }
            Err(failure) => self.controller.record_agent_failure(
                decision.participant,
                decision.version,
                &failure,
            ),
        };
        if let Err(rejection) = &outcome.result {
            tracing::debug!(
                session_id = %self.controller.session_id(),
                participant = %decision.participant,
                %rejection,
                "agent attempt refused"
            );
        }
        self.publish(outcome.events);
    }

    /// Fans out `events`, refreshes the snapshot and, if an agent now
    /// holds the turn, asks it for a decision.
    fn publish(&mut self, events: Vec<EventRecord<G::State>>) {
        for record in &events {
            self.broadcast(record);
        }
        self.refresh();
        self.drive_agents();
    }

    fn broadcast(&mut self, record: &EventRecord<G::State>) {
        let mut gone = Vec::new();
        for (id, subscriber) in &self.subscribers {
            match self.project_event(record, subscriber.participant) {
                Ok(event) => {
                    if subscriber.sender.send(SessionFeed::Event(event)).is_err() {
                        gone.push(*id);
                    }
                }
                Err(rejection) => {
                    tracing::warn!(
                        session_id = %self.controller.session_id(),
                        subscriber = %id,
                        %rejection,
                        "cannot project event for subscriber"
                    );
                    gone.push(*id);
                }
            }
        }
        for id in gone {
            self.subscribers.remove(&id);
            tracing::debug!(
                session_id = %self.controller.session_id(),
                subscriber = %id,
                "closed subscriber dropped"
            );
        }
    }

    fn drive_agents(&mut self) {
        let Some(actor) = self.controller.current_actor().cloned() else {
            self.cancel_pending();
            return;
        };
        let version = self.controller.version();
        if self
            .pending
            .as_ref()
            .is_some_and(|p| p.participant == actor.id && p.version == version)
        {
            return;
        }
        self.cancel_pending();

        if !actor.is_agent() || actor.eliminated {
            return;
        }
        let session_id = self.controller.session_id();
        let Some(agent) = self.agents.get(&actor.id).cloned() else {
            tracing::warn!(%session_id, participant = %actor.id, "agent seat has no agent");
            return;
        };
        let view = match self.project_current(actor.id) {
            Ok(view) => view,
            Err(rejection) => {
                tracing::warn!(%session_id, participant = %actor.id, %rejection, "cannot project view for agent");
                return;
            }
        };
        let actions = self.controller.valid_actions(actor.id);
        let participant = actor.id;
        let request = self.gateway.request(session_id, actor, view, actions);
        let gateway = self.gateway.clone();
        let decisions = self.decisions_tx.clone();

        tracing::debug!(%session_id, %participant, version, "requesting agent decision");
        let task = tokio::spawn(async move {
            let result = gateway.decide(agent.as_ref(), &request).await;
            let _ = decisions.send(AgentDecision {
                participant,
                version,
                result,
            });
        });
        self.pending = Some(PendingDecision {
            participant,
            version,
            task,
        });
    }

    fn cancel_pending(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.task.abort();
        }
    }

    fn project_current(&self, participant: ParticipantId) -> Result<ViewPayload, Rejection> {
        self.projector.project(
            self.controller.engine().as_ref(),
            self.controller.state(),
            &self.scope(self.controller.version()),
            participant,
        )
    }

    fn project_event(
        &self,
        record: &EventRecord<G::State>,
        participant: ParticipantId,
    ) -> Result<Event, Rejection> {
        let view = self.projector.project(
            self.controller.engine().as_ref(),
            &record.state,
            &self.scope(record.version),
            participant,
        )?;
        Ok(Event {
            session_id: self.controller.session_id(),
            version: record.version,
            kind: record.kind.clone(),
            view,
        })
    }

    fn scope(&self, version: u64) -> ProjectionScope<'_> {
        ProjectionScope {
            session_id: self.controller.session_id(),
            version,
            participants: self.controller.participants(),
        }
    }

    fn refresh(&mut self) {
        // An unsubscribe can be lost when the command queue is full.
        self.subscribers.retain(|_, subscriber| !subscriber.sender.is_closed());
        let snapshot = capture(
            &self.controller,
            self.projector,
            &self.game_type,
            &self.origin,
            self.created_at,
            self.subscribers.len(),
        );
        self.snapshot.send_replace(snapshot);
    }

    fn idle_deadline(&self) -> Instant {
        let now = Instant::now();
        now.checked_add(self.idle_timeout)
            .unwrap_or_else(|| now + Duration::from_secs(365 * 24 * 60 * 60))
    }
}

fn capture<G: RuleEngine>(
    controller: &TurnController<G>,
    projector: ViewProjector,
    game_type: &str,
    origin: &str,
    created_at: DateTime<Utc>,
    subscribers: usize,
) -> Arc<dyn SessionSnapshot> {
    let info = SessionInfo {
        session_id: controller.session_id(),
        game_type: game_type.to_owned(),
        version: controller.version(),
        status: controller.status().clone(),
        participants: controller.participants().to_vec(),
        current_actor: controller.current_actor().map(|p| p.id),
        created_at,
        origin: origin.to_owned(),
        subscribers,
        history_len: controller.history().len(),
    };
    Arc::new(Snapshot {
        engine: Arc::clone(controller.engine()),
        projector,
        state: controller.state().clone(),
        info,
    })
}

/// A session whose game is initialized but whose actor is not running.
pub(crate) struct PreparedSession<G: RuleEngine> {
    handle: SessionHandle,
    actor: SessionActor<G>,
}

impl<G: RuleEngine> PreparedSession<G> {
    /// Starts the actor task.
    pub(crate) fn spawn(self) -> (SessionHandle, JoinHandle<()>) {
        let task = tokio::spawn(self.actor.run());
        (self.handle, task)
    }
}

/// Initializes the game and builds its actor without starting it.
///
/// # Errors
/// Whatever [`RuleEngine::init`] reports.
pub(crate) fn prepare_session<G: RuleEngine>(
    seed: SessionSeed<G>,
) -> Result<PreparedSession<G>, RuleError> {
    let SessionSeed {
        engine,
        session_id,
        game_type,
        origin,
        participants,
        config,
        agents,
        settings,
    } = seed;

    let (controller, _) =
        TurnController::new(engine, session_id, participants, &config, settings.threshold)?;
    let projector = ViewProjector::new(settings.projection);
    let created_at = Utc::now();

    let (command_tx, command_rx) = mpsc::channel(settings.command_buffer);
    let (decisions_tx, decisions_rx) = mpsc::unbounded_channel();
    let (snapshot_tx, snapshot_rx) = watch::channel(capture(
        &controller,
        projector,
        &game_type,
        &origin,
        created_at,
        0,
    ));

    let actor = SessionActor {
        controller,
        projector,
        game_type,
        origin,
        created_at,
        gateway: settings.gateway,
        agents,
        subscribers: BTreeMap::new(),
        next_subscriber: 0,
        pending: None,
        decisions_tx,
        decisions: decisions_rx,
        commands: command_rx,
        snapshot: snapshot_tx,
        idle_timeout: settings.idle_timeout,
    };

    Ok(PreparedSession {
        handle: SessionHandle {
            session_id,
            commands: command_tx,
            snapshot: snapshot_rx,
        },
        actor,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProjectionMode;
    use crate::testing::{Tally, TallyConfig, add, seats};
    use boardroom_protocol::{EventKind, SessionStatus};

    fn settings() -> SessionSettings {
        SessionSettings {
            threshold: 3,
            projection: ProjectionMode::Production,
            idle_timeout: Duration::from_secs(60),
            command_buffer: 8,
            gateway: AgentGateway::default(),
        }
    }

    fn spawn(players: u32) -> (SessionHandle, JoinHandle<()>) {
        prepare_session(SessionSeed {
            engine: Arc::new(Tally::default()),
            session_id: SessionId::new(),
            game_type: "tally".into(),
            origin: "test".into(),
            participants: seats(players),
            config: TallyConfig::default(),
            agents: HashMap::new(),
            settings: settings(),
        })
        .unwrap()
        .spawn()
    }

    #[tokio::test]
    async fn test_submit_updates_snapshot_before_reply() {
        let (handle, _task) = spawn(2);
        let event = handle.submit(ParticipantId(0), add(2), None).await.unwrap();

        assert_eq!(event.version, 1);
        assert_eq!(event.view.participant, ParticipantId(0));
        let info = handle.info();
        assert_eq!(info.version, 1);
        assert_eq!(info.current_actor, Some(ParticipantId(1)));
        assert_eq!(info.history_len, 1);
    }

    #[tokio::test]
    async fn test_subscribe_sends_snapshot_then_events() {
        let (handle, _task) = spawn(2);
        let mut sub = handle.subscribe(ParticipantId(1)).await.unwrap();

        let Some(SessionFeed::Snapshot(snapshot)) = sub.recv().await else {
            panic!("first item must be a snapshot");
        };
        assert_eq!(snapshot.version, 0);

        handle.submit(ParticipantId(0), add(1), None).await.unwrap();
        let Some(SessionFeed::Event(event)) = sub.recv().await else {
            panic!("expected an event");
        };
        assert_eq!(event.version, 1);
        assert_eq!(event.view.participant, ParticipantId(1));
        assert!(matches!(event.kind, EventKind::ActionApplied { .. }));
    }

    #[tokio::test]
    async fn test_subscribe_unknown_participant_is_rejected() {
        let (handle, _task) = spawn(2);
        let err = handle.subscribe(ParticipantId(3)).await.unwrap_err();
        assert_eq!(
            err,
            Rejection::NotParticipant {
                participant: ParticipantId(3)
            }
        );
    }

    #[tokio::test]
    async fn test_dropping_subscription_unsubscribes() {
        let (handle, _task) = spawn(2);
        let sub = handle.subscribe(ParticipantId(0)).await.unwrap();
        assert_eq!(handle.info().subscribers, 1);

        drop(sub);
        let info = handle.wait_for(|info| info.subscribers == 0).await.unwrap();
        assert_eq!(info.subscribers, 0);
    }

    #[tokio::test]
    async fn test_closed_feed_is_not_counted() {
        let (handle, _task) = spawn(2);
        let mut sub = handle.subscribe(ParticipantId(0)).await.unwrap();
        assert_eq!(handle.info().subscribers, 1);

        // Receiver gone without an unsubscribe reaching the actor.
        sub.feed.close();
        let refused = handle.submit(ParticipantId(1), add(1), None).await;
        assert!(matches!(refused, Err(Rejection::TurnMismatch { .. })));

        assert_eq!(handle.info().subscribers, 0);
    }

    #[tokio::test]
    async fn test_subscribe_after_end_is_refused() {
        let (handle, _task) = spawn(2);
        for seat in [0, 1, 0, 1] {
            handle.submit(ParticipantId(seat), add(3), None).await.unwrap();
        }
        assert!(handle.info().status.is_terminal());

        let err = handle.subscribe(ParticipantId(1)).await.unwrap_err();
        assert_eq!(
            err,
            Rejection::SessionTerminal {
                reason: EndReason::Completed
            }
        );
        assert_eq!(handle.info().subscribers, 0);
    }

    #[tokio::test]
    async fn test_shutdown_ends_and_stops_actor() {
        let (handle, task) = spawn(2);
        let mut sub = handle.subscribe(ParticipantId(0)).await.unwrap();
        let _ = sub.recv().await;

        handle.shutdown().await.unwrap();
        task.await.unwrap();

        let Some(SessionFeed::Event(event)) = sub.recv().await else {
            panic!("expected the end event");
        };
        assert_eq!(
            event.kind,
            EventKind::SessionEnded {
                reason: EndReason::Shutdown
            }
        );
        assert!(handle.is_closed());
        assert_eq!(
            handle.info().status,
            SessionStatus::Terminal {
                reason: EndReason::Shutdown
            }
        );
        assert!(matches!(
            handle.submit(ParticipantId(0), add(1), None).await,
            Err(Rejection::Unavailable { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_session_times_out() {
        let (handle, task) = spawn(2);
        task.await.unwrap();
        assert_eq!(
            handle.info().status.end_reason(),
            Some(&EndReason::IdleTimeout)
        );
    }
}
