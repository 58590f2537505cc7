//! Session registry: creates, tracks, and routes requests to sessions.

use std::collections::HashMap;
use std::sync::Arc;

use boardroom_admission::AdmissionController;
use boardroom_agent::{Agent, AgentDirectory};
use boardroom_protocol::{
    Action, ActionSpec, Event, GameMeta, HistoryEntry, Participant, ParticipantId,
    Rejection, SeatKind, SeatSpec, SessionId, SessionInfo, ViewPayload,
};
use chrono::Utc;
use serde_json::Value;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use crate::catalog::Launch;
use crate::config::SessionSettings;
use crate::{GameCatalog, RegistryConfig, SessionError, SessionHandle, Subscription};

/// Parameters for [`SessionRegistry::create`].
#[derive(Debug, Clone, PartialEq)]
pub struct CreateSession {
    pub game_type: String,
    pub seats: Vec<SeatSpec>,
    /// Game-specific config; `null` uses the game's default.
    pub config: Value,
    /// Who is asking, for admission control. Usually the peer IP.
    pub origin: String,
}

impl CreateSession {
    pub fn new(game_type: impl Into<String>, seats: Vec<SeatSpec>) -> Self {
        Self {
            game_type: game_type.into(),
            seats,
            config: Value::Null,
            origin: "local".into(),
        }
    }

    pub fn with_config(mut self, config: Value) -> Self {
        self.config = config;
        self
    }

    pub fn from_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }
}

/// Metadata plus, when asked for, one participant's view.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionDetails {
    pub info: SessionInfo,
    pub view: Option<ViewPayload>,
}

struct SessionEntry {
    handle: SessionHandle,
    task: JoinHandle<()>,
}

/// Owns every live session.
///
/// The registry itself only holds handles; all per-session state lives
/// in the session actors. The map lock is held just long enough to clone
/// a handle, never across a call into a session.
pub struct SessionRegistry {
    catalog: GameCatalog,
    agents: AgentDirectory,
    admission: AdmissionController,
    config: RegistryConfig,
    sessions: RwLock<HashMap<SessionId, SessionEntry>>,
}

impl SessionRegistry {
    pub fn new(catalog: GameCatalog, agents: AgentDirectory, config: RegistryConfig) -> Self {
        Self {
            catalog,
            agents,
            admission: AdmissionController::new(config.admission.clone()),
            config,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn admission(&self) -> &AdmissionController {
        &self.admission
    }

    /// Every game sessions can be created for.
    pub fn games(&self) -> Vec<GameMeta> {
        self.catalog.games()
    }

    /// Creates a session and starts its actor.
    ///
    /// The request is checked (game, seat count, agent profiles, game
    /// config, the engine's `init`) before it is counted against the
    /// origin's quota, so a malformed request does not use up a slot.
    ///
    /// # Errors
    /// [`SessionError::Admission`] when the origin is over its quota,
    /// or a request error when the game, seats, or config are invalid.
    pub async fn create(&self, request: CreateSession) -> Result<SessionId, SessionError> {
        let entry = self
            .catalog
            .entry(&request.game_type)
            .ok_or_else(|| SessionError::UnknownGame(request.game_type.clone()))?;
        let (participants, agents) = self.seat(entry.meta(), &request.seats)?;

        let session_id = SessionId::new();
        let ready = entry.prepare(Launch {
            session_id,
            origin: request.origin.clone(),
            participants,
            config: request.config,
            agents,
            settings: SessionSettings::from(&self.config),
        })?;

        let admission = self.admission.admit(&request.origin)?;

        let (handle, task) = ready.start();
        self.sessions
            .write()
            .await
            .insert(session_id, SessionEntry { handle, task });

        tracing::info!(
            %session_id,
            game_type = %request.game_type,
            origin = %request.origin,
            remaining = admission.remaining,
            "session created"
        );
        Ok(session_id)
    }

    /// A handle to a live session.
    pub async fn handle(&self, session_id: SessionId) -> Result<SessionHandle, SessionError> {
        self.sessions
            .read()
            .await
            .get(&session_id)
            .map(|entry| entry.handle.clone())
            .ok_or(SessionError::NotFound(session_id))
    }

    /// Metadata, plus `participant`'s view if given. Never waits on the
    /// session's actor.
    pub async fn get(
        &self,
        session_id: SessionId,
        participant: Option<ParticipantId>,
    ) -> Result<SessionDetails, SessionError> {
        let handle = self.handle(session_id).await?;
        let view = participant.map(|p| handle.view(p)).transpose()?;
        Ok(SessionDetails {
            info: handle.info(),
            view,
        })
    }

    pub async fn submit(
        &self,
        session_id: SessionId,
        participant: ParticipantId,
        action: Action,
        expected_version: Option<u64>,
    ) -> Result<Event, Rejection> {
        self.live(session_id)
            .await?
            .submit(participant, action, expected_version)
            .await
    }

    pub async fn subscribe(
        &self,
        session_id: SessionId,
        participant: ParticipantId,
    ) -> Result<Subscription, Rejection> {
        self.live(session_id).await?.subscribe(participant).await
    }

    pub async fn valid_actions(
        &self,
        session_id: SessionId,
        participant: ParticipantId,
    ) -> Result<Vec<ActionSpec>, Rejection> {
        self.live(session_id).await?.valid_actions(participant)
    }

    pub async fn history(&self, session_id: SessionId) -> Result<Vec<HistoryEntry>, Rejection> {
        self.live(session_id).await?.history().await
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    pub async fn session_ids(&self) -> Vec<SessionId> {
        self.sessions.read().await.keys().copied().collect()
    }

    /// Removes sessions whose actor has stopped and ended sessions that
    /// nobody is watching. Also forgets expired admission windows.
    pub async fn reap(&self) -> Vec<SessionId> {
        let reaped: Vec<(SessionId, SessionEntry)> = {
            let mut sessions = self.sessions.write().await;
            let ids: Vec<SessionId> = sessions
                .iter()
                .filter(|(_, entry)| {
                    if entry.handle.is_closed() {
                        return true;
                    }
                    let info = entry.handle.info();
                    info.status.is_terminal() && info.subscribers == 0
                })
                .map(|(id, _)| *id)
                .collect();
            ids.into_iter()
                .filter_map(|id| sessions.remove(&id).map(|entry| (id, entry)))
                .collect()
        };

        let mut ids = Vec::with_capacity(reaped.len());
        for (session_id, entry) in reaped {
            let _ = entry.handle.shutdown().await;
            tracing::info!(%session_id, "session reaped");
            ids.push(session_id);
        }

        let pruned = self.admission.prune(Utc::now());
        if pruned > 0 {
            tracing::debug!(pruned, "expired admission windows dropped");
        }
        ids
    }

    /// Ends every session with `Shutdown` and waits for each actor to
    /// finish broadcasting.
    pub async fn shutdown(&self) {
        let entries: Vec<(SessionId, SessionEntry)> =
            self.sessions.write().await.drain().collect();
        tracing::info!(sessions = entries.len(), "draining sessions");

        for (session_id, entry) in entries {
            if entry.handle.shutdown().await.is_err() {
                tracing::debug!(%session_id, "session already stopped");
            }
            if let Err(e) = entry.task.await {
                tracing::warn!(%session_id, error = %e, "session task failed");
            }
        }
    }

    async fn live(&self, session_id: SessionId) -> Result<SessionHandle, Rejection> {
        self.handle(session_id)
            .await
            .map_err(|_| Rejection::SessionNotFound { session_id })
    }

    /// Builds the participant list, filling gaps from the game's default
    /// seats, and resolves agent profiles.
    #[allow(clippy::type_complexity)]
    fn seat(
        &self,
        meta: &GameMeta,
        seats: &[SeatSpec],
    ) -> Result<(Vec<Participant>, HashMap<ParticipantId, Arc<dyn Agent>>), SessionError> {
        if !meta.accepts_players(seats.len()) {
            return Err(SessionError::InvalidSeats(format!(
                "{} takes {} to {} players, got {}",
                meta.game_type,
                meta.min_players,
                meta.max_players,
                seats.len()
            )));
        }

        let mut participants = Vec::with_capacity(seats.len());
        let mut agents = HashMap::new();
        for (index, spec) in seats.iter().enumerate() {
            let id = ParticipantId(
                u32::try_from(index)
                    .map_err(|_| SessionError::InvalidSeats("too many seats".into()))?,
            );
            let fallback = meta.default_seats.get(index);
            let name = spec
                .name
                .clone()
                .or_else(|| fallback.and_then(|s| s.name.clone()))
                .unwrap_or_else(|| format!("Player {}", index + 1));
            let role = spec
                .role
                .clone()
                .or_else(|| fallback.and_then(|s| s.role.clone()));
            let team = spec
                .team
                .clone()
                .or_else(|| fallback.and_then(|s| s.team.clone()));

            if let SeatKind::Agent { profile } = &spec.kind {
                let agent = self
                    .agents
                    .get(profile)
                    .ok_or_else(|| SessionError::UnknownAgent(profile.clone()))?;
                agents.insert(id, agent);
            }

            participants.push(Participant {
                id,
                name,
                role,
                team,
                kind: spec.kind.clone(),
                consecutive_invalid: 0,
                eliminated: false,
            });
        }
        Ok((participants, agents))
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("catalog", &self.catalog)
            .field("agents", &self.agents)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
