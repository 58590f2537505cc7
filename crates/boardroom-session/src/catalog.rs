//! The catalog of games a registry can start sessions for.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use boardroom_agent::Agent;
use boardroom_protocol::{GameMeta, Participant, ParticipantId, SessionId};
use serde_json::Value;
use tokio::task::JoinHandle;

use crate::config::SessionSettings;
use crate::session::{PreparedSession, SessionSeed, prepare_session};
use crate::{RuleEngine, SessionError, SessionHandle};

/// A request to start one session of a catalog game.
pub(crate) struct Launch {
    pub(crate) session_id: SessionId,
    pub(crate) origin: String,
    pub(crate) participants: Vec<Participant>,
    pub(crate) config: Value,
    pub(crate) agents: HashMap<ParticipantId, Arc<dyn Agent>>,
    pub(crate) settings: SessionSettings,
}

/// A registered game with its engine type erased.
pub(crate) trait GameEntry: Send + Sync {
    fn meta(&self) -> &GameMeta;

    /// Decodes the config and runs the engine's `init`. Nothing is
    /// spawned until [`ReadySession::start`].
    fn prepare(&self, launch: Launch) -> Result<Box<dyn ReadySession>, SessionError>;
}

/// An initialized session waiting to be started.
pub(crate) trait ReadySession: Send {
    fn start(self: Box<Self>) -> (SessionHandle, JoinHandle<()>);
}

impl<G: RuleEngine> ReadySession for PreparedSession<G> {
    fn start(self: Box<Self>) -> (SessionHandle, JoinHandle<()>) {
        self.spawn()
    }
}

struct Registered<G: RuleEngine> {
    engine: Arc<G>,
    meta: GameMeta,
}

impl<G: RuleEngine> GameEntry for Registered<G> {
    fn meta(&self) -> &GameMeta {
        &self.meta
    }

    fn prepare(&self, launch: Launch) -> Result<Box<dyn ReadySession>, SessionError> {
        let config: G::Config = if launch.config.is_null() {
            G::Config::default()
        } else {
            serde_json::from_value(launch.config)
                .map_err(|e| SessionError::InvalidConfig(e.to_string()))?
        };

        let seed = SessionSeed {
            engine: Arc::clone(&self.engine),
            session_id: launch.session_id,
            game_type: self.meta.game_type.clone(),
            origin: launch.origin,
            participants: launch.participants,
            config,
            agents: launch.agents,
            settings: launch.settings,
        };
        Ok(Box::new(prepare_session(seed)?))
    }
}

/// Game types by tag.
#[derive(Clone, Default)]
pub struct GameCatalog {
    games: BTreeMap<String, Arc<dyn GameEntry>>,
}

impl GameCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `engine` under its `meta().game_type`, replacing any
    /// game with the same tag.
    pub fn register<G: RuleEngine>(&mut self, engine: G) -> &mut Self {
        let meta = engine.meta();
        tracing::debug!(game_type = %meta.game_type, "game registered");
        self.games.insert(
            meta.game_type.clone(),
            Arc::new(Registered {
                engine: Arc::new(engine),
                meta,
            }),
        );
        self
    }

    /// Builder-style [`register`](Self::register).
    pub fn with<G: RuleEngine>(mut self, engine: G) -> Self {
        self.register(engine);
        self
    }

    /// Metadata for every registered game, sorted by tag.
    pub fn games(&self) -> Vec<GameMeta> {
        self.games.values().map(|entry| entry.meta().clone()).collect()
    }

    pub fn meta(&self, game_type: &str) -> Option<&GameMeta> {
        self.games.get(game_type).map(|entry| entry.meta())
    }

    pub fn len(&self) -> usize {
        self.games.len()
    }

    pub fn is_empty(&self) -> bool {
        self.games.is_empty()
    }

    pub(crate) fn entry(&self, game_type: &str) -> Option<Arc<dyn GameEntry>> {
        self.games.get(game_type).cloned()
    }
}

impl std::fmt::Debug for GameCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameCatalog")
            .field("games", &self.games.keys().collect::<Vec<_>>())
            .finish()
    }
}
