//! `BoardroomServer` builder and server loop.
//!
//! This is the entry point for running a Boardroom server. It ties
//! together all the layers: transport → protocol → session registry.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use boardroom_agent::{Agent, AgentDirectory};
use boardroom_protocol::{Codec, JsonCodec};
use boardroom_session::{GameCatalog, RuleEngine, SessionRegistry};
use boardroom_transport::{Transport, WebSocketTransport};
use tokio::task::JoinHandle;

use crate::handler::handle_connection;
use crate::{BoardroomError, ServerConfig};

/// Shared server state passed to each connection handler task.
///
/// The registry does its own locking, so no outer `Mutex` is needed.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) registry: SessionRegistry,
    pub(crate) codec: C,
    pub(crate) config: ServerConfig,
}

/// Builder for configuring and starting a Boardroom server.
///
/// # Example
///
/// ```rust,ignore
/// use boardroom::prelude::*;
///
/// let server = BoardroomServer::builder()
///     .bind("0.0.0.0:8080")
///     .game(TicTacToe)
///     .build()
///     .await?;
/// server.run().await
/// ```
pub struct BoardroomServerBuilder {
    config: ServerConfig,
    catalog: GameCatalog,
    agents: AgentDirectory,
}

impl BoardroomServerBuilder {
    /// Creates a builder with default settings and the built-in agents.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            catalog: GameCatalog::new(),
            agents: AgentDirectory::with_builtin(),
        }
    }

    /// Replaces the whole configuration. Call before [`bind`](Self::bind)
    /// if both are used.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind = addr.to_string();
        self
    }

    /// Makes a game available to `create_session`.
    pub fn game<G: RuleEngine>(mut self, engine: G) -> Self {
        self.catalog.register(engine);
        self
    }

    /// Registers an agent under `profile`, replacing a built-in one of
    /// the same name.
    pub fn agent(mut self, profile: &str, agent: impl Agent) -> Self {
        self.agents.register(profile, agent);
        self
    }

    /// Binds the listener and builds the server.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`.
    pub async fn build(self) -> Result<BoardroomServer<JsonCodec>, BoardroomError> {
        let transport = WebSocketTransport::bind(&self.config.bind).await?;
        tracing::info!(
            games = self.catalog.len(),
            agents = ?self.agents.profiles(),
            "server configured"
        );

        let state = Arc::new(ServerState {
            registry: SessionRegistry::new(
                self.catalog,
                self.agents,
                self.config.registry.clone(),
            ),
            codec: JsonCodec,
            config: self.config,
        });

        Ok(BoardroomServer { transport, state })
    }
}

impl Default for BoardroomServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Boardroom server.
///
/// Call [`run()`](Self::run) or [`run_until()`](Self::run_until) to start
/// accepting connections.
pub struct BoardroomServer<C: Codec = JsonCodec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<C>>,
}

impl BoardroomServer<JsonCodec> {
    /// Creates a new builder.
    pub fn builder() -> BoardroomServerBuilder {
        BoardroomServerBuilder::new()
    }
}

impl<C: Codec> BoardroomServer<C> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, BoardroomError> {
        Ok(self.transport.local_addr()?)
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.state.registry
    }

    /// Runs the accept loop until the process is terminated.
    pub async fn run(self) -> Result<(), BoardroomError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the accept loop until `shutdown` completes, then ends every
    /// session with `Shutdown` and waits for them to stop.
    pub async fn run_until(
        mut self,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), BoardroomError> {
        tracing::info!(addr = ?self.transport.local_addr().ok(), "boardroom server running");

        let reaper = spawn_reaper(Arc::clone(&self.state));
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                accepted = self.transport.accept() => match accepted {
                    Ok(conn) => {
                        let state = Arc::clone(&self.state);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(conn, state).await {
                                tracing::debug!(
                                    error = %e,
                                    "connection ended with error"
                                );
                            }
                        });
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                    }
                },
                () = &mut shutdown => {
                    tracing::info!("shutdown requested");
                    break;
                }
            }
        }

        reaper.abort();
        self.state.registry.shutdown().await;
        Ok(())
    }
}

/// Periodically drops stopped sessions and ended sessions nobody watches.
fn spawn_reaper<C: Codec>(state: Arc<ServerState<C>>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(state.config.reap_interval());
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let reaped = state.registry.reap().await;
            if !reaped.is_empty() {
                tracing::debug!(count = reaped.len(), "reaper pass");
            }
        }
    })
}
