//! # Boardroom
//!
//! Turn-based session orchestration for humans and AI agents.
//!
//! A game implements [`RuleEngine`](boardroom_session::RuleEngine); the
//! server handles transport, turn order, validation, elimination of
//! participants that keep failing, per-participant views, agent
//! deadlines, and live event fan-out.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use boardroom::prelude::*;
//!
//! # async fn start() -> Result<(), BoardroomError> {
//! // Register your RuleEngine implementations, then:
//! let server = BoardroomServer::builder()
//!     .bind("0.0.0.0:8080")
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

// ---------------------------------------------------------------------------
// Module declarations
// ---------------------------------------------------------------------------

mod config;
mod error;
mod handler;
mod server;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use config::ServerConfig;
pub use error::BoardroomError;
pub use server::{BoardroomServer, BoardroomServerBuilder};

/// Installs a `tracing` subscriber that reads `RUST_LOG`, defaulting to
/// `info`. Does nothing if a subscriber is already set.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Everything a game crate usually needs.
pub mod prelude {
    pub use crate::{
        init_tracing, BoardroomError, BoardroomServer, BoardroomServerBuilder,
        ServerConfig,
    };
    pub use boardroom_admission::AdmissionConfig;
    pub use boardroom_agent::{Agent, AgentError, DecisionRequest};
    pub use boardroom_protocol::{
        Action, ActionSpec, EliminationPolicy, EndReason, GameMeta,
        Participant, ParticipantId, SeatKind, SeatSpec, SessionId,
    };
    pub use boardroom_session::{
        EliminationRules, ProjectionMode, RegistryConfig, RuleEngine,
        RuleError, ViewFields,
    };
}
