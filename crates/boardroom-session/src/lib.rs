//! Turn-based session orchestration for Boardroom.
//!
//! A session is one running game: a set of seated participants, a rule
//! engine, and an append-only history. This crate runs many sessions
//! concurrently, each in its own actor task.
//!
//! # Key types
//!
//! - [`RuleEngine`]: the trait a game implements
//! - [`TurnController`]: one session's state machine (turns, versions,
//!   elimination, termination)
//! - [`ViewProjector`]: role-scoped views; debug fields never leave a
//!   production session
//! - [`SessionHandle`] / [`Subscription`]: talk to and watch a running
//!   session actor
//! - [`SessionRegistry`]: creates, looks up, reaps, and drains sessions,
//!   with admission control on creation
//!
//! ```text
//! SessionRegistry ──create──→ GameCatalog ──spawn──→ session actor (TurnController)
//!        │                                                │
//!        └──── SessionHandle (submit / subscribe / read) ─┘
//! ```

mod catalog;
mod config;
mod controller;
mod error;
mod history;
mod logic;
mod projector;
mod registry;
mod session;
mod tracker;

#[cfg(test)]
mod testing;

pub use catalog::GameCatalog;
pub use config::RegistryConfig;
pub use controller::{EventRecord, Outcome, TurnController};
pub use error::{RuleError, SessionError};
pub use history::replay;
pub use logic::RuleEngine;
pub use projector::{ProjectionMode, ProjectionScope, ViewFields, ViewProjector};
pub use registry::{CreateSession, SessionDetails, SessionRegistry};
pub use session::{SessionFeed, SessionHandle, SubscriberId, Subscription};
pub use tracker::{EliminationRules, EliminationTracker, Strike};
