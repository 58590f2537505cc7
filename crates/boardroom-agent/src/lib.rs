//! Agent gateway for Boardroom.
//!
//! An automated seat is backed by an [`Agent`]: an opaque decision
//! function that looks at a participant's view and the legal actions and
//! answers with raw JSON. The [`AgentGateway`] is the only way the session
//! core calls an agent. It bounds every call with a deadline and turns
//! whatever came back into an [`Action`](boardroom_protocol::Action) or
//! an [`AgentFailure`], so a broken agent can never stall or crash a
//! session.
//!
//! Human seats never go through here; their actions arrive through the
//! session's public `submit` path with no deadline.

mod agent;
mod decision;
mod directory;
mod gateway;
mod random;
mod scripted;

pub use agent::{Agent, AgentError, DecisionRequest};
pub use decision::parse_decision;
pub use directory::AgentDirectory;
pub use gateway::{AgentFailure, AgentGateway};
pub use random::RandomAgent;
pub use scripted::ScriptedAgent;
