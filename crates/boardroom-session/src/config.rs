//! Registry configuration and the per-session settings derived from it.

use std::time::Duration;

use boardroom_admission::AdmissionConfig;
use boardroom_agent::AgentGateway;
use serde::{Deserialize, Serialize};

use crate::ProjectionMode;

// ---------------------------------------------------------------------------
// RegistryConfig
// ---------------------------------------------------------------------------

/// Configuration for a [`SessionRegistry`](crate::SessionRegistry).
///
/// Every field has a default, so a config file only needs to name what
/// it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Consecutive invalid attempts before a participant is eliminated.
    /// A game can override it through its elimination rules.
    pub elimination_threshold: u32,

    /// Deadline for each agent decision, in seconds.
    pub agent_timeout_secs: u64,

    /// A session with no commands or agent activity for this long is
    /// ended and stopped.
    pub idle_timeout_secs: u64,

    /// Capacity of each session's command queue.
    pub command_buffer: usize,

    /// Whether debug-only view fields are stripped.
    pub projection: ProjectionMode,

    /// Session creation limits per origin.
    pub admission: AdmissionConfig,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            elimination_threshold: 3,
            agent_timeout_secs: 30,
            idle_timeout_secs: 30 * 60,
            command_buffer: 64,
            projection: ProjectionMode::Production,
            admission: AdmissionConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// SessionSettings
// ---------------------------------------------------------------------------

/// What a single session actor needs from the registry config.
#[derive(Debug, Clone)]
pub(crate) struct SessionSettings {
    pub(crate) threshold: u32,
    pub(crate) projection: ProjectionMode,
    pub(crate) idle_timeout: Duration,
    pub(crate) command_buffer: usize,
    pub(crate) gateway: AgentGateway,
}

impl From<&RegistryConfig> for SessionSettings {
    fn from(config: &RegistryConfig) -> Self {
        Self {
            threshold: config.elimination_threshold,
            projection: config.projection,
            idle_timeout: Duration::from_secs(config.idle_timeout_secs),
            command_buffer: config.command_buffer.max(1),
            gateway: AgentGateway::new(Duration::from_secs(
                config.agent_timeout_secs,
            )),
        }
    }
}
