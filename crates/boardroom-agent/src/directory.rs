//! Named agent profiles.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::{Agent, RandomAgent};

/// Maps the profile names used in seat specs to agent instances.
///
/// One instance serves every seat that names its profile, across all
/// sessions, so agents must not keep per-seat state.
#[derive(Clone, Default)]
pub struct AgentDirectory {
    agents: HashMap<String, Arc<dyn Agent>>,
}

impl AgentDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// A directory with the built-in `random` profile.
    pub fn with_builtin() -> Self {
        let mut directory = Self::new();
        directory.register("random", RandomAgent);
        directory
    }

    /// Registers (or replaces) a profile.
    pub fn register(&mut self, profile: impl Into<String>, agent: impl Agent) {
        self.register_shared(profile, Arc::new(agent));
    }

    /// Registers an agent that is also held elsewhere.
    pub fn register_shared(&mut self, profile: impl Into<String>, agent: Arc<dyn Agent>) {
        let profile = profile.into();
        tracing::debug!(%profile, "agent profile registered");
        self.agents.insert(profile, agent);
    }

    pub fn get(&self, profile: &str) -> Option<Arc<dyn Agent>> {
        self.agents.get(profile).cloned()
    }

    /// Registered profile names, sorted.
    pub fn profiles(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.agents.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for AgentDirectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentDirectory")
            .field("profiles", &self.profiles())
            .finish()
    }
}
