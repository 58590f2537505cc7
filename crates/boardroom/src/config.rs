//! Server configuration, loadable from TOML.
//!
//! ```toml
//! bind = "0.0.0.0:8080"
//! connection_idle_secs = 120
//!
//! [registry]
//! elimination_threshold = 3
//! projection = "debug"
//!
//! [registry.admission]
//! max_per_window = 20
//! window_secs = 60
//! ```

use std::path::Path;
use std::time::Duration;

use boardroom_session::RegistryConfig;
use serde::{Deserialize, Serialize};

use crate::BoardroomError;

/// Everything the server needs to start. Missing fields take their
/// defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to.
    pub bind: String,

    /// How long a new connection has to send `hello`.
    pub handshake_timeout_secs: u64,

    /// A connection that sends nothing for this long is closed.
    /// Clients keep it open with `heartbeat`.
    pub connection_idle_secs: u64,

    /// How often stopped and abandoned sessions are reaped.
    pub reap_interval_secs: u64,

    pub registry: RegistryConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
            handshake_timeout_secs: 10,
            connection_idle_secs: 60,
            reap_interval_secs: 30,
            registry: RegistryConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Parses a config from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, BoardroomError> {
        Ok(toml::from_str(text)?)
    }

    /// Reads and parses a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, BoardroomError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs.max(1))
    }

    pub fn connection_idle(&self) -> Duration {
        Duration::from_secs(self.connection_idle_secs.max(1))
    }

    pub fn reap_interval(&self) -> Duration {
        Duration::from_secs(self.reap_interval_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boardroom_session::ProjectionMode;

    #[test]
    fn test_from_toml_str_empty_is_default() {
        let config = ServerConfig::from_toml_str("").unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.bind, "127.0.0.1:8080");
    }

    #[test]
    fn test_from_toml_str_nested_registry() {
        let config = ServerConfig::from_toml_str(
            r#"
            bind = "0.0.0.0:9000"
            connection_idle_secs = 120

            [registry]
            elimination_threshold = 5
            projection = "debug"

            [registry.admission]
            max_per_window = 2
            "#,
        )
        .unwrap();

        assert_eq!(config.bind, "0.0.0.0:9000");
        assert_eq!(config.connection_idle(), Duration::from_secs(120));
        assert_eq!(config.handshake_timeout_secs, 10);
        assert_eq!(config.registry.elimination_threshold, 5);
        assert_eq!(config.registry.projection, ProjectionMode::Debug);
        assert_eq!(config.registry.admission.max_per_window, 2);
        assert_eq!(config.registry.agent_timeout_secs, 30);
    }

    #[test]
    fn test_from_toml_str_wrong_type_is_config_error() {
        let err = ServerConfig::from_toml_str("reap_interval_secs = \"often\"")
            .unwrap_err();
        assert!(matches!(err, BoardroomError::Config(_)));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = ServerConfig::load("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, BoardroomError::Io(_)));
    }

    #[test]
    fn test_zero_durations_are_clamped() {
        let config = ServerConfig {
            reap_interval_secs: 0,
            connection_idle_secs: 0,
            ..ServerConfig::default()
        };
        assert_eq!(config.reap_interval(), Duration::from_secs(1));
        assert_eq!(config.connection_idle(), Duration::from_secs(1));
    }
}
