//! Admission configuration.

use serde::{Deserialize, Serialize};

/// How many session creations an origin gets per window.
///
/// The window is fixed: it opens with an origin's first creation and
/// the full quota comes back once it has elapsed.
///
/// ```
/// use boardroom_admission::AdmissionConfig;
///
/// let config = AdmissionConfig { max_per_window: 3, ..Default::default() };
/// assert_eq!(config.window_secs, 3600);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdmissionConfig {
    /// Creations allowed per origin per window. 0 refuses everything.
    pub max_per_window: u32,

    /// Window length in seconds.
    ///
    /// Default: one hour.
    pub window_secs: u64,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            max_per_window: 10,
            window_secs: 3600,
        }
    }
}
