use chrono::{DateTime, Utc};

/// Errors returned by the admission controller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdmissionError {
    /// The origin has used up its quota for the current window.
    #[error("origin {origin} is rate limited until {reset_at}")]
    RateLimited {
        origin: String,
        /// When the origin's quota comes back. Always in the future
        /// relative to the rejected call.
        reset_at: DateTime<Utc>,
    },
}
