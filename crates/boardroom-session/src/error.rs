use boardroom_admission::AdmissionError;
use boardroom_protocol::{Rejection, SessionId};

/// Errors a rule engine may report.
///
/// From `init` these abort session creation. From `apply` or
/// `remove_participant` they end the running session with an
/// `EngineFault`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleError {
    #[error("invalid game config: {0}")]
    InvalidConfig(String),

    #[error("unsupported seating: {0}")]
    Seating(String),

    #[error("rule engine fault: {0}")]
    Fault(String),
}

/// Errors from the session registry.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session {0} not found")]
    NotFound(SessionId),

    #[error("unknown game type: {0}")]
    UnknownGame(String),

    #[error("invalid seats: {0}")]
    InvalidSeats(String),

    #[error("unknown agent profile: {0}")]
    UnknownAgent(String),

    #[error("invalid session config: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Rules(#[from] RuleError),

    #[error(transparent)]
    Admission(#[from] AdmissionError),

    #[error(transparent)]
    Rejected(#[from] Rejection),
}

impl SessionError {
    /// The wire rejection for errors clients are expected to handle,
    /// `None` for plain request errors.
    pub fn rejection(&self) -> Option<Rejection> {
        match self {
            Self::NotFound(session_id) => Some(Rejection::SessionNotFound {
                session_id: *session_id,
            }),
            Self::Admission(AdmissionError::RateLimited { reset_at, .. }) => {
                Some(Rejection::RateLimited {
                    reset_at: *reset_at,
                })
            }
            Self::Rejected(rejection) => Some(rejection.clone()),
            _ => None,
        }
    }

    /// An HTTP-style status code for wire error messages.
    pub fn code(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::UnknownGame(_)
            | Self::InvalidSeats(_)
            | Self::UnknownAgent(_)
            | Self::InvalidConfig(_)
            | Self::Rules(_) => 400,
            Self::Admission(_) => 429,
            Self::Rejected(rejection) => rejection.code(),
        }
    }
}
