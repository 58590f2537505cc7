//! Unified error type for the Boardroom server.

use boardroom_protocol::ProtocolError;
use boardroom_session::SessionError;
use boardroom_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant lets `?` convert sub-crate
/// errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum BoardroomError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session registry error.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The server config file could not be parsed.
    #[error("invalid server config: {0}")]
    Config(#[from] toml::de::Error),

    /// The server config file could not be read.
    #[error("config file: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use boardroom_protocol::SessionId;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let err: BoardroomError = err.into();
        assert!(matches!(err, BoardroomError::Transport(_)));
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::InvalidMessage("bad".into());
        let err: BoardroomError = err.into();
        assert!(matches!(err, BoardroomError::Protocol(_)));
    }

    #[test]
    fn test_from_session_error() {
        let err: BoardroomError = SessionError::NotFound(SessionId::new()).into();
        assert!(matches!(err, BoardroomError::Session(_)));
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_from_toml_error() {
        let err = toml::from_str::<toml::Table>("bind = ").unwrap_err();
        let err: BoardroomError = err.into();
        assert!(err.to_string().starts_with("invalid server config"));
    }
}
