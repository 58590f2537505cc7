//! Error types for the protocol layer.
//!
//! A `ProtocolError` always means the bytes on the wire were the
//! problem: they could not be produced, parsed, or made sense of.
//! Problems with what a request *asks for* are [`crate::Rejection`]s.

/// Errors that can occur while encoding or decoding wire messages.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into a Rust type).
    ///
    /// Common causes: malformed JSON, missing required fields, or an
    /// unknown `type` tag.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The message decoded but breaks a protocol rule, e.g. a `hello`
    /// with the wrong version or a request sent before `hello`.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
