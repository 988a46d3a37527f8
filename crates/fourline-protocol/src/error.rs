//! Error types for the protocol layer.

/// Errors that can occur while encoding or decoding wire payloads.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed.
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// The bytes were malformed, truncated, or the wrong shape.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The payload parsed but violates a protocol rule, such as a join
    /// under a reserved username.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
