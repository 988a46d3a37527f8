//! Unified error type for the server crate.

use fourline_protocol::ProtocolError;
use fourline_session::SessionError;

/// Top-level error that wraps the layer-specific errors.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Socket-level I/O (bind, accept).
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// WebSocket handshake or framing.
    #[error(transparent)]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Wire payload encoding or decoding.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Session-layer rejection.
    #[error(transparent)]
    Session(#[from] SessionError),
}
