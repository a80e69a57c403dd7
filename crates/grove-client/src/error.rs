use grove_wire::{RemoteFailure, WireError};
use thiserror::Error;

/// Errors surfaced to client callers.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Encoding, decoding, or framing failure on the channel.
    #[error(transparent)]
    Wire(#[from] WireError),

    /// The server rejected the operation with a structured failure.
    #[error("server rejected the operation: {0}")]
    Remote(RemoteFailure),

    /// The server closed the channel instead of responding. Operations
    /// without a structured failure path signal rejection this way.
    #[error("server closed the channel")]
    Disconnected,

    /// I/O error on the underlying channel.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for client operations.
pub type ClientResult<T> = Result<T, ClientError>;
