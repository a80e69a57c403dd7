use grove_store::StoreError;
use grove_sync::SyncError;
use grove_wire::WireError;
use thiserror::Error;

/// Errors that terminate a server connection or the accept loop.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Protocol violation on the channel; fatal, no response is written.
    #[error(transparent)]
    Wire(#[from] WireError),

    /// Store failure on an operation with no structured failure path.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Sync failure on an operation with no structured failure path.
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// A request arrived on a channel already streaming a watch.
    #[error("request received on a streaming watch channel")]
    RequestDuringWatch,

    /// I/O error from the listener or a connection.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for server operations.
pub type ServerResult<T> = Result<T, ServerError>;
