use grove_store::StoreError;
use grove_types::{Key, TagName};
use thiserror::Error;

/// Errors raised by synchronization operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A pushed graph references an endpoint that is neither shipped nor
    /// already stored.
    #[error("graph not closed: endpoint {0} is neither shipped nor stored")]
    NotClosed(Key),

    /// The pushed edges would close a cycle.
    #[error("pushed graph contains a cycle involving {0}")]
    CycleDetected(Key),

    /// A tag bundle names the same tag twice.
    #[error("duplicate tag in bundle: {0}")]
    DuplicateTag(TagName),

    /// A proposed tag binding targets a key outside the push and the store.
    #[error("tag {tag} targets key {key} outside the push")]
    UnknownTagTarget { tag: TagName, key: Key },

    /// A watch subscriber fell behind the broadcast buffer.
    #[error("watch subscriber lagged and was disconnected")]
    Lagged,

    /// Underlying store failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;
