use grove_types::{Key, TagName};

/// Errors from store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested key was not found.
    #[error("key not found: {0}")]
    NotFound(Key),

    /// A predecessor referenced on insert is not present in the key store.
    #[error("missing predecessor: key {key} references absent {missing}")]
    MissingPredecessor { key: Key, missing: Key },

    /// Re-adding a key with a predecessor set that differs from the stored one.
    #[error("inconsistent predecessors for key {0}")]
    InconsistentPredecessors(Key),

    /// The insert would introduce a cycle in the predecessor DAG.
    #[error("cycle detected involving key {0}")]
    CycleDetected(Key),

    /// A tag update references a key absent from the key store.
    #[error("dangling reference: tag {tag} references absent key {key}")]
    DanglingReference { tag: TagName, key: Key },

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
