use grove_store::StoreError;
use grove_types::Key;
use thiserror::Error;

/// A resolver could not reconcile two values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("merge conflict at {path:?}: {reason}")]
pub struct Conflict {
    /// The path the resolver was dispatched on.
    pub path: String,
    /// Resolver-supplied description of the disagreement.
    pub reason: String,
}

impl Conflict {
    pub fn new(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Errors raised by merge operations.
#[derive(Debug, Error)]
pub enum MergeError {
    /// The resolver reported an unreconcilable difference.
    #[error(transparent)]
    Conflict(#[from] Conflict),

    /// No resolver is registered for the path.
    #[error("no resolver registered for path {0:?}")]
    NoResolver(String),

    /// A head has no stored value to merge.
    #[error("no value stored for key {0}")]
    MissingValue(Key),

    /// A head is absent from the key store.
    #[error("unknown head: {0}")]
    UnknownHead(Key),

    /// Underlying store failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result alias for merge operations.
pub type MergeResult<T> = Result<T, MergeError>;
