use grove_merge::MergeError;
use grove_store::StoreError;
use grove_sync::SyncError;
use grove_types::TagName;
use thiserror::Error;

/// Errors from database-level operations.
#[derive(Debug, Error)]
pub enum DbError {
    /// The branch has no head yet.
    #[error("branch {0} has no head")]
    EmptyBranch(TagName),

    /// The branch has several heads; merge them before snapshotting.
    #[error("branch {0} has multiple heads")]
    AmbiguousHead(TagName),

    /// Merge failure, including resolver conflicts.
    #[error(transparent)]
    Merge(#[from] MergeError),

    /// Underlying store failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Watch stream failure.
    #[error(transparent)]
    Sync(#[from] SyncError),
}

/// Result alias for database operations.
pub type DbResult<T> = Result<T, DbError>;
