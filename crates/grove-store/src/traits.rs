use std::collections::BTreeSet;

use grove_types::{Key, TagBundle, TagName, Value};

use crate::error::StoreResult;

/// Predecessor-graph store: each key maps to the set of keys it descends
/// from in one step.
///
/// All implementations must satisfy these invariants:
/// - Entries are append-only; a key once added never changes its
///   predecessor set.
/// - Every predecessor of an entry is itself an entry (no dangling edges).
/// - The graph is acyclic; an insert that would close a cycle is rejected.
pub trait KeyStore: Send + Sync {
    /// Insert `key` with its predecessor set.
    ///
    /// Every predecessor must already be present
    /// (`MissingPredecessor` otherwise). Re-adding with the same
    /// predecessors is a no-op; a re-add that would close a cycle fails
    /// `CycleDetected`, any other differing re-add fails
    /// `InconsistentPredecessors`.
    fn add(&self, key: Key, preds: &BTreeSet<Key>) -> StoreResult<()>;

    /// All known keys.
    fn list(&self) -> StoreResult<BTreeSet<Key>>;

    /// The predecessor set of `key`, or the empty set if `key` is absent.
    ///
    /// Absence maps to the empty set rather than an error so that sync
    /// traversals degrade gracefully on partially transferred graphs.
    fn pred(&self, key: &Key) -> StoreResult<BTreeSet<Key>>;

    /// Check whether `key` is present.
    fn contains(&self, key: &Key) -> StoreResult<bool>;

    /// Insert multiple entries, predecessors-first order expected.
    ///
    /// Must be all-or-nothing: if any entry is rejected, none are applied.
    /// The default implementation validates by dry-running `add` semantics
    /// sequentially and is only atomic for backends whose `add` cannot
    /// fail after validation; backends should override with a single
    /// critical section.
    fn add_batch(&self, entries: &[(Key, BTreeSet<Key>)]) -> StoreResult<()> {
        for (key, preds) in entries {
            self.add(*key, preds)?;
        }
        Ok(())
    }
}

/// Content-addressed value store.
///
/// Values are immutable once written; the same bytes always produce the
/// same key, making writes idempotent and concurrent reads always safe.
pub trait ValueStore: Send + Sync {
    /// Store `value`, returning its content-derived key.
    ///
    /// Writing an already-stored value is a no-op returning the existing
    /// key.
    fn write(&self, value: Value) -> StoreResult<Key>;

    /// Read the value addressed by `key`.
    ///
    /// Returns `Ok(None)` if the value was never stored.
    fn read(&self, key: &Key) -> StoreResult<Option<Value>>;

    /// Check whether a value is stored under `key`.
    fn contains(&self, key: &Key) -> StoreResult<bool>;
}

/// Named-pointer store mapping tags to sets of branch-head keys.
pub trait TagStore: Send + Sync {
    /// Atomically set the value of `tag` to `keys`.
    ///
    /// Every key must be present in the key store
    /// (`DanglingReference` otherwise).
    fn update(&self, tag: &TagName, keys: &BTreeSet<Key>) -> StoreResult<()>;

    /// Delete `tag`. Returns `Ok(true)` if it existed, `Ok(false)` if not.
    fn remove(&self, tag: &TagName) -> StoreResult<bool>;

    /// The keys bound to `tag`, or the empty set if absent.
    fn read(&self, tag: &TagName) -> StoreResult<BTreeSet<Key>>;

    /// All defined tags.
    fn list(&self) -> StoreResult<BTreeSet<TagName>>;

    /// Apply every update in `bundle` in a single critical section.
    ///
    /// Must be all-or-nothing; the default implementation is sequential
    /// and should be overridden by backends that can hold one lock across
    /// the bundle.
    fn update_batch(&self, bundle: &TagBundle) -> StoreResult<()> {
        for (tag, keys) in bundle {
            self.update(tag, keys)?;
        }
        Ok(())
    }
}
