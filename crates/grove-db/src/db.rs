use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, info};

use grove_merge::MergeEngine;
use grove_store::{KeyStore, MemoryStore, TagStore, ValueStore};
use grove_sync::{SyncError, TagChange, WatchHub};
use grove_types::{Key, TagName, Value};

use crate::error::{DbError, DbResult};

/// A database handle bound to one branch.
///
/// Handles are cheap to clone via [`fork`] and all share the same store
/// and watch hub; the branch tag is the only per-handle state.
///
/// [`fork`]: Database::fork
pub struct Database {
    store: Arc<MemoryStore>,
    hub: Arc<WatchHub>,
    engine: MergeEngine,
    branch: TagName,
}

impl Database {
    /// Open a fresh in-memory database on `branch`.
    pub fn open(branch: TagName, engine: MergeEngine) -> Self {
        Self {
            store: Arc::new(MemoryStore::new()),
            hub: Arc::new(WatchHub::new(grove_sync::watch::DEFAULT_WATCH_BUFFER)),
            engine,
            branch,
        }
    }

    /// Bind a handle over existing parts (embedding, servers).
    pub fn with_parts(
        store: Arc<MemoryStore>,
        hub: Arc<WatchHub>,
        engine: MergeEngine,
        branch: TagName,
    ) -> Self {
        Self {
            store,
            hub,
            engine,
            branch,
        }
    }

    /// The bound branch tag.
    pub fn branch(&self) -> &TagName {
        &self.branch
    }

    /// The shared store.
    pub fn store(&self) -> Arc<MemoryStore> {
        Arc::clone(&self.store)
    }

    /// A handle on `branch` sharing this database's store and hub. The
    /// new branch starts at this branch's current head.
    pub fn fork(&self, branch: TagName) -> DbResult<Database> {
        let head = TagStore::read(&*self.store, &self.branch)?;
        if !head.is_empty() {
            self.store.update(&branch, &head)?;
            self.hub.publish([branch.clone()].into());
        }
        debug!(from = %self.branch, to = %branch, "forked branch");
        Ok(Database {
            store: Arc::clone(&self.store),
            hub: Arc::clone(&self.hub),
            engine: self.engine.clone(),
            branch,
        })
    }

    // ---- History ----

    /// Write `value` as a new commit on the branch.
    ///
    /// The current heads become the commit's predecessors and the branch
    /// advances to the new key.
    pub fn commit(&self, value: Value) -> DbResult<Key> {
        let parents = TagStore::read(&*self.store, &self.branch)?;
        let key = self.store.write(value)?;
        self.store.add(key, &parents)?;
        self.store.update(&self.branch, &[key].into())?;
        self.hub.publish([self.branch.clone()].into());
        info!(branch = %self.branch, key = %key.short_hex(), "committed");
        Ok(key)
    }

    /// The branch's current head set.
    pub fn head(&self) -> DbResult<BTreeSet<Key>> {
        Ok(TagStore::read(&*self.store, &self.branch)?)
    }

    /// The branch's single current head.
    ///
    /// A snapshot is just this key: immutable, and sufficient to revert
    /// to later.
    pub fn snapshot(&self) -> DbResult<Key> {
        let heads = self.head()?;
        let mut iter = heads.into_iter();
        match (iter.next(), iter.next()) {
            (Some(head), None) => Ok(head),
            (None, _) => Err(DbError::EmptyBranch(self.branch.clone())),
            (Some(_), Some(_)) => Err(DbError::AmbiguousHead(self.branch.clone())),
        }
    }

    /// Rebind the branch to an earlier snapshot key.
    pub fn revert(&self, snapshot: Key) -> DbResult<()> {
        self.store.update(&self.branch, &[snapshot].into())?;
        self.hub.publish([self.branch.clone()].into());
        info!(branch = %self.branch, key = %snapshot.short_hex(), "reverted");
        Ok(())
    }

    /// Read the value at a key.
    pub fn get(&self, key: &Key) -> DbResult<Option<Value>> {
        Ok(ValueStore::read(&*self.store, key)?)
    }

    /// The value at the branch head.
    pub fn get_head(&self) -> DbResult<Value> {
        let head = self.snapshot()?;
        self.get(&head)?
            .ok_or_else(|| DbError::Store(grove_store::StoreError::NotFound(head)))
    }

    // ---- Merge ----

    /// Three-way merge of `other`'s head into this branch.
    ///
    /// The branch name is the resolver dispatch path. On success the
    /// branch advances to the merged key; a conflict leaves the branch
    /// untouched and propagates as [`DbError::Merge`].
    pub fn merge(&self, other: &TagName) -> DbResult<Key> {
        let theirs = single_head(&self.store, other)?;
        let merged = match self.head()?.into_iter().next() {
            // An unborn branch just adopts the other head.
            None => theirs,
            Some(ours) => self
                .engine
                .merge(&*self.store, ours, theirs, self.branch.as_str())?,
        };
        self.store.update(&self.branch, &[merged].into())?;
        self.hub.publish([self.branch.clone()].into());
        info!(branch = %self.branch, other = %other, merged = %merged.short_hex(), "merged");
        Ok(merged)
    }

    // ---- Watch ----

    /// Stream `(branch, new head)` pairs for every change to a branch
    /// whose name extends `prefix`. Dropping the stream cancels it.
    pub fn watch(&self, prefix: impl Into<String>) -> PathEvents {
        PathEvents {
            rx: self.hub.changes(),
            store: Arc::clone(&self.store),
            prefix: prefix.into(),
            pending: VecDeque::new(),
        }
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("branch", &self.branch)
            .finish()
    }
}

/// The single head of `tag`, with empty/multi-head errors.
fn single_head(store: &MemoryStore, tag: &TagName) -> DbResult<Key> {
    let heads = TagStore::read(store, tag)?;
    let mut iter = heads.into_iter();
    match (iter.next(), iter.next()) {
        (Some(head), None) => Ok(head),
        (None, _) => Err(DbError::EmptyBranch(tag.clone())),
        (Some(_), Some(_)) => Err(DbError::AmbiguousHead(tag.clone())),
    }
}

/// A lazy stream of per-path head changes.
pub struct PathEvents {
    rx: broadcast::Receiver<TagChange>,
    store: Arc<MemoryStore>,
    prefix: String,
    pending: VecDeque<(TagName, Key)>,
}

impl PathEvents {
    /// Await the next `(branch, head)` change under the prefix.
    ///
    /// Returns `Ok(None)` when the hub is gone; a consumer that fell
    /// behind the buffer gets [`SyncError::Lagged`] and should drop the
    /// stream.
    pub async fn next(&mut self) -> DbResult<Option<(TagName, Key)>> {
        loop {
            if let Some(item) = self.pending.pop_front() {
                return Ok(Some(item));
            }
            let change = match self.rx.recv().await {
                Ok(change) => change,
                Err(broadcast::error::RecvError::Closed) => return Ok(None),
                Err(broadcast::error::RecvError::Lagged(_)) => {
                    return Err(DbError::Sync(SyncError::Lagged))
                }
            };
            for tag in change.tags {
                if !tag.starts_with(&self.prefix) {
                    continue;
                }
                for head in TagStore::read(&*self.store, &tag)? {
                    self.pending.push_back((tag.clone(), head));
                }
            }
        }
    }
}

impl std::fmt::Debug for PathEvents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathEvents")
            .field("prefix", &self.prefix)
            .finish()
    }
}
