use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::RwLock;

use tracing::debug;

use grove_types::{Key, TagBundle, TagName, Value};

use crate::error::{StoreError, StoreResult};
use crate::traits::{KeyStore, TagStore, ValueStore};

/// In-memory backend implementing all three store contracts.
///
/// All state is held behind `RwLock`s for safe concurrent access. One
/// struct carries the three maps because the tag contract's dangling
/// check and the atomic batch inserts both need the key map. Lock order
/// is keys before tags; values are independent.
pub struct MemoryStore {
    preds: RwLock<HashMap<Key, BTreeSet<Key>>>,
    values: RwLock<HashMap<Key, Value>>,
    tags: RwLock<HashMap<TagName, BTreeSet<Key>>>,
}

impl MemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            preds: RwLock::new(HashMap::new()),
            values: RwLock::new(HashMap::new()),
            tags: RwLock::new(HashMap::new()),
        }
    }

    /// Number of keys currently stored.
    pub fn key_count(&self) -> usize {
        self.preds.read().expect("lock poisoned").len()
    }

    /// Returns `true` if no keys are stored.
    pub fn is_empty(&self) -> bool {
        self.key_count() == 0
    }

    /// Total bytes across all stored values.
    pub fn total_value_bytes(&self) -> u64 {
        self.values
            .read()
            .expect("lock poisoned")
            .values()
            .map(|v| v.len() as u64)
            .sum()
    }

    /// Remove all keys, values, and tags.
    pub fn clear(&self) {
        self.preds.write().expect("lock poisoned").clear();
        self.values.write().expect("lock poisoned").clear();
        self.tags.write().expect("lock poisoned").clear();
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// All keys reachable from `seeds` through predecessor edges, seeds
/// included. `staged` overlays entries not yet committed to `map`.
fn ancestors_of(
    map: &HashMap<Key, BTreeSet<Key>>,
    staged: Option<&HashMap<Key, BTreeSet<Key>>>,
    seeds: &BTreeSet<Key>,
) -> HashSet<Key> {
    let mut visited: HashSet<Key> = seeds.iter().copied().collect();
    let mut queue: VecDeque<Key> = seeds.iter().copied().collect();

    while let Some(current) = queue.pop_front() {
        let preds = map
            .get(&current)
            .or_else(|| staged.and_then(|s| s.get(&current)));
        if let Some(preds) = preds {
            for p in preds {
                if visited.insert(*p) {
                    queue.push_back(*p);
                }
            }
        }
    }

    visited
}

/// Validate one insert against the committed map plus a staged overlay.
/// Returns `Ok(true)` when the entry should be staged, `Ok(false)` for an
/// idempotent no-op.
fn check_add(
    map: &HashMap<Key, BTreeSet<Key>>,
    staged: &HashMap<Key, BTreeSet<Key>>,
    key: Key,
    preds: &BTreeSet<Key>,
) -> StoreResult<bool> {
    let existing = map.get(&key).or_else(|| staged.get(&key));
    if existing == Some(preds) {
        return Ok(false);
    }

    for p in preds {
        if !map.contains_key(p) && !staged.contains_key(p) {
            return Err(StoreError::MissingPredecessor { key, missing: *p });
        }
    }

    if existing.is_some() {
        // The key is already linked into the graph: a differing re-add is
        // either a cycle (the key sits among the new predecessors'
        // ancestors) or an inconsistency.
        if ancestors_of(map, Some(staged), preds).contains(&key) {
            return Err(StoreError::CycleDetected(key));
        }
        return Err(StoreError::InconsistentPredecessors(key));
    }

    Ok(true)
}

impl KeyStore for MemoryStore {
    fn add(&self, key: Key, preds: &BTreeSet<Key>) -> StoreResult<()> {
        let mut map = self.preds.write().expect("lock poisoned");
        let staged = HashMap::new();
        if check_add(&map, &staged, key, preds)? {
            debug!(key = %key.short_hex(), preds = preds.len(), "added key");
            map.insert(key, preds.clone());
        }
        Ok(())
    }

    fn list(&self) -> StoreResult<BTreeSet<Key>> {
        let map = self.preds.read().expect("lock poisoned");
        Ok(map.keys().copied().collect())
    }

    fn pred(&self, key: &Key) -> StoreResult<BTreeSet<Key>> {
        let map = self.preds.read().expect("lock poisoned");
        Ok(map.get(key).cloned().unwrap_or_default())
    }

    fn contains(&self, key: &Key) -> StoreResult<bool> {
        let map = self.preds.read().expect("lock poisoned");
        Ok(map.contains_key(key))
    }

    fn add_batch(&self, entries: &[(Key, BTreeSet<Key>)]) -> StoreResult<()> {
        let mut map = self.preds.write().expect("lock poisoned");
        let mut staged: HashMap<Key, BTreeSet<Key>> = HashMap::new();

        for (key, preds) in entries {
            if check_add(&map, &staged, *key, preds)? {
                staged.insert(*key, preds.clone());
            }
        }

        debug!(inserted = staged.len(), "applied key batch");
        map.extend(staged);
        Ok(())
    }
}

impl ValueStore for MemoryStore {
    fn write(&self, value: Value) -> StoreResult<Key> {
        let key = value.key();
        let mut map = self.values.write().expect("lock poisoned");
        // Idempotent: content-addressing guarantees the same key always
        // maps to the same bytes.
        map.entry(key).or_insert(value);
        Ok(key)
    }

    fn read(&self, key: &Key) -> StoreResult<Option<Value>> {
        let map = self.values.read().expect("lock poisoned");
        Ok(map.get(key).cloned())
    }

    fn contains(&self, key: &Key) -> StoreResult<bool> {
        let map = self.values.read().expect("lock poisoned");
        Ok(map.contains_key(key))
    }
}

impl TagStore for MemoryStore {
    fn update(&self, tag: &TagName, keys: &BTreeSet<Key>) -> StoreResult<()> {
        let known = self.preds.read().expect("lock poisoned");
        for k in keys {
            if !known.contains_key(k) {
                return Err(StoreError::DanglingReference {
                    tag: tag.clone(),
                    key: *k,
                });
            }
        }
        let mut tags = self.tags.write().expect("lock poisoned");
        debug!(tag = %tag, heads = keys.len(), "updated tag");
        tags.insert(tag.clone(), keys.clone());
        Ok(())
    }

    fn remove(&self, tag: &TagName) -> StoreResult<bool> {
        let mut tags = self.tags.write().expect("lock poisoned");
        Ok(tags.remove(tag).is_some())
    }

    fn read(&self, tag: &TagName) -> StoreResult<BTreeSet<Key>> {
        let tags = self.tags.read().expect("lock poisoned");
        Ok(tags.get(tag).cloned().unwrap_or_default())
    }

    fn list(&self) -> StoreResult<BTreeSet<TagName>> {
        let tags = self.tags.read().expect("lock poisoned");
        Ok(tags.keys().cloned().collect())
    }

    fn update_batch(&self, bundle: &TagBundle) -> StoreResult<()> {
        let known = self.preds.read().expect("lock poisoned");
        for (tag, keys) in bundle {
            for k in keys {
                if !known.contains_key(k) {
                    return Err(StoreError::DanglingReference {
                        tag: tag.clone(),
                        key: *k,
                    });
                }
            }
        }
        let mut tags = self.tags.write().expect("lock poisoned");
        for (tag, keys) in bundle {
            tags.insert(tag.clone(), keys.clone());
        }
        debug!(updated = bundle.len(), "applied tag batch");
        Ok(())
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("key_count", &self.key_count())
            .finish()
    }
}
