//! The three-way merge driver.

use tracing::{debug, info};

use grove_store::{KeyStore, ValueStore};
use grove_types::Key;

use crate::error::{MergeError, MergeResult};
use crate::lca::{is_ancestor, lowest_common_ancestor};
use crate::resolve::ResolverRegistry;

/// Drives three-way merges against a store.
///
/// The engine finds the merge base, dispatches the values to the resolver
/// registered for the path, writes the merged value, and records the new
/// key with both heads as predecessors. Advancing a tag to the merged key
/// is the caller's business.
#[derive(Clone, Debug, Default)]
pub struct MergeEngine {
    registry: ResolverRegistry,
}

impl MergeEngine {
    /// An engine dispatching through `registry`.
    pub fn new(registry: ResolverRegistry) -> Self {
        Self { registry }
    }

    /// The resolver registry, for registering further paths.
    pub fn registry_mut(&mut self) -> &mut ResolverRegistry {
        &mut self.registry
    }

    /// Merge `theirs` into `ours` under `path`, returning the resulting
    /// head key.
    ///
    /// Fast paths skip the resolver: equal heads return `ours`, and when
    /// one head is an ancestor of the other the descendant wins. A real
    /// divergence consults the lowest common ancestor for the old value
    /// and the path's resolver for the reconciliation; on success the
    /// merged value is written and a new key with predecessors
    /// `{ours, theirs}` is returned.
    pub fn merge<S>(&self, store: &S, ours: Key, theirs: Key, path: &str) -> MergeResult<Key>
    where
        S: KeyStore + ValueStore,
    {
        if ours == theirs {
            return Ok(ours);
        }
        for head in [&ours, &theirs] {
            if !KeyStore::contains(store, head)? {
                return Err(MergeError::UnknownHead(*head));
            }
        }

        if is_ancestor(store, &theirs, &ours)? {
            debug!(head = %ours.short_hex(), "merge is a no-op, ours is ahead");
            return Ok(ours);
        }
        if is_ancestor(store, &ours, &theirs)? {
            debug!(head = %theirs.short_hex(), "fast-forward to theirs");
            return Ok(theirs);
        }

        let base = lowest_common_ancestor(store, &ours, &theirs)?;
        let old = match base {
            Some(base_key) => ValueStore::read(store, &base_key)?,
            None => None,
        };
        let ours_value = ValueStore::read(store, &ours)?.ok_or(MergeError::MissingValue(ours))?;
        let theirs_value =
            ValueStore::read(store, &theirs)?.ok_or(MergeError::MissingValue(theirs))?;

        let resolver = self
            .registry
            .lookup(path)
            .ok_or_else(|| MergeError::NoResolver(path.to_string()))?;
        let merged = resolver.merge(old.as_ref(), &ours_value, &theirs_value)?;

        let merged_key = ValueStore::write(store, merged)?;
        store.add(merged_key, &[ours, theirs].into())?;
        info!(
            ours = %ours.short_hex(),
            theirs = %theirs.short_hex(),
            merged = %merged_key.short_hex(),
            path,
            "merged heads"
        );
        Ok(merged_key)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::Arc;

    use grove_store::MemoryStore;
    use grove_types::Value;

    use super::*;
    use crate::error::Conflict;
    use crate::resolve::take_newer;

    fn commit(store: &MemoryStore, content: &str, preds: &BTreeSet<Key>) -> Key {
        let key = store.write(Value::from(content)).unwrap();
        store.add(key, preds).unwrap();
        key
    }

    fn engine_with_default() -> MergeEngine {
        let mut registry = ResolverRegistry::new();
        registry.set_default(Arc::new(take_newer));
        MergeEngine::new(registry)
    }

    #[test]
    fn equal_heads_merge_to_themselves() {
        let store = MemoryStore::new();
        let a = commit(&store, "base", &BTreeSet::new());
        let engine = engine_with_default();
        assert_eq!(engine.merge(&store, a, a, "x").unwrap(), a);
    }

    #[test]
    fn descendant_wins_without_resolver() {
        let store = MemoryStore::new();
        let base = commit(&store, "base", &BTreeSet::new());
        let next = commit(&store, "next", &[base].into());

        // No resolver registered at all: fast paths must not need one.
        let engine = MergeEngine::new(ResolverRegistry::new());
        assert_eq!(engine.merge(&store, next, base, "x").unwrap(), next);
        assert_eq!(engine.merge(&store, base, next, "x").unwrap(), next);
    }

    #[test]
    fn divergence_resolves_through_registry() {
        let store = MemoryStore::new();
        let base = commit(&store, "base", &BTreeSet::new());
        let ours = commit(&store, "ours", &[base].into());
        let theirs = commit(&store, "theirs", &[base].into());

        // Resolver sees the base value as old and combines both sides.
        let concat = |old: Option<&Value>, a: &Value, b: &Value| -> Result<Value, Conflict> {
            assert_eq!(old, Some(&Value::from("base")));
            let mut bytes = a.as_bytes().to_vec();
            bytes.push(b'+');
            bytes.extend_from_slice(b.as_bytes());
            Ok(Value::new(bytes))
        };
        let mut registry = ResolverRegistry::new();
        registry.set_default(Arc::new(concat));
        let engine = MergeEngine::new(registry);

        let merged = engine.merge(&store, ours, theirs, "x").unwrap();
        assert_eq!(
            ValueStore::read(&store, &merged).unwrap().unwrap(),
            Value::from("ours+theirs")
        );
        // The merged key carries both heads as predecessors.
        assert_eq!(store.pred(&merged).unwrap(), [ours, theirs].into());
    }

    #[test]
    fn conflict_propagates() {
        let store = MemoryStore::new();
        let base = commit(&store, "base", &BTreeSet::new());
        let ours = commit(&store, "ours", &[base].into());
        let theirs = commit(&store, "theirs", &[base].into());

        let engine = engine_with_default();
        let err = engine.merge(&store, ours, theirs, "x").unwrap_err();
        assert!(matches!(err, MergeError::Conflict(_)));
        // No merge commit was created.
        assert_eq!(store.key_count(), 3);
    }

    #[test]
    fn missing_resolver_is_reported() {
        let store = MemoryStore::new();
        let base = commit(&store, "base", &BTreeSet::new());
        let ours = commit(&store, "ours", &[base].into());
        let theirs = commit(&store, "theirs", &[base].into());

        let engine = MergeEngine::new(ResolverRegistry::new());
        let err = engine.merge(&store, ours, theirs, "x").unwrap_err();
        assert!(matches!(err, MergeError::NoResolver(_)));
    }

    #[test]
    fn unknown_head_is_reported() {
        let store = MemoryStore::new();
        let a = commit(&store, "a", &BTreeSet::new());
        let ghost = Key::from_hash([9; 32]);
        let engine = engine_with_default();
        let err = engine.merge(&store, a, ghost, "x").unwrap_err();
        assert!(matches!(err, MergeError::UnknownHead(k) if k == ghost));
    }

    #[test]
    fn symmetric_resolver_gives_symmetric_merge() {
        // With a symmetric resolver the merged key is identical in both
        // directions: same merged bytes, same predecessor pair.
        let symmetric = |_: Option<&Value>, a: &Value, b: &Value| -> Result<Value, Conflict> {
            let mut bytes = a.as_bytes().min(b.as_bytes()).to_vec();
            bytes.extend_from_slice(a.as_bytes().max(b.as_bytes()));
            Ok(Value::new(bytes))
        };
        let mut registry = ResolverRegistry::new();
        registry.set_default(Arc::new(symmetric));
        let engine = MergeEngine::new(registry);

        let store = MemoryStore::new();
        let base = commit(&store, "base", &BTreeSet::new());
        let a = commit(&store, "aaa", &[base].into());
        let b = commit(&store, "bbb", &[base].into());

        let ab = engine.merge(&store, a, b, "x").unwrap();
        let ba = engine.merge(&store, b, a, "x").unwrap();
        assert_eq!(ab, ba);
    }

    #[test]
    fn unrelated_heads_merge_with_no_base() {
        let store = MemoryStore::new();
        let a = commit(&store, "left", &BTreeSet::new());
        let b = commit(&store, "right", &BTreeSet::new());

        // Resolver sees old = None for history-free merges.
        let saw_no_base = |old: Option<&Value>, ours: &Value, _: &Value| -> Result<Value, Conflict> {
            assert!(old.is_none());
            Ok(ours.clone())
        };
        let mut registry = ResolverRegistry::new();
        registry.set_default(Arc::new(saw_no_base));
        let engine = MergeEngine::new(registry);

        let merged = engine.merge(&store, a, b, "x").unwrap();
        assert_eq!(store.pred(&merged).unwrap(), [a, b].into());
    }

    /// Append-only log whose lines are "timestamp:entry". The merge keeps
    /// the common prefix and interleaves both sides' new entries by
    /// timestamp.
    #[test]
    fn log_merge_orders_entries_by_timestamp() {
        fn lines(v: &Value) -> Vec<String> {
            String::from_utf8(v.as_bytes().to_vec())
                .unwrap()
                .lines()
                .map(str::to_owned)
                .collect()
        }

        let log_resolver =
            |old: Option<&Value>, ours: &Value, theirs: &Value| -> Result<Value, Conflict> {
                let base = old.map(lines).unwrap_or_default();
                let fresh = |side: &Value| -> Vec<String> {
                    lines(side).into_iter().skip(base.len()).collect()
                };
                let mut appended: Vec<String> = fresh(ours);
                appended.extend(fresh(theirs));
                appended.sort_by_key(|line| {
                    line.split(':')
                        .next()
                        .and_then(|ts| ts.parse::<u64>().ok())
                        .unwrap_or(u64::MAX)
                });
                let mut merged = base;
                merged.extend(appended);
                Ok(Value::from(merged.join("\n").as_str()))
            };

        let mut registry = ResolverRegistry::new();
        registry.register("logs/", Arc::new(log_resolver));
        let engine = MergeEngine::new(registry);

        let store = MemoryStore::new();
        let l0 = commit(&store, "1:boot", &BTreeSet::new());
        // Branch a appends two entries, branch b appends one in between.
        let a = commit(&store, "1:boot\n2:login\n5:logout", &[l0].into());
        let b = commit(&store, "1:boot\n3:ping", &[l0].into());

        let merged = engine.merge(&store, a, b, "logs/session").unwrap();
        let merged_value = ValueStore::read(&store, &merged).unwrap().unwrap();
        assert_eq!(
            merged_value.as_bytes(),
            b"1:boot\n2:login\n3:ping\n5:logout"
        );
        assert_eq!(store.pred(&merged).unwrap(), [a, b].into());
    }
}
