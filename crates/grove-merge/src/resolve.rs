//! Per-path merge resolvers.

use std::collections::BTreeMap;
use std::sync::Arc;

use grove_types::Value;

use crate::error::Conflict;

/// A pure three-way value resolver.
///
/// `old` is the value at the merge base (`None` when the heads share no
/// history or the base has no stored value). Resolvers must be
/// deterministic functions of their arguments.
pub trait Resolve: Send + Sync {
    fn merge(
        &self,
        old: Option<&Value>,
        ours: &Value,
        theirs: &Value,
    ) -> Result<Value, Conflict>;
}

impl<F> Resolve for F
where
    F: Fn(Option<&Value>, &Value, &Value) -> Result<Value, Conflict> + Send + Sync,
{
    fn merge(
        &self,
        old: Option<&Value>,
        ours: &Value,
        theirs: &Value,
    ) -> Result<Value, Conflict> {
        self(old, ours, theirs)
    }
}

/// Dispatch table mapping path prefixes to resolvers.
///
/// Lookup picks the longest registered prefix of the path, falling back
/// to the default resolver when no prefix matches.
#[derive(Clone, Default)]
pub struct ResolverRegistry {
    by_prefix: BTreeMap<String, Arc<dyn Resolve>>,
    fallback: Option<Arc<dyn Resolve>>,
}

impl ResolverRegistry {
    /// An empty registry with no default.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `resolver` for every path starting with `prefix`.
    /// Re-registering a prefix replaces the previous resolver.
    pub fn register(&mut self, prefix: impl Into<String>, resolver: Arc<dyn Resolve>) {
        self.by_prefix.insert(prefix.into(), resolver);
    }

    /// Install the resolver used when no prefix matches.
    pub fn set_default(&mut self, resolver: Arc<dyn Resolve>) {
        self.fallback = Some(resolver);
    }

    /// The resolver responsible for `path`.
    pub fn lookup(&self, path: &str) -> Option<&Arc<dyn Resolve>> {
        self.by_prefix
            .iter()
            .filter(|(prefix, _)| path.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, resolver)| resolver)
            .or(self.fallback.as_ref())
    }

    /// Number of registered prefixes (excluding the default).
    pub fn len(&self) -> usize {
        self.by_prefix.len()
    }

    /// Returns `true` if nothing is registered, default included.
    pub fn is_empty(&self) -> bool {
        self.by_prefix.is_empty() && self.fallback.is_none()
    }
}

impl std::fmt::Debug for ResolverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolverRegistry")
            .field("prefixes", &self.by_prefix.keys().collect::<Vec<_>>())
            .field("has_default", &self.fallback.is_some())
            .finish()
    }
}

/// Keep ours unless theirs changed and ours did not; conflict when both
/// diverged from old.
pub fn take_newer(old: Option<&Value>, ours: &Value, theirs: &Value) -> Result<Value, Conflict> {
    if ours == theirs {
        return Ok(ours.clone());
    }
    match old {
        Some(old) if old == ours => Ok(theirs.clone()),
        Some(old) if old == theirs => Ok(ours.clone()),
        _ => Err(Conflict::new("", "both sides diverged from the base")),
    }
}
