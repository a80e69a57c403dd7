//! Pull and push of reachability-closed graph slices.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use tracing::info;

use grove_store::{KeyStore, TagStore};
use grove_types::{Graph, Key, TagBundle, TagName};

use crate::error::{SyncError, SyncResult};

/// All keys reachable from `seeds` through predecessor edges, seeds
/// included.
fn ancestors_of<S>(store: &S, seeds: &BTreeSet<Key>) -> SyncResult<HashSet<Key>>
where
    S: KeyStore + ?Sized,
{
    let mut visited: HashSet<Key> = seeds.iter().copied().collect();
    let mut queue: VecDeque<Key> = seeds.iter().copied().collect();

    while let Some(current) = queue.pop_front() {
        for p in store.pred(&current)? {
            if visited.insert(p) {
                queue.push_back(p);
            }
        }
    }

    Ok(visited)
}

/// BFS from `roots`, stopping at anything reachable from `frontier`.
///
/// Nodes collect into an ascending set; edges are emitted in discovery
/// order. An edge into the frontier itself is kept, edges into deeper
/// covered ancestors are dropped (the receiver has them already). Unknown
/// roots are skipped.
pub(crate) fn reachable_delta<S>(
    store: &S,
    roots: &BTreeSet<Key>,
    frontier: &BTreeSet<Key>,
) -> SyncResult<Graph>
where
    S: KeyStore + ?Sized,
{
    let covered = ancestors_of(store, frontier)?;

    let mut nodes = BTreeSet::new();
    let mut edges = Vec::new();
    let mut visited = HashSet::new();
    let mut queue = VecDeque::new();

    for root in roots {
        if store.contains(root)? && !covered.contains(root) && visited.insert(*root) {
            queue.push_back(*root);
        }
    }

    while let Some(key) = queue.pop_front() {
        nodes.insert(key);
        for p in store.pred(&key)? {
            if covered.contains(&p) {
                if frontier.contains(&p) {
                    edges.push((key, p));
                }
            } else {
                edges.push((key, p));
                if visited.insert(p) {
                    queue.push_back(p);
                }
            }
        }
    }

    Ok(Graph { nodes, edges })
}

/// Compute the subgraph reachable from `roots` excluding everything
/// reachable from the keys currently bound to any tag in `have`.
pub fn pull_keys<S>(
    store: &S,
    roots: &BTreeSet<Key>,
    have: &BTreeSet<TagName>,
) -> SyncResult<Graph>
where
    S: KeyStore + TagStore,
{
    let mut frontier = BTreeSet::new();
    for tag in have {
        frontier.extend(TagStore::read(store, tag)?);
    }

    let graph = reachable_delta(store, roots, &frontier)?;
    info!(
        roots = roots.len(),
        nodes = graph.node_count(),
        edges = graph.edges.len(),
        "computed pull"
    );
    Ok(graph)
}

/// Snapshot every tag, ascending by name.
pub fn pull_tags<S>(store: &S) -> SyncResult<TagBundle>
where
    S: TagStore + ?Sized,
{
    let mut bundle = Vec::new();
    for tag in TagStore::list(store)? {
        let keys = TagStore::read(store, &tag)?;
        bundle.push((tag, keys));
    }
    Ok(bundle)
}

/// Reject bundles that bind the same tag twice.
fn check_bundle(bundle: &TagBundle) -> SyncResult<()> {
    let mut seen: BTreeSet<&TagName> = BTreeSet::new();
    for (tag, _) in bundle {
        if !seen.insert(tag) {
            return Err(SyncError::DuplicateTag(tag.clone()));
        }
    }
    Ok(())
}

/// Order `graph.nodes` predecessors-first using the shipped edges.
///
/// Kahn's algorithm over the edges whose endpoints both lie in the slice;
/// ties resolve in ascending key order so the result is deterministic.
/// A leftover node means the shipped edges close a cycle.
fn topological_entries(graph: &Graph) -> SyncResult<Vec<(Key, BTreeSet<Key>)>> {
    let mut preds_in: HashMap<Key, BTreeSet<Key>> = HashMap::new();
    let mut full_preds: HashMap<Key, BTreeSet<Key>> = HashMap::new();
    let mut children: HashMap<Key, Vec<Key>> = HashMap::new();

    for key in &graph.nodes {
        preds_in.insert(*key, BTreeSet::new());
        full_preds.insert(*key, BTreeSet::new());
    }
    for (key, pred) in &graph.edges {
        if let Some(set) = full_preds.get_mut(key) {
            set.insert(*pred);
        }
        if graph.nodes.contains(pred) {
            if let Some(set) = preds_in.get_mut(key) {
                if set.insert(*pred) {
                    children.entry(*pred).or_default().push(*key);
                }
            }
        }
    }

    let mut queue: VecDeque<Key> = graph
        .nodes
        .iter()
        .filter(|k| preds_in[*k].is_empty())
        .copied()
        .collect();
    let mut remaining: HashMap<Key, usize> =
        preds_in.iter().map(|(k, p)| (*k, p.len())).collect();

    let mut ordered = Vec::with_capacity(graph.nodes.len());
    while let Some(key) = queue.pop_front() {
        ordered.push((key, full_preds.remove(&key).unwrap_or_default()));
        if let Some(kids) = children.get(&key) {
            for child in kids {
                let slots = remaining.get_mut(child).expect("child is a node");
                *slots -= 1;
                if *slots == 0 {
                    queue.push_back(*child);
                }
            }
        }
    }

    if ordered.len() != graph.nodes.len() {
        let stuck = graph
            .nodes
            .iter()
            .find(|k| remaining.get(*k).is_some_and(|n| *n > 0))
            .copied()
            .expect("cycle leaves a node with predecessors");
        return Err(SyncError::CycleDetected(stuck));
    }

    Ok(ordered)
}

/// Apply a pushed graph and its proposed tag bindings.
///
/// Validation happens up front — closure, acyclicity, tag targets — and
/// the mutations go through the stores' batch operations, so a rejected
/// push leaves no observable state behind.
pub fn push_keys<S>(store: &S, graph: &Graph, tags: &TagBundle) -> SyncResult<()>
where
    S: KeyStore + TagStore,
{
    // Closure: every edge endpoint is shipped or already stored.
    for (a, b) in &graph.edges {
        for key in [a, b] {
            if !graph.nodes.contains(key) && !KeyStore::contains(store, key)? {
                return Err(SyncError::NotClosed(*key));
            }
        }
    }

    check_bundle(tags)?;
    for (tag, keys) in tags {
        for key in keys {
            if !graph.contains_node(key) && !KeyStore::contains(store, key)? {
                return Err(SyncError::UnknownTagTarget {
                    tag: tag.clone(),
                    key: *key,
                });
            }
        }
    }

    // Acyclicity within the slice; cycles through existing keys are caught
    // by the store's own insert validation.
    let entries = topological_entries(graph)?;

    store.add_batch(&entries)?;
    store.update_batch(tags)?;

    info!(
        nodes = graph.node_count(),
        tags = tags.len(),
        "applied push"
    );
    Ok(())
}

/// Apply a bundle of tag updates in a single critical section.
pub fn push_tags<S>(store: &S, bundle: &TagBundle) -> SyncResult<()>
where
    S: TagStore + ?Sized,
{
    check_bundle(bundle)?;
    store.update_batch(bundle)?;
    info!(tags = bundle.len(), "applied tag push");
    Ok(())
}
