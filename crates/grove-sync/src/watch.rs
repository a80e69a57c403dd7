//! Change broadcasting for watch subscriptions.
//!
//! Tag mutations publish a [`TagChange`] into a bounded broadcast
//! channel. Each [`WatchSession`] filters the stream against its
//! subscribed tag set and ships only the delta it has not announced yet.
//! A subscriber that falls behind the buffer is disconnected rather than
//! silently skipped.

use std::collections::BTreeSet;

use tokio::sync::broadcast;
use tracing::debug;

use grove_store::{KeyStore, TagStore};
use grove_types::{EventClock, Graph, Key, TagName};

use crate::error::{SyncError, SyncResult};
use crate::transfer;

/// Default bound on buffered, not-yet-consumed changes per hub.
pub const DEFAULT_WATCH_BUFFER: usize = 128;

/// One published tag mutation.
#[derive(Clone, Debug)]
pub struct TagChange {
    /// Tags whose bindings changed.
    pub tags: BTreeSet<TagName>,
    /// Position in the hub's event order.
    pub tick: u64,
}

/// A delta ready to ship to one subscriber.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WatchDelta {
    /// The watched tags that changed.
    pub tags: BTreeSet<TagName>,
    /// Subgraph newly reachable relative to the last announced state.
    pub graph: Graph,
}

/// Broadcast hub connecting tag mutations to watch subscribers.
pub struct WatchHub {
    tx: broadcast::Sender<TagChange>,
    clock: EventClock,
}

impl WatchHub {
    /// Create a hub buffering at most `buffer` undelivered changes.
    pub fn new(buffer: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer.max(1));
        Self {
            tx,
            clock: EventClock::new(),
        }
    }

    /// Announce that `tags` changed. Subscribers pick the change up
    /// asynchronously; with no subscribers this is a no-op.
    pub fn publish(&self, tags: BTreeSet<TagName>) {
        if tags.is_empty() {
            return;
        }
        let tick = self.clock.tick();
        debug!(tags = tags.len(), tick, "published tag change");
        let _ = self.tx.send(TagChange { tags, tick });
    }

    /// Subscribe to changes of `tags`.
    ///
    /// The session's announced state is primed from the tags' current
    /// heads, so the first delivered delta is relative to the state at
    /// subscription time.
    pub fn subscribe<S>(&self, store: &S, tags: BTreeSet<TagName>) -> SyncResult<WatchSession>
    where
        S: TagStore + ?Sized,
    {
        // Register the receiver before sampling heads so a concurrent
        // update is either sampled or delivered, never lost.
        let rx = self.tx.subscribe();
        let mut announced = BTreeSet::new();
        for tag in &tags {
            announced.extend(TagStore::read(store, tag)?);
        }
        Ok(WatchSession {
            rx,
            tags,
            announced,
        })
    }

    /// A raw receiver of every published change, unfiltered.
    ///
    /// Consumers that select by something other than an exact tag set
    /// (e.g. name prefixes) build on this instead of [`subscribe`].
    ///
    /// [`subscribe`]: WatchHub::subscribe
    pub fn changes(&self) -> broadcast::Receiver<TagChange> {
        self.tx.subscribe()
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl std::fmt::Debug for WatchHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchHub")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// One subscriber's view of the change stream.
pub struct WatchSession {
    rx: broadcast::Receiver<TagChange>,
    tags: BTreeSet<TagName>,
    /// Keys already reported to this subscriber; the next delta excludes
    /// their ancestry.
    announced: BTreeSet<Key>,
}

impl WatchSession {
    /// The tags this session watches.
    pub fn tags(&self) -> &BTreeSet<TagName> {
        &self.tags
    }

    /// Await the next relevant change and compute its delta.
    ///
    /// Returns `Ok(None)` when the hub is gone (server shutdown). A
    /// session that lagged behind the buffer fails `Lagged` and should be
    /// dropped by the caller.
    pub async fn next_delta<S>(&mut self, store: &S) -> SyncResult<Option<WatchDelta>>
    where
        S: KeyStore + TagStore,
    {
        loop {
            let change = match self.rx.recv().await {
                Ok(change) => change,
                Err(broadcast::error::RecvError::Closed) => return Ok(None),
                Err(broadcast::error::RecvError::Lagged(_)) => return Err(SyncError::Lagged),
            };

            let relevant: BTreeSet<TagName> = change
                .tags
                .intersection(&self.tags)
                .cloned()
                .collect();
            if relevant.is_empty() {
                continue;
            }

            let mut heads = BTreeSet::new();
            for tag in &relevant {
                heads.extend(TagStore::read(store, tag)?);
            }

            let graph = delta_graph(store, &heads, &self.announced)?;
            self.announced.extend(heads);

            return Ok(Some(WatchDelta {
                tags: relevant,
                graph,
            }));
        }
    }
}

impl std::fmt::Debug for WatchSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchSession")
            .field("tags", &self.tags)
            .field("announced", &self.announced.len())
            .finish()
    }
}

/// Subgraph reachable from `heads` but not from `announced`.
///
/// The pull traversal with the announced keys as the frontier.
fn delta_graph<S>(store: &S, heads: &BTreeSet<Key>, announced: &BTreeSet<Key>) -> SyncResult<Graph>
where
    S: KeyStore,
{
    transfer::reachable_delta(store, heads, announced)
}
