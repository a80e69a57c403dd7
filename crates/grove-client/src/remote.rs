use std::collections::BTreeSet;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

use grove_types::{Graph, Key, TagBundle, TagName};

use crate::client::Client;
use crate::error::ClientResult;

/// Transport surface for synchronizing with a remote grove store.
///
/// Abstracts over how the bytes travel; [`Client`] implements it for any
/// framed channel. Higher layers replicate against this trait so a test
/// double or an alternative transport can stand in.
#[async_trait]
pub trait RemoteSync {
    /// Fetch the subgraph reachable from `roots` minus what `have` covers.
    async fn pull_keys(
        &mut self,
        roots: BTreeSet<Key>,
        have: BTreeSet<TagName>,
    ) -> ClientResult<Graph>;

    /// Snapshot all remote tags.
    async fn pull_tags(&mut self) -> ClientResult<TagBundle>;

    /// Ship a graph plus proposed tag bindings.
    async fn push_keys(&mut self, graph: Graph, tags: TagBundle) -> ClientResult<()>;

    /// Bulk-update remote tags.
    async fn push_tags(&mut self, tags: TagBundle) -> ClientResult<()>;
}

#[async_trait]
impl<C> RemoteSync for Client<C>
where
    C: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn pull_keys(
        &mut self,
        roots: BTreeSet<Key>,
        have: BTreeSet<TagName>,
    ) -> ClientResult<Graph> {
        Client::pull_keys(self, roots, have).await
    }

    async fn pull_tags(&mut self) -> ClientResult<TagBundle> {
        Client::pull_tags(self).await
    }

    async fn push_keys(&mut self, graph: Graph, tags: TagBundle) -> ClientResult<()> {
        Client::push_keys(self, graph, tags).await
    }

    async fn push_tags(&mut self, tags: TagBundle) -> ClientResult<()> {
        Client::push_tags(self, tags).await
    }
}
