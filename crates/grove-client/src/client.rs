use std::collections::BTreeSet;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::debug;

use grove_types::{Graph, Key, TagBundle, TagName, Value};
use grove_wire::{
    read_frame, write_message, RemoteFailure, Request, WatchEvent, Wire, MAX_FRAME_BYTES,
};

use crate::error::{ClientError, ClientResult};

/// A typed proxy for one channel to a grove server.
///
/// One request is in flight at a time; there are no request IDs on the
/// wire, so the n-th response always answers the n-th request.
pub struct Client<C> {
    channel: C,
    max_frame_bytes: usize,
}

impl Client<TcpStream> {
    /// Connect to a server over TCP.
    pub async fn connect(addr: std::net::SocketAddr) -> ClientResult<Self> {
        let stream = TcpStream::connect(addr).await?;
        debug!(%addr, "connected");
        Ok(Self::new(stream))
    }
}

impl<C> Client<C>
where
    C: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap an established channel.
    pub fn new(channel: C) -> Self {
        Self {
            channel,
            max_frame_bytes: MAX_FRAME_BYTES,
        }
    }

    /// Wrap a channel with a custom frame cap.
    pub fn with_max_frame(channel: C, max_frame_bytes: usize) -> Self {
        Self {
            channel,
            max_frame_bytes,
        }
    }

    /// Write one request frame and await its response payload.
    async fn call(&mut self, request: &Request) -> ClientResult<Vec<u8>> {
        debug!(action = request.action().wire_name(), "request");
        write_message(&mut self.channel, request).await?;
        read_frame(&mut self.channel, self.max_frame_bytes)
            .await?
            .ok_or(ClientError::Disconnected)
    }

    /// A request whose only success response is the zero-length frame.
    async fn call_unit(&mut self, request: &Request) -> ClientResult<()> {
        let payload = self.call(request).await?;
        <()>::from_bytes(&payload)?;
        Ok(())
    }

    /// A request answered by unit-or-structured-failure.
    async fn call_fallible(&mut self, request: &Request) -> ClientResult<()> {
        let payload = self.call(request).await?;
        match RemoteFailure::check_unit(&payload)? {
            Ok(()) => Ok(()),
            Err(failure) => Err(ClientError::Remote(failure)),
        }
    }

    /// Insert `key` with its predecessors into the remote key store.
    pub async fn key_add(&mut self, key: Key, preds: BTreeSet<Key>) -> ClientResult<()> {
        self.call_unit(&Request::KeyAdd { key, preds }).await
    }

    /// All keys known to the remote.
    pub async fn key_list(&mut self) -> ClientResult<BTreeSet<Key>> {
        let payload = self.call(&Request::KeyList).await?;
        Ok(BTreeSet::from_bytes(&payload)?)
    }

    /// The remote predecessor set of `key` (empty when absent).
    pub async fn key_pred(&mut self, key: Key) -> ClientResult<BTreeSet<Key>> {
        let payload = self.call(&Request::KeyPred { key }).await?;
        Ok(BTreeSet::from_bytes(&payload)?)
    }

    /// Store `value` remotely, returning its key.
    pub async fn value_write(&mut self, value: Value) -> ClientResult<Key> {
        let payload = self.call(&Request::ValueWrite { value }).await?;
        Ok(Key::from_bytes(&payload)?)
    }

    /// Fetch the value addressed by `key`.
    pub async fn value_read(&mut self, key: Key) -> ClientResult<Option<Value>> {
        let payload = self.call(&Request::ValueRead { key }).await?;
        Ok(Option::from_bytes(&payload)?)
    }

    /// Atomically bind `tag` to `keys`.
    pub async fn tag_update(&mut self, tag: TagName, keys: BTreeSet<Key>) -> ClientResult<()> {
        self.call_unit(&Request::TagUpdate { tag, keys }).await
    }

    /// Delete `tag` (absent is not an error).
    pub async fn tag_remove(&mut self, tag: TagName) -> ClientResult<()> {
        self.call_unit(&Request::TagRemove { tag }).await
    }

    /// The keys bound to `tag` (empty when absent).
    pub async fn tag_read(&mut self, tag: TagName) -> ClientResult<BTreeSet<Key>> {
        let payload = self.call(&Request::TagRead { tag }).await?;
        Ok(BTreeSet::from_bytes(&payload)?)
    }

    /// All tags defined on the remote.
    pub async fn tag_list(&mut self) -> ClientResult<BTreeSet<TagName>> {
        let payload = self.call(&Request::TagList).await?;
        Ok(BTreeSet::from_bytes(&payload)?)
    }

    /// Pull the subgraph reachable from `roots`, excluding everything the
    /// tags in `have` already cover.
    pub async fn pull_keys(
        &mut self,
        roots: BTreeSet<Key>,
        have: BTreeSet<TagName>,
    ) -> ClientResult<Graph> {
        let payload = self.call(&Request::SyncPullKeys { roots, have }).await?;
        Ok(Graph::from_bytes(&payload)?)
    }

    /// Snapshot every remote tag.
    pub async fn pull_tags(&mut self) -> ClientResult<TagBundle> {
        let payload = self.call(&Request::SyncPullTags).await?;
        Ok(Vec::from_bytes(&payload)?)
    }

    /// Ship a graph and propose tag bindings; rejected pushes surface as
    /// [`ClientError::Remote`].
    pub async fn push_keys(&mut self, graph: Graph, tags: TagBundle) -> ClientResult<()> {
        self.call_fallible(&Request::SyncPushKeys { graph, tags })
            .await
    }

    /// Bulk-update remote tags; rejections surface as
    /// [`ClientError::Remote`].
    pub async fn push_tags(&mut self, tags: TagBundle) -> ClientResult<()> {
        self.call_fallible(&Request::SyncPushTags { tags }).await
    }

    /// Subscribe to changes of `tags`, consuming the client.
    ///
    /// The channel carries server-initiated frames from here on; drop the
    /// stream to cancel the subscription.
    pub async fn watch(mut self, tags: BTreeSet<TagName>) -> ClientResult<WatchStream<C>> {
        write_message(&mut self.channel, &Request::SyncWatch { tags }).await?;
        Ok(WatchStream {
            channel: self.channel,
            max_frame_bytes: self.max_frame_bytes,
        })
    }
}

impl<C> std::fmt::Debug for Client<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("max_frame_bytes", &self.max_frame_bytes)
            .finish()
    }
}

/// A lazy stream of watch events; cancelled by dropping it.
pub struct WatchStream<C> {
    channel: C,
    max_frame_bytes: usize,
}

impl<C> WatchStream<C>
where
    C: AsyncRead + Unpin,
{
    /// Await the next event; `None` once the server closes the stream.
    pub async fn next(&mut self) -> ClientResult<Option<WatchEvent>> {
        match read_frame(&mut self.channel, self.max_frame_bytes).await? {
            None => Ok(None),
            Some(payload) => Ok(Some(WatchEvent::from_bytes(&payload)?)),
        }
    }
}

impl<C> std::fmt::Debug for WatchStream<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchStream").finish()
    }
}
