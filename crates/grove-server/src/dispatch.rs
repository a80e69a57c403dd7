//! Per-connection request dispatch.

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info};

use grove_store::{KeyStore, StoreError, TagStore, ValueStore};
use grove_sync::{pull_keys, pull_tags, push_keys, push_tags, SyncError, WatchHub};
use grove_types::{TagBundle, TagName};
use grove_wire::{
    read_frame, write_frame, write_message, FailureCode, RemoteFailure, Request, WatchEvent, Wire,
};

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};

/// Serves one channel: reads request frames, executes them against the
/// shared stores, writes response frames.
///
/// Cloning a dispatcher is cheap; the server hands one clone to each
/// accepted connection.
pub struct Dispatcher<S> {
    store: Arc<S>,
    hub: Arc<WatchHub>,
    max_frame_bytes: usize,
}

impl<S> Clone for Dispatcher<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            hub: Arc::clone(&self.hub),
            max_frame_bytes: self.max_frame_bytes,
        }
    }
}

impl<S> Dispatcher<S>
where
    S: KeyStore + ValueStore + TagStore,
{
    pub fn new(store: Arc<S>, hub: Arc<WatchHub>, config: &ServerConfig) -> Self {
        Self {
            store,
            hub,
            max_frame_bytes: config.max_frame_bytes,
        }
    }

    /// Serve `channel` until the client disconnects or a fatal error
    /// closes it.
    ///
    /// Requests are strictly sequential: the n-th response answers the
    /// n-th request. A `sync-watch` request flips the channel into
    /// streaming mode for the rest of its life.
    pub async fn run<C>(&self, channel: C) -> ServerResult<()>
    where
        C: AsyncRead + AsyncWrite + Unpin,
    {
        let (mut rd, mut wr) = tokio::io::split(channel);

        loop {
            let Some(payload) = read_frame(&mut rd, self.max_frame_bytes).await? else {
                return Ok(());
            };
            let request = Request::from_bytes(&payload)?;
            debug!(action = request.action().wire_name(), "dispatching");

            match request {
                Request::SyncWatch { tags } => return self.stream_watch(rd, wr, tags).await,
                other => {
                    let response = self.execute(other)?;
                    write_frame(&mut wr, &response).await?;
                }
            }
        }
    }

    /// Execute one non-streaming request, returning the response payload.
    ///
    /// Push operations have a structured failure path: their rejections
    /// are encoded into the response. Everything else propagates errors,
    /// which closes the channel without a response.
    fn execute(&self, request: Request) -> ServerResult<Vec<u8>> {
        let store = &*self.store;
        Ok(match request {
            Request::KeyAdd { key, preds } => {
                store.add(key, &preds)?;
                Vec::new()
            }
            Request::KeyList => KeyStore::list(store)?.to_bytes(),
            Request::KeyPred { key } => store.pred(&key)?.to_bytes(),
            Request::ValueWrite { value } => store.write(value)?.to_bytes(),
            Request::ValueRead { key } => ValueStore::read(store, &key)?.to_bytes(),
            Request::TagUpdate { tag, keys } => {
                store.update(&tag, &keys)?;
                self.hub.publish([tag].into());
                Vec::new()
            }
            Request::TagRemove { tag } => {
                if store.remove(&tag)? {
                    self.hub.publish([tag].into());
                }
                Vec::new()
            }
            Request::TagRead { tag } => TagStore::read(store, &tag)?.to_bytes(),
            Request::TagList => TagStore::list(store)?.to_bytes(),
            Request::SyncPullKeys { roots, have } => {
                pull_keys(store, &roots, &have)?.to_bytes()
            }
            Request::SyncPullTags => pull_tags(store)?.to_bytes(),
            Request::SyncPushKeys { graph, tags } => {
                match push_keys(store, &graph, &tags) {
                    Ok(()) => {
                        self.publish_bundle_tags(&tags);
                        Vec::new()
                    }
                    Err(err) => failure_of(&err).to_bytes(),
                }
            }
            Request::SyncPushTags { tags } => match push_tags(store, &tags) {
                Ok(()) => {
                    self.publish_bundle_tags(&tags);
                    Vec::new()
                }
                Err(err) => failure_of(&err).to_bytes(),
            },
            Request::SyncWatch { .. } => unreachable!("watch handled by run"),
        })
    }

    fn publish_bundle_tags(&self, bundle: &TagBundle) {
        let tags: BTreeSet<TagName> = bundle.iter().map(|(t, _)| t.clone()).collect();
        self.hub.publish(tags);
    }

    /// Stream watch events until the client closes the channel.
    ///
    /// The read half is only polled for EOF; a client that pipelines
    /// another request onto a watch channel violates the protocol and is
    /// disconnected.
    async fn stream_watch<R, W>(
        &self,
        mut rd: R,
        mut wr: W,
        tags: BTreeSet<TagName>,
    ) -> ServerResult<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut session = self.hub.subscribe(&*self.store, tags)?;
        info!(tags = ?session.tags(), "watch subscribed");

        loop {
            tokio::select! {
                incoming = read_frame(&mut rd, self.max_frame_bytes) => {
                    return match incoming {
                        Ok(None) => {
                            info!("watch client disconnected");
                            Ok(())
                        }
                        Ok(Some(_)) => Err(ServerError::RequestDuringWatch),
                        Err(err) => Err(err.into()),
                    };
                }
                delta = session.next_delta(&*self.store) => {
                    match delta {
                        Ok(Some(delta)) => {
                            let event = WatchEvent {
                                tags: delta.tags,
                                graph: delta.graph,
                            };
                            write_message(&mut wr, &event).await?;
                        }
                        Ok(None) => return Ok(()),
                        Err(err) => return Err(err.into()),
                    }
                }
            }
        }
    }
}

impl<S> std::fmt::Debug for Dispatcher<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("max_frame_bytes", &self.max_frame_bytes)
            .finish()
    }
}

/// Map a push rejection onto its wire failure class.
fn failure_of(err: &SyncError) -> RemoteFailure {
    let code = match err {
        SyncError::NotClosed(_) => FailureCode::NotClosed,
        SyncError::CycleDetected(_) => FailureCode::CycleDetected,
        SyncError::UnknownTagTarget { .. } => FailureCode::DanglingReference,
        SyncError::Store(StoreError::MissingPredecessor { .. }) => FailureCode::MissingPredecessor,
        SyncError::Store(StoreError::CycleDetected(_)) => FailureCode::CycleDetected,
        SyncError::Store(StoreError::InconsistentPredecessors(_)) => {
            FailureCode::InconsistentPredecessors
        }
        SyncError::Store(StoreError::DanglingReference { .. }) => FailureCode::DanglingReference,
        _ => FailureCode::Internal,
    };
    RemoteFailure::new(code, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use grove_store::MemoryStore;
    use grove_types::{Graph, Key, Value};
    use tokio::io::{duplex, DuplexStream};

    fn k(byte: u8) -> Key {
        Key::from_hash([byte; 32])
    }

    fn tag(name: &str) -> TagName {
        TagName::new(name).unwrap()
    }

    /// One shared backend plus a way to open client channels against it.
    struct Harness {
        dispatcher: Dispatcher<MemoryStore>,
        store: Arc<MemoryStore>,
    }

    impl Harness {
        fn new() -> Self {
            let store = Arc::new(MemoryStore::new());
            let hub = Arc::new(WatchHub::new(16));
            let dispatcher = Dispatcher::new(Arc::clone(&store), hub, &ServerConfig::default());
            Self { dispatcher, store }
        }

        /// Open a fresh client channel served by its own dispatcher task.
        fn connect(&self) -> DuplexStream {
            let dispatcher = self.dispatcher.clone();
            let (client, server) = duplex(1 << 16);
            tokio::spawn(async move {
                let _ = dispatcher.run(server).await;
            });
            client
        }
    }

    /// Spawn a dispatcher on an in-memory channel; returns the client end
    /// and the shared store.
    fn spawn_dispatcher() -> (DuplexStream, Arc<MemoryStore>) {
        let harness = Harness::new();
        let client = harness.connect();
        (client, harness.store)
    }

    async fn call(channel: &mut DuplexStream, request: Request) -> Option<Vec<u8>> {
        write_message(channel, &request).await.unwrap();
        read_frame(channel, MAX_FRAME_BYTES_TEST).await.unwrap()
    }

    const MAX_FRAME_BYTES_TEST: usize = 1 << 20;

    #[tokio::test]
    async fn value_write_then_read() {
        let (mut client, _store) = spawn_dispatcher();

        let response = call(
            &mut client,
            Request::ValueWrite {
                value: Value::from("hello"),
            },
        )
        .await
        .unwrap();
        let key = Key::from_bytes(&response).unwrap();
        assert_eq!(key, Key::of_bytes(b"hello"));

        let response = call(&mut client, Request::ValueRead { key }).await.unwrap();
        let value = Option::<Value>::from_bytes(&response).unwrap();
        assert_eq!(value, Some(Value::from("hello")));
    }

    #[tokio::test]
    async fn value_read_of_unknown_key_is_none() {
        let (mut client, _store) = spawn_dispatcher();
        let response = call(&mut client, Request::ValueRead { key: k(9) }).await.unwrap();
        assert_eq!(Option::<Value>::from_bytes(&response).unwrap(), None);
    }

    #[tokio::test]
    async fn key_add_and_list_roundtrip() {
        let (mut client, _store) = spawn_dispatcher();

        let response = call(
            &mut client,
            Request::KeyAdd {
                key: k(1),
                preds: BTreeSet::new(),
            },
        )
        .await
        .unwrap();
        assert!(response.is_empty(), "unit response is a zero-length frame");

        let response = call(&mut client, Request::KeyList).await.unwrap();
        let keys = BTreeSet::<Key>::from_bytes(&response).unwrap();
        assert_eq!(keys, [k(1)].into());
    }

    #[tokio::test]
    async fn store_error_closes_channel_without_response() {
        let (mut client, store) = spawn_dispatcher();

        // Adding a key with a missing predecessor has no failure path.
        write_message(
            &mut client,
            &Request::KeyAdd {
                key: k(2),
                preds: [k(1)].into(),
            },
        )
        .await
        .unwrap();
        let out = read_frame(&mut client, MAX_FRAME_BYTES_TEST).await.unwrap();
        assert!(out.is_none(), "channel must close with no response frame");
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn malformed_request_closes_channel() {
        let (mut client, _store) = spawn_dispatcher();
        // Unknown action byte 0xEE.
        write_frame(&mut client, &[0xEE]).await.unwrap();
        let out = read_frame(&mut client, MAX_FRAME_BYTES_TEST).await.unwrap();
        assert!(out.is_none());
    }

    #[tokio::test]
    async fn trailing_bytes_close_channel() {
        let (mut client, _store) = spawn_dispatcher();
        // key-list with one stray byte after the action.
        write_frame(&mut client, &[1, 0]).await.unwrap();
        let out = read_frame(&mut client, MAX_FRAME_BYTES_TEST).await.unwrap();
        assert!(out.is_none());
    }

    #[tokio::test]
    async fn push_failure_is_a_structured_response() {
        let (mut client, store) = spawn_dispatcher();

        let graph = Graph::from_parts([k(2)].into(), vec![(k(2), k(1))]);
        let response = call(
            &mut client,
            Request::SyncPushKeys {
                graph,
                tags: Vec::new(),
            },
        )
        .await
        .unwrap();
        let outcome = RemoteFailure::check_unit(&response).unwrap();
        let failure = outcome.unwrap_err();
        assert_eq!(failure.code, FailureCode::NotClosed);
        assert!(store.is_empty());

        // The channel survives a rejected push.
        let response = call(&mut client, Request::KeyList).await.unwrap();
        assert!(BTreeSet::<Key>::from_bytes(&response).unwrap().is_empty());
    }

    #[tokio::test]
    async fn push_success_then_pull() {
        let (mut client, _store) = spawn_dispatcher();

        let graph = Graph::from_parts([k(1), k(2)].into(), vec![(k(2), k(1))]);
        let response = call(
            &mut client,
            Request::SyncPushKeys {
                graph: graph.clone(),
                tags: vec![(tag("main"), [k(2)].into())],
            },
        )
        .await
        .unwrap();
        assert_eq!(RemoteFailure::check_unit(&response).unwrap(), Ok(()));

        let response = call(&mut client, Request::SyncPullTags).await.unwrap();
        let bundle = Vec::<(TagName, BTreeSet<Key>)>::from_bytes(&response).unwrap();
        assert_eq!(bundle, vec![(tag("main"), [k(2)].into())]);

        let response = call(
            &mut client,
            Request::SyncPullKeys {
                roots: [k(2)].into(),
                have: BTreeSet::new(),
            },
        )
        .await
        .unwrap();
        let pulled = Graph::from_bytes(&response).unwrap();
        assert_eq!(pulled, graph);
    }

    #[tokio::test]
    async fn watch_streams_tag_changes() {
        let harness = Harness::new();
        let mut watcher = harness.connect();
        let mut writer = harness.connect();

        // Seed a key to point the tag at.
        let response = call(
            &mut writer,
            Request::KeyAdd {
                key: k(5),
                preds: BTreeSet::new(),
            },
        )
        .await
        .unwrap();
        assert!(response.is_empty());

        write_message(
            &mut watcher,
            &Request::SyncWatch {
                tags: [tag("main")].into(),
            },
        )
        .await
        .unwrap();
        // Let the watch task register before the mutation lands.
        tokio::task::yield_now().await;

        let response = call(
            &mut writer,
            Request::TagUpdate {
                tag: tag("main"),
                keys: [k(5)].into(),
            },
        )
        .await
        .unwrap();
        assert!(response.is_empty());

        let frame = read_frame(&mut watcher, MAX_FRAME_BYTES_TEST)
            .await
            .unwrap()
            .expect("one watch frame");
        let event = WatchEvent::from_bytes(&frame).unwrap();
        assert_eq!(event.tags, [tag("main")].into());
        assert!(event.graph.contains_node(&k(5)));
    }

    #[tokio::test]
    async fn watch_ignores_other_tags() {
        let harness = Harness::new();
        let mut watcher = harness.connect();
        let mut writer = harness.connect();

        call(
            &mut writer,
            Request::KeyAdd {
                key: k(1),
                preds: BTreeSet::new(),
            },
        )
        .await
        .unwrap();

        write_message(
            &mut watcher,
            &Request::SyncWatch {
                tags: [tag("main")].into(),
            },
        )
        .await
        .unwrap();
        tokio::task::yield_now().await;

        // An unrelated tag change produces no frame; a relevant one does.
        call(
            &mut writer,
            Request::TagUpdate {
                tag: tag("other"),
                keys: [k(1)].into(),
            },
        )
        .await
        .unwrap();
        call(
            &mut writer,
            Request::TagUpdate {
                tag: tag("main"),
                keys: [k(1)].into(),
            },
        )
        .await
        .unwrap();

        let frame = read_frame(&mut watcher, MAX_FRAME_BYTES_TEST)
            .await
            .unwrap()
            .expect("one watch frame");
        let event = WatchEvent::from_bytes(&frame).unwrap();
        assert_eq!(event.tags, [tag("main")].into());
    }

    #[tokio::test]
    async fn request_on_watch_channel_disconnects() {
        let harness = Harness::new();
        let mut watcher = harness.connect();

        write_message(
            &mut watcher,
            &Request::SyncWatch {
                tags: [tag("main")].into(),
            },
        )
        .await
        .unwrap();
        tokio::task::yield_now().await;

        // Pipelining another request onto the watch channel is a
        // protocol violation; the server closes the connection.
        write_message(&mut watcher, &Request::KeyList).await.unwrap();
        let out = read_frame(&mut watcher, MAX_FRAME_BYTES_TEST).await.unwrap();
        assert!(out.is_none());
    }
}
