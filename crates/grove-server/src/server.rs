use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{info, warn};

use grove_store::{KeyStore, MemoryStore, TagStore, ValueStore};
use grove_sync::WatchHub;

use crate::config::ServerConfig;
use crate::dispatch::Dispatcher;
use crate::error::ServerResult;

/// The grove repository server.
///
/// Owns the shared store and watch hub; every accepted connection gets
/// its own dispatcher task over them.
pub struct Server<S = MemoryStore> {
    config: ServerConfig,
    store: Arc<S>,
    hub: Arc<WatchHub>,
}

impl Server<MemoryStore> {
    /// A server over a fresh in-memory store.
    pub fn new(config: ServerConfig) -> Self {
        let hub = Arc::new(WatchHub::new(config.watch_buffer));
        Self {
            config,
            store: Arc::new(MemoryStore::new()),
            hub,
        }
    }
}

impl<S> Server<S>
where
    S: KeyStore + ValueStore + TagStore + 'static,
{
    /// A server over an existing store backend.
    pub fn with_store(config: ServerConfig, store: Arc<S>) -> Self {
        let hub = Arc::new(WatchHub::new(config.watch_buffer));
        Self { config, store, hub }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The shared store, for embedding and tests.
    pub fn store(&self) -> Arc<S> {
        Arc::clone(&self.store)
    }

    /// A dispatcher over this server's store and hub, for serving a
    /// channel directly (in-process transports, tests).
    pub fn dispatcher(&self) -> Dispatcher<S> {
        Dispatcher::new(Arc::clone(&self.store), Arc::clone(&self.hub), &self.config)
    }

    /// Accept connections forever, one dispatcher task per channel.
    pub async fn serve(self) -> ServerResult<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        info!("grove server listening on {}", self.config.bind_addr);

        loop {
            let (socket, peer) = listener.accept().await?;
            let dispatcher = self.dispatcher();
            tokio::spawn(async move {
                match dispatcher.run(socket).await {
                    Ok(()) => info!(%peer, "connection closed"),
                    Err(err) => warn!(%peer, error = %err, "connection failed"),
                }
            });
        }
    }
}

impl<S> std::fmt::Debug for Server<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("bind_addr", &self.config.bind_addr)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_construction() {
        let server = Server::new(ServerConfig::default());
        assert_eq!(
            server.config().bind_addr,
            "127.0.0.1:7461".parse().unwrap()
        );
        assert!(server.store().is_empty());
    }

    #[test]
    fn dispatchers_share_the_store() {
        let server = Server::new(ServerConfig::default());
        let _a = server.dispatcher();
        let _b = server.dispatcher();
        assert_eq!(Arc::strong_count(&server.store()), 4);
    }
}
