//! The grove server: a frame dispatcher over accepted byte channels.
//!
//! Each connection is served by one [`Dispatcher`] task that reads a
//! length-prefixed request frame, executes it against the shared stores,
//! and writes exactly one response frame — except `sync-watch`, which
//! turns the connection into a server-initiated event stream until the
//! client goes away. Codec errors and non-push store errors close the
//! channel without a response; push rejections travel back as structured
//! failure frames.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod server;

pub use config::ServerConfig;
pub use dispatch::Dispatcher;
pub use error::{ServerError, ServerResult};
pub use server::Server;
