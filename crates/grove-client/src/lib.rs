//! Typed remote access to a grove server.
//!
//! A [`Client`] wraps one bidirectional byte channel. Every operation
//! encodes a request frame, then awaits and decodes exactly one response
//! frame; operations are strictly sequential on a channel, so callers
//! needing concurrency pool clients. [`Client::watch`] consumes the
//! client and turns the channel into a [`WatchStream`] of server-pushed
//! events.

pub mod client;
pub mod error;
pub mod remote;

pub use client::{Client, WatchStream};
pub use error::{ClientError, ClientResult};
pub use remote::RemoteSync;
