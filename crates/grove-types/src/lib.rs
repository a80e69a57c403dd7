//! Foundation types for grove.
//!
//! This crate provides the identity, payload, and structural types used
//! throughout the grove system. Every other grove crate depends on
//! `grove-types`.
//!
//! # Key Types
//!
//! - [`Key`] — Content-addressed identifier (BLAKE3 hash of value bytes)
//! - [`Value`] — Immutable opaque payload addressable by its key
//! - [`TagName`] — Validated human-readable name for a branch head
//! - [`Graph`] — A reachability-closed slice of the predecessor DAG
//! - [`EventClock`] — Process-wide monotonic counter for ordering events

pub mod clock;
pub mod error;
pub mod graph;
pub mod key;
pub mod tag;
pub mod value;

pub use clock::EventClock;
pub use error::TypeError;
pub use graph::{Graph, TagBundle};
pub use key::Key;
pub use tag::TagName;
pub use value::Value;
