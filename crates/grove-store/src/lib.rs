//! Store contracts and backends for grove.
//!
//! Grove keeps three cooperating maps:
//!
//! - the **key store** — each key to the set of its predecessor keys,
//!   forming an append-only DAG,
//! - the **value store** — content-addressed key to immutable value bytes,
//! - the **tag store** — human-readable names to sets of keys (branch
//!   heads), the only mutable pointers in the system.
//!
//! # Design Rules
//!
//! 1. Keys and values are append-only; tags update and delete atomically.
//! 2. Every predecessor of a stored key is itself stored (no dangling
//!    parent edges), and the predecessor graph never contains a cycle.
//! 3. A tag only ever points at keys the key store knows
//!    (`DanglingReference` otherwise).
//! 4. Batch operations are all-or-nothing: a failed batch leaves no
//!    partially applied state behind.
//! 5. Backends are internally safe for concurrent access (`Send + Sync`).
//!
//! # Storage Backends
//!
//! - [`MemoryStore`] — `RwLock`-guarded maps implementing all three
//!   contracts, for tests, embedding, and the reference server.

pub mod error;
pub mod memory;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use traits::{KeyStore, TagStore, ValueStore};
