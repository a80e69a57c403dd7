//! The grove database surface.
//!
//! A [`Database`] binds a store to one branch tag and offers the
//! high-level history operations: commit, snapshot, revert, three-way
//! merge, and per-path change streams. Branch names double as the path
//! namespace for watches, so `watch("apps/")` observes every branch
//! whose name extends that prefix.

pub mod db;
pub mod error;

pub use db::{Database, PathEvents};
pub use error::{DbError, DbResult};
