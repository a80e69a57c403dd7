//! Distributed synchronization for grove.
//!
//! Transfers reachability-closed slices of the predecessor DAG between
//! stores and reconciles tag sets. Pulls exclude everything the receiver
//! already has (expressed as a set of tags); pushes validate closure and
//! acyclicity before anything becomes visible. The watch hub broadcasts
//! tag changes to streaming subscribers, each of which tracks what it has
//! already announced and only ships the newly reachable delta.

pub mod error;
pub mod transfer;
pub mod watch;

pub use error::{SyncError, SyncResult};
pub use transfer::{pull_keys, pull_tags, push_keys, push_tags};
pub use watch::{TagChange, WatchDelta, WatchHub, WatchSession};
