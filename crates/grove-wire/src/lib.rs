//! Binary wire protocol for grove.
//!
//! Every transmittable type implements [`Wire`]: an exact size
//! computation, a serializer appending into a buffer, and a cursor-based
//! deserializer. On a channel, every message travels as one frame —
//! a big-endian `u32` length prefix followed by exactly that many payload
//! bytes. Request payloads start with an [`Action`] discriminant byte;
//! response payloads are bare.
//!
//! Encodings are canonical: sets serialize ascending regardless of how
//! they were built, so equal sets encode to equal bytes.

pub mod action;
pub mod codec;
pub mod error;
pub mod frame;
pub mod message;

pub use action::Action;
pub use codec::{Wire, WireReader};
pub use error::{WireError, WireResult};
pub use frame::{read_frame, write_frame, write_message, MAX_FRAME_BYTES};
pub use message::{FailureCode, RemoteFailure, Request, WatchEvent};
