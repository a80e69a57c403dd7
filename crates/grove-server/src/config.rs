use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

use grove_sync::watch::DEFAULT_WATCH_BUFFER;
use grove_wire::MAX_FRAME_BYTES;

/// Server tuning knobs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the TCP listener binds to.
    pub bind_addr: SocketAddr,
    /// Upper bound on a single frame's payload.
    pub max_frame_bytes: usize,
    /// Undelivered changes buffered per watch hub before slow
    /// subscribers are disconnected.
    pub watch_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:7461".parse().expect("static addr"),
            max_frame_bytes: MAX_FRAME_BYTES,
            watch_buffer: DEFAULT_WATCH_BUFFER,
        }
    }
}
