use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide monotonic event counter.
///
/// Watch notifications and other observed-change orderings are stamped
/// from a single clock so that "happened after" is well defined within one
/// process. The counter never goes backwards; increments are atomic.
#[derive(Debug, Default)]
pub struct EventClock {
    ticks: AtomicU64,
}

impl EventClock {
    /// A clock starting at zero.
    pub const fn new() -> Self {
        Self {
            ticks: AtomicU64::new(0),
        }
    }

    /// Advance the clock and return the new tick.
    pub fn tick(&self) -> u64 {
        self.ticks.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// The last tick handed out (0 if none yet).
    pub fn now(&self) -> u64 {
        self.ticks.load(Ordering::SeqCst)
    }
}
