//! `Clock`: the narrow time source the core consumes. Second precision is
//! sufficient for license timing; the core never needs sub-second ordering.

use std::time::{SystemTime, UNIX_EPOCH};

pub trait Clock: Send + Sync {
    /// Current epoch seconds.
    fn now(&self) -> u64;
}

/// `Clock` backed by the system wall clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }
}

/// A clock pinned to a fixed value, used by tests that need reproducible
/// `now()` readings.
#[derive(Clone, Copy, Debug)]
pub struct FixedClock(pub u64);

impl Clock for FixedClock {
    fn now(&self) -> u64 {
        self.0
    }
}
