use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::types::TimestampMs;

/// Injectable time source. The store never reads the system clock directly
/// so that expiry and purge behavior stay deterministic under test.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> TimestampMs;
}

/// Production clock backed by `SystemTime`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> TimestampMs {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as TimestampMs)
            .unwrap_or_default()
    }
}

/// Manually advanced clock for deterministic tests and simulations.
#[derive(Debug, Default)]
pub struct SimClock {
    millis: AtomicI64,
}

impl SimClock {
    pub fn new(start_millis: TimestampMs) -> Self {
        Self {
            millis: AtomicI64::new(start_millis),
        }
    }

    pub fn set(&self, millis: TimestampMs) {
        self.millis.store(millis, Ordering::SeqCst);
    }

    pub fn advance(&self, delta_millis: TimestampMs) {
        self.millis.fetch_add(delta_millis, Ordering::SeqCst);
    }
}

impl Clock for SimClock {
    fn now_millis(&self) -> TimestampMs {
        self.millis.load(Ordering::SeqCst)
    }
}
