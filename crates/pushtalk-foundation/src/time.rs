//! Session time source.
//!
//! The controller's timers (hold gate, session cap, silence threshold)
//! all work in whole milliseconds relative to an arbitrary origin, so
//! the time seam is a single `now_ms` reading rather than a full clock.
//! Production uses process uptime; tests drive a step clock forward
//! explicitly and get bit-identical timer decisions on every run.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

pub trait TimeSource: Send + Sync {
    /// Milliseconds elapsed since this source's origin. Monotonic,
    /// never decreasing.
    fn now_ms(&self) -> u64;

    /// Milliseconds elapsed since an earlier `now_ms` reading.
    fn elapsed_ms(&self, since_ms: u64) -> u64 {
        self.now_ms().saturating_sub(since_ms)
    }
}

pub type SharedTimeSource = Arc<dyn TimeSource>;

/// Wall time, anchored at construction.
pub struct UptimeClock {
    origin: Instant,
}

impl UptimeClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for UptimeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for UptimeClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// Test time source that only moves when told to.
pub struct StepClock {
    now_ms: AtomicU64,
}

impl StepClock {
    pub fn new() -> Self {
        Self {
            now_ms: AtomicU64::new(0),
        }
    }

    pub fn advance_ms(&self, ms: u64) {
        self.now_ms.fetch_add(ms, Ordering::SeqCst);
    }

    /// Jump to an absolute reading. Must not move time backwards.
    pub fn set_ms(&self, ms: u64) {
        let previous = self.now_ms.swap(ms, Ordering::SeqCst);
        debug_assert!(ms >= previous, "step clock may not run backwards");
    }
}

impl Default for StepClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for StepClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

pub fn uptime_clock() -> SharedTimeSource {
    Arc::new(UptimeClock::new())
}

pub fn step_clock() -> Arc<StepClock> {
    Arc::new(StepClock::new())
}
