//! Bounded event queue with a raw/derived delivery policy.
//!
//! Raw key events are best-effort diagnostics; derived chord edges are
//! load-bearing. When the queue is full, the oldest raw entry is evicted
//! to make room, and derived entries are admitted past the bound when no
//! raw entry remains. Derived events are therefore never lost, which the
//! controller's correctness depends on.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::chord::ChordId;
use crate::keys::KeyToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyboardEvent {
    KeyDown(KeyToken),
    KeyUp(KeyToken),
    ChordMatch(ChordId),
    ChordRelease(ChordId),
    CancelPressed,
}

impl KeyboardEvent {
    pub fn is_derived(&self) -> bool {
        matches!(
            self,
            KeyboardEvent::ChordMatch(_)
                | KeyboardEvent::ChordRelease(_)
                | KeyboardEvent::CancelPressed
        )
    }
}

pub struct EventQueue {
    inner: Mutex<VecDeque<KeyboardEvent>>,
    available: Condvar,
    capacity: usize,
    dropped_raw: AtomicU64,
}

impl EventQueue {
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "queue capacity must be positive");
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            available: Condvar::new(),
            capacity,
            dropped_raw: AtomicU64::new(0),
        }
    }

    pub fn push(&self, event: KeyboardEvent) {
        let mut queue = self.inner.lock();
        if !event.is_derived() && queue.len() >= self.capacity {
            if let Some(pos) = queue.iter().position(|e| !e.is_derived()) {
                queue.remove(pos);
            } else {
                // Every queued entry is derived; shed the incoming raw
                // event instead.
                drop(queue);
                self.dropped_raw.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(?event, "raw keyboard event shed under backpressure");
                return;
            }
            self.dropped_raw.fetch_add(1, Ordering::Relaxed);
        }
        queue.push_back(event);
        drop(queue);
        self.available.notify_one();
    }

    pub fn try_recv(&self) -> Option<KeyboardEvent> {
        self.inner.lock().pop_front()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<KeyboardEvent> {
        let deadline = Instant::now() + timeout;
        let mut queue = self.inner.lock();
        loop {
            if let Some(event) = queue.pop_front() {
                return Some(event);
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            let _ = self.available.wait_for(&mut queue, deadline - now);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn dropped_raw(&self) -> u64 {
        self.dropped_raw.load(Ordering::Relaxed)
    }

    pub fn drain(&self) -> Vec<KeyboardEvent> {
        self.inner.lock().drain(..).collect()
    }
}
