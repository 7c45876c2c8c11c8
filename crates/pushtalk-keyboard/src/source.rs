//! Keyboard event source: backend + chord tracker + bounded queue.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

use pushtalk_foundation::KeyboardError;

use crate::backend::{EventSink, KeyboardBackend};
use crate::chord::{ChordId, ChordTracker, KeyChord};
use crate::queue::{EventQueue, KeyboardEvent};

const DEFAULT_QUEUE_CAPACITY: usize = 64;

pub struct KeyboardSource {
    backend: Box<dyn KeyboardBackend>,
    tracker: Arc<Mutex<ChordTracker>>,
    queue: Arc<EventQueue>,
    sink: EventSink,
    running: bool,
}

impl KeyboardSource {
    pub fn new(backend: Box<dyn KeyboardBackend>) -> Self {
        Self::with_queue_capacity(backend, DEFAULT_QUEUE_CAPACITY)
    }

    pub fn with_queue_capacity(backend: Box<dyn KeyboardBackend>, capacity: usize) -> Self {
        let tracker = Arc::new(Mutex::new(ChordTracker::new()));
        let queue = Arc::new(EventQueue::with_capacity(capacity));
        let sink = EventSink::new(Arc::clone(&tracker), Arc::clone(&queue));
        Self {
            backend,
            tracker,
            queue,
            sink,
            running: false,
        }
    }

    pub fn register(&self, id: ChordId, chord: KeyChord) {
        self.tracker.lock().register(id, chord);
    }

    pub fn register_cancel(&self, chord: KeyChord) {
        self.tracker.lock().register_cancel(chord);
    }

    /// Begin OS monitoring. Fails with `AlreadyRunning` if called twice
    /// without an intervening `stop`.
    pub fn start(&mut self) -> Result<(), KeyboardError> {
        if self.running {
            return Err(KeyboardError::AlreadyRunning);
        }
        self.backend.start(self.sink.clone())?;
        self.sink.arm();
        self.running = true;
        tracing::debug!(backend = self.backend.name(), "keyboard source started");
        Ok(())
    }

    /// Stop monitoring. Idempotent; after return no further events are
    /// enqueued (already-queued events remain readable).
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.sink.disarm();
        self.backend.stop();
        self.tracker.lock().clear_held();
        self.running = false;
        tracing::debug!(backend = self.backend.name(), "keyboard source stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Fetch-and-clear a fatal monitor failure raised after start.
    pub fn take_error(&mut self) -> Option<KeyboardError> {
        if self.running {
            self.backend.take_error()
        } else {
            None
        }
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<KeyboardEvent> {
        self.queue.recv_timeout(timeout)
    }

    pub fn try_recv(&self) -> Option<KeyboardEvent> {
        self.queue.try_recv()
    }

    pub fn dropped_raw(&self) -> u64 {
        self.queue.dropped_raw()
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }
}

impl Drop for KeyboardSource {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{FailingBackend, ScriptedBackend};
    use crate::keys::KeyToken;

    fn chord(s: &str) -> KeyChord {
        s.parse().unwrap()
    }

    #[test]
    fn start_stop_lifecycle() {
        let (backend, handle) = ScriptedBackend::new();
        let mut source = KeyboardSource::new(Box::new(backend));
        source.register(0, chord("ctrl+space"));

        source.start().unwrap();
        assert!(source.is_running());
        assert!(matches!(source.start(), Err(KeyboardError::AlreadyRunning)));

        handle.press(KeyToken::Ctrl);
        handle.press(KeyToken::Space);

        assert_eq!(source.try_recv(), Some(KeyboardEvent::KeyDown(KeyToken::Ctrl)));
        assert_eq!(source.try_recv(), Some(KeyboardEvent::KeyDown(KeyToken::Space)));
        assert_eq!(source.try_recv(), Some(KeyboardEvent::ChordMatch(0)));

        source.stop();
        source.stop(); // idempotent
        handle.press(KeyToken::Ctrl);
        assert_eq!(source.try_recv(), None);
    }

    #[test]
    fn restart_after_stop_clears_held_state() {
        let (backend, handle) = ScriptedBackend::new();
        let mut source = KeyboardSource::new(Box::new(backend));
        source.register(0, chord("ctrl+space"));

        source.start().unwrap();
        handle.press(KeyToken::Ctrl);
        source.stop();
        let _ = source.queue.drain();

        // Ctrl was held at stop; the new session must not remember it.
        source.start().unwrap();
        handle.press(KeyToken::Space);
        let events = source.queue.drain();
        assert!(!events.contains(&KeyboardEvent::ChordMatch(0)));
    }

    #[test]
    fn failing_backend_propagates_and_leaves_stopped() {
        let backend = FailingBackend {
            error: || KeyboardError::PermissionDenied("accessibility not granted".into()),
        };
        let mut source = KeyboardSource::new(Box::new(backend));
        assert!(matches!(
            source.start(),
            Err(KeyboardError::PermissionDenied(_))
        ));
        assert!(!source.is_running());
    }

    #[test]
    fn cancel_chord_delivery() {
        let (backend, handle) = ScriptedBackend::new();
        let mut source = KeyboardSource::new(Box::new(backend));
        source.register_cancel(KeyChord::single(KeyToken::Esc));
        source.start().unwrap();

        handle.tap(KeyToken::Esc);
        let events: Vec<_> = std::iter::from_fn(|| source.try_recv()).collect();
        assert!(events.contains(&KeyboardEvent::CancelPressed));
    }
}
