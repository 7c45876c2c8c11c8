//! Keyboard backend abstraction.
//!
//! A backend owns the OS-level hook and feeds normalized press/release
//! pairs into an [`EventSink`]; chord derivation and queueing happen in
//! the sink so every backend gets identical semantics.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use pushtalk_foundation::KeyboardError;

use crate::chord::ChordTracker;
use crate::keys::KeyToken;
use crate::queue::EventQueue;

/// Shared entry point for raw key events. The armed gate lets
/// `KeyboardSource::stop` guarantee that no further events are delivered
/// even while an OS hook thread keeps running underneath.
#[derive(Clone)]
pub struct EventSink {
    tracker: Arc<Mutex<ChordTracker>>,
    queue: Arc<EventQueue>,
    armed: Arc<AtomicBool>,
}

impl EventSink {
    pub fn new(tracker: Arc<Mutex<ChordTracker>>, queue: Arc<EventQueue>) -> Self {
        Self {
            tracker,
            queue,
            armed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn accept(&self, token: KeyToken, pressed: bool) {
        if !self.armed.load(Ordering::SeqCst) {
            return;
        }
        let mut events = Vec::with_capacity(4);
        self.tracker.lock().on_key(token, pressed, &mut events);
        for event in events {
            self.queue.push(event);
        }
    }

    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    pub fn disarm(&self) {
        self.armed.store(false, Ordering::SeqCst);
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::SeqCst)
    }
}

pub trait KeyboardBackend: Send {
    /// Begin delivering events into `sink`. Implementations must return
    /// promptly; monitoring runs on a backend-owned thread.
    fn start(&mut self, sink: EventSink) -> Result<(), KeyboardError>;

    /// Stop delivering events. Idempotent.
    fn stop(&mut self);

    /// Fetch-and-clear a fatal monitor failure that occurred after a
    /// successful `start`. The controller treats it as a session-ending
    /// error.
    fn take_error(&mut self) -> Option<KeyboardError> {
        None
    }

    fn name(&self) -> &'static str;
}

/// Pick the best backend for the current environment.
pub fn detect_backend() -> Result<Box<dyn KeyboardBackend>, KeyboardError> {
    #[cfg(target_os = "linux")]
    {
        let has_session = std::env::var_os("DISPLAY").is_some()
            || std::env::var_os("WAYLAND_DISPLAY").is_some();
        if !has_session {
            return Err(KeyboardError::Unsupported(
                "no X11/Wayland display session for global key capture".to_string(),
            ));
        }
    }
    Ok(Box::new(crate::rdev_backend::RdevBackend::new()))
}

/// In-process backend driven by an injection handle. Used by the test
/// suites and by headless automation that synthesizes key traffic.
pub struct ScriptedBackend {
    slot: Arc<Mutex<Option<EventSink>>>,
    monitor_error: Arc<Mutex<Option<KeyboardError>>>,
}

/// Cloneable driver for a [`ScriptedBackend`]. Injections are silently
/// ignored while the backend is stopped.
#[derive(Clone)]
pub struct ScriptedHandle {
    slot: Arc<Mutex<Option<EventSink>>>,
    monitor_error: Arc<Mutex<Option<KeyboardError>>>,
}

impl ScriptedBackend {
    pub fn new() -> (Self, ScriptedHandle) {
        let slot = Arc::new(Mutex::new(None));
        let monitor_error = Arc::new(Mutex::new(None));
        (
            Self {
                slot: Arc::clone(&slot),
                monitor_error: Arc::clone(&monitor_error),
            },
            ScriptedHandle {
                slot,
                monitor_error,
            },
        )
    }
}

impl KeyboardBackend for ScriptedBackend {
    fn start(&mut self, sink: EventSink) -> Result<(), KeyboardError> {
        *self.slot.lock() = Some(sink);
        Ok(())
    }

    fn stop(&mut self) {
        self.slot.lock().take();
    }

    fn take_error(&mut self) -> Option<KeyboardError> {
        self.monitor_error.lock().take()
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

impl ScriptedHandle {
    pub fn press(&self, token: KeyToken) {
        if let Some(sink) = self.slot.lock().as_ref() {
            sink.accept(token, true);
        }
    }

    pub fn release(&self, token: KeyToken) {
        if let Some(sink) = self.slot.lock().as_ref() {
            sink.accept(token, false);
        }
    }

    pub fn tap(&self, token: KeyToken) {
        self.press(token);
        self.release(token);
    }

    /// Simulate the OS hook dying mid-session.
    pub fn raise_monitor_error(&self, error: KeyboardError) {
        *self.monitor_error.lock() = Some(error);
    }

    pub fn is_attached(&self) -> bool {
        self.slot.lock().is_some()
    }
}

/// Backend whose start always fails; used to exercise permission-denied
/// paths without an OS hook.
pub struct FailingBackend {
    pub error: fn() -> KeyboardError,
}

impl KeyboardBackend for FailingBackend {
    fn start(&mut self, _sink: EventSink) -> Result<(), KeyboardError> {
        Err((self.error)())
    }

    fn stop(&mut self) {}

    fn name(&self) -> &'static str {
        "failing"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::KeyboardEvent;

    fn sink_fixture() -> (EventSink, Arc<EventQueue>) {
        let tracker = Arc::new(Mutex::new(ChordTracker::new()));
        let queue = Arc::new(EventQueue::with_capacity(16));
        (EventSink::new(tracker, Arc::clone(&queue)), queue)
    }

    #[test]
    fn disarmed_sink_drops_everything() {
        let (sink, queue) = sink_fixture();
        sink.accept(KeyToken::Ctrl, true);
        assert!(queue.is_empty());

        sink.arm();
        sink.accept(KeyToken::Ctrl, true);
        assert_eq!(queue.len(), 1);

        sink.disarm();
        sink.accept(KeyToken::Ctrl, false);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn scripted_backend_round_trip() {
        let (mut backend, handle) = ScriptedBackend::new();
        let (sink, queue) = sink_fixture();
        sink.arm();

        assert!(!handle.is_attached());
        backend.start(sink).unwrap();
        assert!(handle.is_attached());

        handle.tap(KeyToken::Space);
        assert_eq!(queue.try_recv(), Some(KeyboardEvent::KeyDown(KeyToken::Space)));
        assert_eq!(queue.try_recv(), Some(KeyboardEvent::KeyUp(KeyToken::Space)));

        backend.stop();
        handle.press(KeyToken::Space);
        assert!(queue.is_empty());
    }
}
