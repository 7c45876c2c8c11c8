//! Append-only structured event record.
//!
//! The log is the single structure with interior mutability shared by the
//! keyboard, capture, and controller threads. One mutex guards the
//! append-only sequence; timestamps are assigned under the lock from the
//! log's own monotonic epoch, so event order and timestamp order agree.

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    StateTransition,
    KeyDown,
    KeyUp,
    ChordMatch,
    ChordRelease,
    CancelPressed,
    RecordingStarted,
    RecordingStopped,
    RecordingCancelled,
    Timeout,
    SilenceDetected,
    Error,
    Enable,
    Disable,
}

/// Closed scalar union for event payload values.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    Str(String),
    U64(u64),
    I64(i64),
    F64(f64),
    Bool(bool),
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::Str(v.to_string())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Scalar::Str(v)
    }
}

impl From<u64> for Scalar {
    fn from(v: u64) -> Self {
        Scalar::U64(v)
    }
}

impl From<usize> for Scalar {
    fn from(v: usize) -> Self {
        Scalar::U64(v as u64)
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::I64(v)
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::F64(v)
    }
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Scalar::Bool(v)
    }
}

pub type EventData = BTreeMap<&'static str, Scalar>;

#[derive(Debug, Clone, Serialize)]
pub struct PttEvent {
    pub ts_ms: u64,
    pub kind: EventKind,
    pub data: EventData,
}

pub struct EventLog {
    epoch: Instant,
    events: Mutex<Vec<PttEvent>>,
}

static GLOBAL_LOG: Lazy<Arc<EventLog>> = Lazy::new(|| Arc::new(EventLog::new()));

impl EventLog {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            events: Mutex::new(Vec::new()),
        }
    }

    /// Process-wide log for diagnostics. Tests that use it must call
    /// [`EventLog::reset_global`] to isolate themselves.
    pub fn global() -> Arc<EventLog> {
        Arc::clone(&GLOBAL_LOG)
    }

    pub fn reset_global() {
        GLOBAL_LOG.clear();
    }

    pub fn log(&self, kind: EventKind) {
        self.log_with(kind, EventData::new());
    }

    pub fn log_with(&self, kind: EventKind, data: EventData) {
        let mut events = self.events.lock();
        let ts_ms = self.epoch.elapsed().as_millis() as u64;
        events.push(PttEvent { ts_ms, kind, data });
    }

    pub fn events(&self) -> Vec<PttEvent> {
        self.events.lock().clone()
    }

    pub fn events_where<F>(&self, filter: F) -> Vec<PttEvent>
    where
        F: Fn(&PttEvent) -> bool,
    {
        self.events.lock().iter().filter(|e| filter(e)).cloned().collect()
    }

    pub fn kind_count(&self, kind: EventKind) -> usize {
        self.events.lock().iter().filter(|e| e.kind == kind).count()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }

    /// One JSON object per line, oldest first.
    pub fn to_json_lines(&self) -> String {
        let events = self.events.lock();
        let mut out = String::new();
        for event in events.iter() {
            if let Ok(line) = serde_json::to_string(event) {
                out.push_str(&line);
                out.push('\n');
            }
        }
        out
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience for building event payloads:
/// `event_data! { "trigger" => "enable", "samples" => 320usize }`.
#[macro_export]
macro_rules! event_data {
    ($($key:expr => $value:expr),* $(,)?) => {{
        let mut data = $crate::event_log::EventData::new();
        $(data.insert($key, $crate::event_log::Scalar::from($value));)*
        data
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn append_and_filter() {
        let log = EventLog::new();
        log.log(EventKind::Enable);
        log.log_with(EventKind::KeyDown, event_data! { "key" => "Ctrl" });
        log.log_with(EventKind::KeyDown, event_data! { "key" => "Space" });
        log.log(EventKind::ChordMatch);

        assert_eq!(log.len(), 4);
        assert_eq!(log.kind_count(EventKind::KeyDown), 2);

        let downs = log.events_where(|e| e.kind == EventKind::KeyDown);
        assert_eq!(downs.len(), 2);
        assert_eq!(downs[0].data["key"], Scalar::Str("Ctrl".into()));
    }

    #[test]
    fn timestamps_are_monotonic() {
        let log = EventLog::new();
        for _ in 0..50 {
            log.log(EventKind::KeyDown);
        }
        let events = log.events();
        for pair in events.windows(2) {
            assert!(pair[0].ts_ms <= pair[1].ts_ms);
        }
    }

    #[test]
    fn concurrent_logging_keeps_every_event() {
        let log = Arc::new(EventLog::new());
        let mut handles = Vec::new();
        for _ in 0..4 {
            let log = Arc::clone(&log);
            handles.push(std::thread::spawn(move || {
                for _ in 0..250 {
                    log.log(EventKind::KeyDown);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(log.len(), 1000);
    }

    #[test]
    fn clear_resets() {
        let log = EventLog::new();
        log.log(EventKind::Enable);
        assert!(!log.is_empty());
        log.clear();
        assert!(log.is_empty());
    }

    #[test]
    fn json_lines_output() {
        let log = EventLog::new();
        log.log_with(EventKind::RecordingStopped, event_data! { "samples" => 2880usize });
        let out = log.to_json_lines();
        assert!(out.contains("\"recording_stopped\""));
        assert!(out.contains("2880"));
        assert_eq!(out.lines().count(), 1);
    }
}
