use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Shared counters for cross-thread session monitoring.
#[derive(Clone, Default)]
pub struct SessionStats {
    pub chord_matches: Arc<AtomicU64>,
    pub recordings_started: Arc<AtomicU64>,
    pub recordings_stopped: Arc<AtomicU64>,
    pub recordings_cancelled: Arc<AtomicU64>,
    pub frames_captured: Arc<AtomicU64>,
    pub raw_events_dropped: Arc<AtomicU64>,
}

impl SessionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> SessionStatsSnapshot {
        SessionStatsSnapshot {
            chord_matches: self.chord_matches.load(Ordering::Relaxed),
            recordings_started: self.recordings_started.load(Ordering::Relaxed),
            recordings_stopped: self.recordings_stopped.load(Ordering::Relaxed),
            recordings_cancelled: self.recordings_cancelled.load(Ordering::Relaxed),
            frames_captured: self.frames_captured.load(Ordering::Relaxed),
            raw_events_dropped: self.raw_events_dropped.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionStatsSnapshot {
    pub chord_matches: u64,
    pub recordings_started: u64,
    pub recordings_stopped: u64,
    pub recordings_cancelled: u64,
    pub frames_captured: u64,
    pub raw_events_dropped: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_counters() {
        let stats = SessionStats::new();
        stats.chord_matches.fetch_add(3, Ordering::Relaxed);
        stats.recordings_started.fetch_add(1, Ordering::Relaxed);

        let snap = stats.snapshot();
        assert_eq!(snap.chord_matches, 3);
        assert_eq!(snap.recordings_started, 1);
        assert_eq!(snap.recordings_cancelled, 0);
    }
}
