//! Recorder selection shim.
//!
//! Presents the same signature as the surrounding system's auto-VAD
//! recorder and routes to the PTT path when enabled. An error out of the
//! PTT recorder (permissions, unsupported environment, bad config) falls
//! back to the auto-VAD recorder once, so a keyboard failure never loses
//! the turn.

use pushtalk_foundation::PushTalkError;

use crate::config::Settings;
use crate::ptt::session::record_with_ptt;

/// Contract of the external auto-VAD recorder: mono 16 kHz i16 plus a
/// speech-detected flag; `(empty, false)` is the no-speech outcome.
pub trait UtteranceRecorder: Send + Sync {
    fn record(
        &self,
        max_duration_s: f64,
        disable_silence_detection: bool,
        min_duration_s: f64,
        vad_aggressiveness: u8,
    ) -> (Vec<i16>, bool);
}

type PttRecordFn = Box<
    dyn Fn(&crate::config::PttSettings, f64, bool, f64, u8) -> Result<(Vec<i16>, bool), PushTalkError>
        + Send
        + Sync,
>;

pub struct RecorderShim {
    settings: Settings,
    fallback: Box<dyn UtteranceRecorder>,
    ptt: PttRecordFn,
}

impl RecorderShim {
    pub fn new(settings: Settings, fallback: Box<dyn UtteranceRecorder>) -> Self {
        Self {
            settings,
            fallback,
            ptt: Box::new(record_with_ptt),
        }
    }

    /// Swap the PTT entry point; test suites inject deterministic
    /// recorders here.
    pub fn with_ptt_recorder(mut self, ptt: PttRecordFn) -> Self {
        self.ptt = ptt;
        self
    }

    pub fn record(
        &self,
        max_duration_s: f64,
        disable_silence_detection: bool,
        min_duration_s: f64,
        vad_aggressiveness: u8,
    ) -> (Vec<i16>, bool) {
        if !self.settings.ptt.enabled {
            return self.fallback.record(
                max_duration_s,
                disable_silence_detection,
                min_duration_s,
                vad_aggressiveness,
            );
        }

        match (self.ptt)(
            &self.settings.ptt,
            max_duration_s,
            disable_silence_detection,
            min_duration_s,
            vad_aggressiveness,
        ) {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::warn!(%err, "PTT recorder unavailable; retrying with auto-VAD recorder");
                self.fallback.record(
                    max_duration_s,
                    disable_silence_detection,
                    min_duration_s,
                    vad_aggressiveness,
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pushtalk_foundation::KeyboardError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingRecorder {
        calls: Arc<AtomicUsize>,
        result: (Vec<i16>, bool),
    }

    impl UtteranceRecorder for CountingRecorder {
        fn record(&self, _: f64, _: bool, _: f64, _: u8) -> (Vec<i16>, bool) {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone()
        }
    }

    fn settings(enabled: bool) -> Settings {
        let mut settings = Settings::default();
        settings.ptt.enabled = enabled;
        settings
    }

    #[test]
    fn disabled_ptt_routes_to_fallback() {
        let calls = Arc::new(AtomicUsize::new(0));
        let shim = RecorderShim::new(
            settings(false),
            Box::new(CountingRecorder {
                calls: Arc::clone(&calls),
                result: (vec![9; 160], true),
            }),
        )
        .with_ptt_recorder(Box::new(|_, _, _, _, _| {
            panic!("PTT path must not run when disabled")
        }));

        let (pcm, speech) = shim.record(30.0, false, 0.5, 2);
        assert_eq!(pcm.len(), 160);
        assert!(speech);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn enabled_ptt_success_skips_fallback() {
        let calls = Arc::new(AtomicUsize::new(0));
        let shim = RecorderShim::new(
            settings(true),
            Box::new(CountingRecorder {
                calls: Arc::clone(&calls),
                result: (vec![], false),
            }),
        )
        .with_ptt_recorder(Box::new(|_, _, _, _, _| Ok((vec![5; 320], true))));

        let (pcm, speech) = shim.record(30.0, false, 0.5, 2);
        assert_eq!(pcm.len(), 320);
        assert!(speech);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn ptt_error_falls_back_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let shim = RecorderShim::new(
            settings(true),
            Box::new(CountingRecorder {
                calls: Arc::clone(&calls),
                result: (vec![1; 480], true),
            }),
        )
        .with_ptt_recorder(Box::new(|_, _, _, _, _| {
            Err(KeyboardError::PermissionDenied("denied".into()).into())
        }));

        let (pcm, speech) = shim.record(30.0, false, 0.5, 2);
        assert_eq!(pcm.len(), 480);
        assert!(speech);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn ptt_empty_outcome_is_final() {
        // A cancelled/timed-out PTT turn is consumed; the fallback must
        // not re-record.
        let calls = Arc::new(AtomicUsize::new(0));
        let shim = RecorderShim::new(
            settings(true),
            Box::new(CountingRecorder {
                calls: Arc::clone(&calls),
                result: (vec![1; 480], true),
            }),
        )
        .with_ptt_recorder(Box::new(|_, _, _, _, _| Ok((Vec::new(), false))));

        let (pcm, speech) = shim.record(30.0, false, 0.5, 2);
        assert!(pcm.is_empty());
        assert!(!speech);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
