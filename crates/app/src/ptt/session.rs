//! Synchronous "record one utterance" bridge.
//!
//! The surrounding system calls the recorder from a worker thread and
//! expects a blocking `(pcm, speech_detected)` answer. The session turns
//! the controller's callbacks into a one-shot completion signal the
//! caller parks on.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use pushtalk_audio::MicCapture;
use pushtalk_foundation::{uptime_clock, CancelReason, PushTalkError};
use pushtalk_keyboard::{detect_backend, KeyboardSource};
use pushtalk_telemetry::EventLog;

use crate::config::{duration_from_secs, PttMode, PttSettings};
use crate::ptt::controller::{ControllerThread, PttController};

/// Slack added to the caller's wait beyond the session cap, covering
/// finalize/teardown latency.
const WAIT_SLACK: Duration = Duration::from_secs(2);

#[derive(Debug)]
pub enum SessionOutcome {
    /// Recording stopped normally; the buffer may legally be empty.
    Stopped(Vec<i16>),
    Cancelled(CancelReason),
    Failed(String),
}

/// One-shot completion signal. Callbacks race through cloned notifiers;
/// the first outcome wins and the rest are dropped.
pub struct RecordingSession {
    tx: Sender<SessionOutcome>,
    rx: Receiver<SessionOutcome>,
}

#[derive(Clone)]
pub struct SessionNotifier {
    tx: Sender<SessionOutcome>,
}

impl SessionNotifier {
    pub fn signal(&self, outcome: SessionOutcome) {
        let _ = self.tx.try_send(outcome);
    }
}

impl RecordingSession {
    pub fn new() -> Self {
        let (tx, rx) = bounded(1);
        Self { tx, rx }
    }

    pub fn notifier(&self) -> SessionNotifier {
        SessionNotifier {
            tx: self.tx.clone(),
        }
    }

    pub fn wait(&self) -> Option<SessionOutcome> {
        self.rx.recv().ok()
    }

    pub fn wait_timeout(&self, timeout: Duration) -> Option<SessionOutcome> {
        match self.rx.recv_timeout(timeout) {
            Ok(outcome) => Some(outcome),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    pub fn try_take(&self) -> Option<SessionOutcome> {
        self.rx.try_recv().ok()
    }
}

impl Default for RecordingSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Wire a controller's callbacks into a session's one-shot.
pub fn wire_session(controller: &mut PttController, session: &RecordingSession) {
    let stop_notifier = session.notifier();
    controller.callbacks.on_recording_stop = Some(Box::new(move |buffer| {
        stop_notifier.signal(SessionOutcome::Stopped(buffer));
    }));

    let cancel_notifier = session.notifier();
    controller.callbacks.on_recording_cancel = Some(Box::new(move |reason| {
        cancel_notifier.signal(SessionOutcome::Cancelled(reason));
    }));

    let error_notifier = session.notifier();
    controller.callbacks.on_error = Some(Box::new(move |err| {
        error_notifier.signal(SessionOutcome::Failed(err.to_string()));
    }));
}

/// Derive the per-session config from the global settings plus the four
/// caller parameters. Disabling silence detection coerces Hybrid to
/// Hold; the other modes are unaffected.
pub fn effective_config(
    settings: &PttSettings,
    max_duration_s: f64,
    disable_silence_detection: bool,
    min_duration_s: f64,
    vad_aggressiveness: u8,
) -> Result<crate::config::PttConfig, PushTalkError> {
    let mut config = settings.to_config()?;
    config.max_duration = duration_from_secs("max_duration", max_duration_s)?;
    config.min_duration = duration_from_secs("min_duration", min_duration_s)?;
    config.vad_aggressiveness = vad_aggressiveness;
    if disable_silence_detection && config.mode == PttMode::Hybrid {
        tracing::debug!("silence detection disabled; coercing hybrid mode to hold");
        config.mode = PttMode::Hold;
    }
    config.validate().map_err(PushTalkError::from)?;
    Ok(config)
}

/// Record one utterance, blocking the calling worker thread.
///
/// Returns `(pcm, true)` when the recording stopped normally and
/// `(empty, false)` on cancel, timeout, or a mid-recording capture
/// failure. Enable-time failures (permissions, unsupported environment,
/// bad config) are returned as errors for the shim to fall back on.
pub fn record_with_ptt(
    settings: &PttSettings,
    max_duration_s: f64,
    disable_silence_detection: bool,
    min_duration_s: f64,
    vad_aggressiveness: u8,
) -> Result<(Vec<i16>, bool), PushTalkError> {
    let config = effective_config(
        settings,
        max_duration_s,
        disable_silence_detection,
        min_duration_s,
        vad_aggressiveness,
    )?;

    let backend = detect_backend()?;
    let keyboard = KeyboardSource::new(backend);
    let capture = Box::new(MicCapture::new(settings.device.clone()));
    let max_duration = config.max_duration;

    let mut controller = PttController::new(
        config,
        keyboard,
        capture,
        uptime_clock(),
        EventLog::global(),
    );

    let session = RecordingSession::new();
    wire_session(&mut controller, &session);

    controller.enable()?;
    let thread = ControllerThread::spawn(controller);

    let outcome = if max_duration.is_zero() {
        session.wait()
    } else {
        session.wait_timeout(max_duration + WAIT_SLACK)
    };

    if let Some(mut controller) = thread.stop() {
        controller.disable();
    }
    // A disable-driven cancel may have landed after the wait gave up.
    let outcome = outcome.or_else(|| session.try_take());

    match outcome {
        Some(SessionOutcome::Stopped(buffer)) => {
            tracing::info!(samples = buffer.len(), "PTT recording delivered");
            Ok((buffer, true))
        }
        Some(SessionOutcome::Cancelled(reason)) => {
            tracing::info!(reason = reason.as_str(), "PTT recording cancelled");
            Ok((Vec::new(), false))
        }
        Some(SessionOutcome::Failed(message)) => {
            // The turn is consumed; surface the empty outcome rather than
            // an error so the shim does not re-record.
            tracing::warn!(%message, "PTT recording failed mid-session");
            Ok((Vec::new(), false))
        }
        None => {
            tracing::warn!("PTT session ended without an outcome");
            Ok((Vec::new(), false))
        }
    }
}
