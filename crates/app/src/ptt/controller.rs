//! Push-to-talk controller: couples the keyboard source, capture engine,
//! silence detector, and state machine into one decision loop.
//!
//! All state mutation happens on the thread calling `poll`/`pump`; the
//! keyboard and capture threads only feed channels. Timer work (the
//! hold-gate, the session cap, Hybrid silence) reads one millisecond
//! time source, so tests drive the whole lifecycle with a step clock
//! and a scripted backend.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use pushtalk_audio::CaptureEngine;
use pushtalk_foundation::{CancelReason, PushTalkError, SharedTimeSource, TimeSource};
use pushtalk_keyboard::{ChordId, KeyboardEvent, KeyboardSource};
use pushtalk_telemetry::{event_data, EventKind, EventLog, SessionStats};
use pushtalk_vad::{SilenceConfig, SilenceDetector};

use crate::config::{PttConfig, PttMode};
use crate::ptt::state_machine::{PttState, StateMachine, Trigger};

const TRIGGER_CHORD: ChordId = 0;

/// Loop cadence of the production controller thread. Bounds the latency
/// of timer-driven transitions; keyboard events wake the loop earlier.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

fn ms(duration: Duration) -> u64 {
    duration.as_millis() as u64
}

/// Observer hooks invoked on the controller's thread. They must not
/// block; heavy work belongs on the far side of the session signal.
#[derive(Default)]
pub struct ControllerCallbacks {
    pub on_recording_start: Option<Box<dyn FnMut() + Send>>,
    pub on_recording_stop: Option<Box<dyn FnMut(Vec<i16>) + Send>>,
    pub on_recording_cancel: Option<Box<dyn FnMut(CancelReason) + Send>>,
    pub on_error: Option<Box<dyn FnMut(PushTalkError) + Send>>,
}

pub struct PttController {
    config: PttConfig,
    machine: StateMachine,
    keyboard: KeyboardSource,
    capture: Box<dyn CaptureEngine>,
    silence: SilenceDetector,
    log: Arc<EventLog>,
    stats: SessionStats,
    clock: SharedTimeSource,
    pub callbacks: ControllerCallbacks,
    enabled: bool,
    enabled_at_ms: Option<u64>,
    session_done: bool,
    pressed_at_ms: Option<u64>,
    recording_at_ms: Option<u64>,
}

impl PttController {
    pub fn new(
        config: PttConfig,
        keyboard: KeyboardSource,
        capture: Box<dyn CaptureEngine>,
        clock: SharedTimeSource,
        log: Arc<EventLog>,
    ) -> Self {
        keyboard.register(TRIGGER_CHORD, config.trigger_chord.clone());
        keyboard.register_cancel(config.cancel_chord.clone());
        let silence = SilenceDetector::new(SilenceConfig {
            aggressiveness: config.vad_aggressiveness,
        });
        Self {
            config,
            machine: StateMachine::new(),
            keyboard,
            capture,
            silence,
            log,
            stats: SessionStats::new(),
            clock,
            callbacks: ControllerCallbacks::default(),
            enabled: false,
            enabled_at_ms: None,
            session_done: false,
            pressed_at_ms: None,
            recording_at_ms: None,
        }
    }

    pub fn state(&self) -> PttState {
        self.machine.state()
    }

    pub fn config(&self) -> &PttConfig {
        &self.config
    }

    pub fn stats(&self) -> SessionStats {
        self.stats.clone()
    }

    /// True once the session reached a terminal outcome (stop, cancel,
    /// or disable).
    pub fn session_complete(&self) -> bool {
        self.session_done
    }

    /// Start keyboard monitoring and arm the session. Idempotent; on
    /// failure the state stays `Idle` and no resources are held.
    pub fn enable(&mut self) -> Result<(), PushTalkError> {
        if self.enabled {
            return Ok(());
        }
        self.keyboard.start()?;
        self.enabled_at_ms = Some(self.clock.now_ms());
        self.apply(Trigger::Enable);
        self.enabled = true;
        self.log_kind(
            EventKind::Enable,
            event_data! { "mode" => self.config.mode.as_str() },
        );
        tracing::info!(
            mode = self.config.mode.as_str(),
            chord = %self.config.trigger_chord,
            "PTT controller enabled"
        );
        Ok(())
    }

    /// Cancel any in-flight recording, stop keyboard monitoring, and
    /// return to `Idle`. Idempotent.
    pub fn disable(&mut self) {
        if !self.enabled {
            return;
        }
        if self.machine.state() == PttState::Recording {
            self.capture.discard();
            self.recording_at_ms = None;
            self.stats.recordings_cancelled.fetch_add(1, Ordering::Relaxed);
            self.log_kind(
                EventKind::RecordingCancelled,
                event_data! { "reason" => CancelReason::Disabled.as_str() },
            );
            self.fire_cancel(CancelReason::Disabled);
        }
        if self.machine.is_active() {
            self.apply(Trigger::Disable);
        }
        self.keyboard.stop();
        self.stats
            .raw_events_dropped
            .store(self.keyboard.dropped_raw(), Ordering::Relaxed);
        self.pressed_at_ms = None;
        self.enabled = false;
        self.session_done = true;
        self.log_kind(EventKind::Disable, event_data! {});
        tracing::info!("PTT controller disabled");
    }

    /// One scheduling pass: wait up to `wait` for a keyboard event,
    /// handle it, then run due timer work.
    pub fn poll(&mut self, wait: Duration) {
        if let Some(event) = self.keyboard.recv_timeout(wait) {
            self.handle_keyboard_event(event);
        }
        self.tick();
    }

    /// Drain every already-queued keyboard event, then run timer work.
    /// The deterministic test suites use this between clock advances.
    pub fn pump(&mut self) {
        while let Some(event) = self.keyboard.try_recv() {
            self.handle_keyboard_event(event);
        }
        self.tick();
    }

    fn session_ms(&self) -> u64 {
        self.enabled_at_ms
            .map(|at| self.clock.elapsed_ms(at))
            .unwrap_or(0)
    }

    fn log_kind(&self, kind: EventKind, mut data: pushtalk_telemetry::event_log::EventData) {
        data.insert("at_ms", self.session_ms().into());
        self.log.log_with(kind, data);
    }

    /// Apply a trigger, logging the transition. Returns false (and logs)
    /// on an illegal transition instead of propagating.
    fn apply(&mut self, trigger: Trigger) -> bool {
        match self.machine.apply(trigger) {
            Ok((from, to)) => {
                self.log_kind(
                    EventKind::StateTransition,
                    event_data! {
                        "from" => from.as_str(),
                        "to" => to.as_str(),
                        "trigger" => trigger.as_str(),
                    },
                );
                tracing::debug!(
                    from = from.as_str(),
                    to = to.as_str(),
                    trigger = trigger.as_str(),
                    "state transition"
                );
                true
            }
            Err(err) => {
                self.log_kind(
                    EventKind::Error,
                    event_data! {
                        "error" => "invalid_transition",
                        "from" => err.from.as_str(),
                        "trigger" => err.trigger.as_str(),
                    },
                );
                tracing::warn!(%err, "dropped illegal transition");
                false
            }
        }
    }

    pub fn handle_keyboard_event(&mut self, event: KeyboardEvent) {
        match event {
            KeyboardEvent::KeyDown(token) => {
                self.log_kind(EventKind::KeyDown, event_data! { "key" => token.to_string() });
            }
            KeyboardEvent::KeyUp(token) => {
                self.log_kind(EventKind::KeyUp, event_data! { "key" => token.to_string() });
            }
            KeyboardEvent::ChordMatch(id) if id == TRIGGER_CHORD => {
                self.log_kind(EventKind::ChordMatch, event_data! {});
                self.stats.chord_matches.fetch_add(1, Ordering::Relaxed);
                self.on_chord_match();
            }
            KeyboardEvent::ChordRelease(id) if id == TRIGGER_CHORD => {
                self.log_kind(EventKind::ChordRelease, event_data! {});
                self.on_chord_release();
            }
            KeyboardEvent::CancelPressed => {
                self.log_kind(EventKind::CancelPressed, event_data! {});
                self.on_cancel_pressed();
            }
            KeyboardEvent::ChordMatch(id) | KeyboardEvent::ChordRelease(id) => {
                tracing::debug!(chord = id, "event for unregistered chord dropped");
            }
        }
    }

    fn on_chord_match(&mut self) {
        let now_ms = self.clock.now_ms();
        match self.machine.state() {
            PttState::WaitingForKey => {
                if self.apply(Trigger::ChordMatch) {
                    self.pressed_at_ms = Some(now_ms);
                    if self.config.mode == PttMode::Toggle {
                        // Toggle enters recording on the press edge; the
                        // min-duration gate applies to the stop press.
                        self.begin_recording(Trigger::StartRecording);
                    }
                }
            }
            PttState::Recording if self.config.mode == PttMode::Toggle => {
                let since_entry_ms = self
                    .recording_at_ms
                    .map(|at| now_ms.saturating_sub(at))
                    .unwrap_or(0);
                if since_entry_ms >= ms(self.config.min_duration) {
                    self.stop_recording(Trigger::SecondTogglePress);
                } else {
                    tracing::debug!(
                        elapsed_ms = since_entry_ms,
                        "toggle stop press before min_duration ignored"
                    );
                }
            }
            state => {
                tracing::debug!(state = state.as_str(), "chord match dropped in this state");
            }
        }
    }

    fn on_chord_release(&mut self) {
        match (self.machine.state(), self.config.mode) {
            (PttState::KeyPressed, PttMode::Hold | PttMode::Hybrid) => {
                // Tap shorter than the hold gate: back to waiting, no
                // recording ever started.
                if self.apply(Trigger::ChordReleaseBeforeMin) {
                    self.pressed_at_ms = None;
                }
            }
            (PttState::Recording, PttMode::Hold | PttMode::Hybrid) => {
                self.stop_recording(Trigger::ChordReleaseAfterMin);
            }
            (state, _) => {
                tracing::debug!(state = state.as_str(), "chord release dropped in this state");
            }
        }
    }

    fn on_cancel_pressed(&mut self) {
        match self.machine.state() {
            PttState::Recording => {
                self.cancel_recording(Trigger::CancelPressed, CancelReason::UserCancel);
            }
            PttState::KeyPressed => {
                if self.apply(Trigger::CancelPressed) {
                    self.pressed_at_ms = None;
                }
            }
            state => {
                tracing::debug!(state = state.as_str(), "cancel dropped in this state");
            }
        }
    }

    /// Timer-driven work: the hold gate, the capture-error check, the
    /// session cap, and Hybrid silence.
    pub fn tick(&mut self) {
        if self.enabled {
            if let Some(err) = self.keyboard.take_error() {
                // Fatal monitor exit: without key events no stop
                // condition can ever fire, so shut the session down.
                tracing::error!(%err, "keyboard monitor failed; shutting down session");
                self.log_kind(EventKind::Error, event_data! { "error" => err.to_string() });
                self.fire_error(err.into());
                self.disable();
                return;
            }
        }

        let now_ms = self.clock.now_ms();
        match self.machine.state() {
            PttState::KeyPressed => {
                if matches!(self.config.mode, PttMode::Hold | PttMode::Hybrid) {
                    let held_for_ms = self
                        .pressed_at_ms
                        .map(|at| now_ms.saturating_sub(at))
                        .unwrap_or(0);
                    if held_for_ms >= ms(self.config.min_duration) {
                        self.begin_recording(Trigger::StartRecording);
                    }
                }
            }
            PttState::Recording => {
                if let Some(err) = self.capture.take_error() {
                    self.log_kind(
                        EventKind::Error,
                        event_data! { "error" => err.to_string() },
                    );
                    self.fire_error(err.into());
                    self.cancel_recording(Trigger::CaptureError, CancelReason::CaptureError);
                    return;
                }

                let in_recording_ms = self
                    .recording_at_ms
                    .map(|at| now_ms.saturating_sub(at))
                    .unwrap_or(0);

                if !self.config.max_duration.is_zero()
                    && in_recording_ms >= ms(self.config.max_duration)
                {
                    self.log_kind(
                        EventKind::Timeout,
                        event_data! { "max_duration_ms" => ms(self.config.max_duration) },
                    );
                    self.cancel_recording(Trigger::Timeout, CancelReason::Timeout);
                    return;
                }

                if self.config.mode == PttMode::Hybrid {
                    self.feed_silence_detector();
                    if in_recording_ms >= ms(self.config.min_duration)
                        && self
                            .silence
                            .silence_exceeded(self.config.silence_threshold.as_millis() as u32)
                    {
                        self.log_kind(
                            EventKind::SilenceDetected,
                            event_data! { "silence_ms" => self.silence.silence_duration_ms() as u64 },
                        );
                        self.stop_recording(Trigger::SilenceExceeded);
                    }
                }
            }
            _ => {}
        }
    }

    fn feed_silence_detector(&mut self) {
        for frame in self.capture.poll_frames() {
            if let Err(err) = self.silence.push(&frame.samples) {
                tracing::warn!(%err, "silence detector rejected frame");
            }
        }
    }

    fn begin_recording(&mut self, trigger: Trigger) {
        if !self.apply(trigger) {
            return;
        }
        match self.capture.start() {
            Ok(()) => {
                self.recording_at_ms = Some(self.clock.now_ms());
                self.silence.reset();
                self.stats.recordings_started.fetch_add(1, Ordering::Relaxed);
                self.log_kind(EventKind::RecordingStarted, event_data! {});
                if let Some(cb) = self.callbacks.on_recording_start.as_mut() {
                    cb();
                }
            }
            Err(err) => {
                tracing::error!(%err, "capture failed to start");
                self.log_kind(
                    EventKind::Error,
                    event_data! { "error" => err.to_string() },
                );
                self.fire_error(err.into());
                // Capture never ran, so there is nothing to discard; the
                // state machine still walks the cancel path.
                self.apply(Trigger::CaptureError);
                self.stats.recordings_cancelled.fetch_add(1, Ordering::Relaxed);
                self.log_kind(
                    EventKind::RecordingCancelled,
                    event_data! { "reason" => CancelReason::CaptureError.as_str() },
                );
                self.apply(Trigger::Finalize);
                self.fire_cancel(CancelReason::CaptureError);
                self.finish_session();
            }
        }
    }

    fn stop_recording(&mut self, trigger: Trigger) {
        if !self.apply(trigger) {
            return;
        }
        let buffer = self.capture.stop();
        self.recording_at_ms = None;
        self.pressed_at_ms = None;
        self.stats.recordings_stopped.fetch_add(1, Ordering::Relaxed);
        self.stats
            .frames_captured
            .fetch_add((buffer.len() / pushtalk_audio::FRAME_SIZE_SAMPLES) as u64, Ordering::Relaxed);
        self.log_kind(
            EventKind::RecordingStopped,
            event_data! {
                "trigger" => trigger.as_str(),
                "samples" => buffer.len(),
            },
        );
        self.apply(Trigger::Finalize);
        if let Some(cb) = self.callbacks.on_recording_stop.as_mut() {
            cb(buffer);
        }
        self.finish_session();
    }

    fn cancel_recording(&mut self, trigger: Trigger, reason: CancelReason) {
        if !self.apply(trigger) {
            return;
        }
        self.capture.discard();
        self.recording_at_ms = None;
        self.pressed_at_ms = None;
        self.stats.recordings_cancelled.fetch_add(1, Ordering::Relaxed);
        self.log_kind(
            EventKind::RecordingCancelled,
            event_data! { "reason" => reason.as_str() },
        );
        self.apply(Trigger::Finalize);
        self.fire_cancel(reason);
        self.finish_session();
    }

    /// Walk the terminal tail to `Idle` and mark the session done. The
    /// keyboard source keeps running until `disable`.
    fn finish_session(&mut self) {
        if self.machine.state() == PttState::Processing {
            self.apply(Trigger::Complete);
        }
        self.session_done = true;
    }

    fn fire_cancel(&mut self, reason: CancelReason) {
        if let Some(cb) = self.callbacks.on_recording_cancel.as_mut() {
            cb(reason);
        }
    }

    fn fire_error(&mut self, err: PushTalkError) {
        if let Some(cb) = self.callbacks.on_error.as_mut() {
            cb(err);
        }
    }
}

/// Runs a controller on a dedicated OS thread until the session
/// completes or a stop is requested.
pub struct ControllerThread {
    handle: JoinHandle<PttController>,
    stop_flag: Arc<std::sync::atomic::AtomicBool>,
}

impl ControllerThread {
    /// Spawn the decision loop. The controller should already be
    /// enabled; enable failures belong on the caller's thread where they
    /// can be returned synchronously.
    pub fn spawn(mut controller: PttController) -> Self {
        let stop_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let thread_flag = Arc::clone(&stop_flag);
        let handle = std::thread::Builder::new()
            .name("ptt-controller".to_string())
            .spawn(move || {
                while !thread_flag.load(Ordering::SeqCst) && !controller.session_complete() {
                    controller.poll(POLL_INTERVAL);
                }
                controller
            })
            .expect("failed to spawn ptt-controller thread");
        Self { handle, stop_flag }
    }

    /// Request shutdown and reclaim the controller. `None` if the loop
    /// thread panicked (its resources unwound with it).
    pub fn stop(self) -> Option<PttController> {
        self.stop_flag.store(true, Ordering::SeqCst);
        match self.handle.join() {
            Ok(controller) => Some(controller),
            Err(_) => {
                tracing::error!("ptt-controller thread panicked");
                None
            }
        }
    }
}
