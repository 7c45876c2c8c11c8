//! Deterministic controller harness: scripted keyboard backend, scripted
//! capture engine, step clock.

#![allow(dead_code)]

use parking_lot::Mutex;
use std::sync::Arc;

use pushtalk_app::config::{PttConfig, PttMode};
use pushtalk_app::ptt::controller::PttController;
use pushtalk_audio::{CaptureProbe, ScriptedCapture};
use pushtalk_foundation::{step_clock, CancelReason, StepClock};
use pushtalk_keyboard::{KeyToken, KeyboardSource, ScriptedBackend, ScriptedHandle};
use pushtalk_telemetry::{EventKind, EventLog, Scalar};

/// What the scripted microphone plays once recording starts.
#[derive(Clone, Copy)]
pub enum AudioPlan {
    AlwaysSpeech,
    AlwaysSilence,
    /// Speech for the given ms (relative to recording entry), then silence.
    SpeechThenSilence(u64),
    FailOnStart,
    ErrorAt(u64),
}

/// Terminal outcomes observed through the controller callbacks.
#[derive(Clone, Default)]
pub struct OutcomeSink {
    pub started: Arc<Mutex<u32>>,
    pub stopped: Arc<Mutex<Option<Vec<i16>>>>,
    pub cancelled: Arc<Mutex<Option<CancelReason>>>,
    pub errors: Arc<Mutex<Vec<String>>>,
}

impl OutcomeSink {
    pub fn stopped_samples(&self) -> Option<usize> {
        self.stopped.lock().as_ref().map(|b| b.len())
    }
}

pub struct Rig {
    pub controller: PttController,
    pub keys: ScriptedHandle,
    pub clock: Arc<StepClock>,
    pub probe: CaptureProbe,
    pub log: Arc<EventLog>,
    pub outcomes: OutcomeSink,
}

pub fn config(mode: PttMode, min_ms: u64, max_ms: u64, silence_ms: u64) -> PttConfig {
    PttConfig {
        mode,
        trigger_chord: "ctrl+space".parse().unwrap(),
        cancel_chord: "esc".parse().unwrap(),
        max_duration: std::time::Duration::from_millis(max_ms),
        min_duration: std::time::Duration::from_millis(min_ms),
        silence_threshold: std::time::Duration::from_millis(silence_ms),
        vad_aggressiveness: 2,
    }
}

pub fn rig(config: PttConfig, plan: AudioPlan) -> Rig {
    let clock = step_clock();
    let shared_clock: pushtalk_foundation::SharedTimeSource = clock.clone();

    let (capture, probe) = match plan {
        AudioPlan::AlwaysSpeech => ScriptedCapture::always_speech(shared_clock.clone()),
        AudioPlan::AlwaysSilence => ScriptedCapture::always_silence(shared_clock.clone()),
        AudioPlan::SpeechThenSilence(ms) => {
            ScriptedCapture::speech_then_silence(shared_clock.clone(), ms)
        }
        AudioPlan::FailOnStart => {
            let (capture, probe) = ScriptedCapture::always_speech(shared_clock.clone());
            (capture.with_start_failure(), probe)
        }
        AudioPlan::ErrorAt(ms) => {
            let (capture, probe) = ScriptedCapture::always_speech(shared_clock.clone());
            (capture.with_error_at(ms), probe)
        }
    };

    let (backend, keys) = ScriptedBackend::new();
    let keyboard = KeyboardSource::new(Box::new(backend));
    let log = Arc::new(EventLog::new());

    let mut controller = PttController::new(
        config,
        keyboard,
        Box::new(capture),
        shared_clock,
        Arc::clone(&log),
    );

    let outcomes = OutcomeSink::default();
    let started = Arc::clone(&outcomes.started);
    controller.callbacks.on_recording_start = Some(Box::new(move || {
        *started.lock() += 1;
    }));
    let stopped = Arc::clone(&outcomes.stopped);
    controller.callbacks.on_recording_stop = Some(Box::new(move |buffer| {
        *stopped.lock() = Some(buffer);
    }));
    let cancelled = Arc::clone(&outcomes.cancelled);
    controller.callbacks.on_recording_cancel = Some(Box::new(move |reason| {
        *cancelled.lock() = Some(reason);
    }));
    let errors = Arc::clone(&outcomes.errors);
    controller.callbacks.on_error = Some(Box::new(move |err| {
        errors.lock().push(err.to_string());
    }));

    Rig {
        controller,
        keys,
        clock,
        probe,
        log,
        outcomes,
    }
}

impl Rig {
    /// Advance virtual time in 10 ms steps, pumping the controller after
    /// each step. `ms` must be a multiple of 10.
    pub fn advance(&mut self, ms: u64) {
        assert!(ms % 10 == 0, "advance() works in 10 ms steps");
        for _ in 0..ms / 10 {
            self.clock.advance_ms(10);
            self.controller.pump();
        }
    }

    pub fn press_chord(&mut self) {
        self.keys.press(KeyToken::Ctrl);
        self.keys.press(KeyToken::Space);
        self.controller.pump();
    }

    pub fn release_chord(&mut self) {
        self.keys.release(KeyToken::Space);
        self.keys.release(KeyToken::Ctrl);
        self.controller.pump();
    }

    pub fn press_cancel(&mut self) {
        self.keys.tap(KeyToken::Esc);
        self.controller.pump();
    }

    /// All state transitions as `(from, to, trigger, at_ms)`.
    pub fn transitions(&self) -> Vec<(String, String, String, u64)> {
        self.log
            .events_where(|e| e.kind == EventKind::StateTransition)
            .into_iter()
            .map(|e| {
                (
                    scalar_str(&e.data["from"]),
                    scalar_str(&e.data["to"]),
                    scalar_str(&e.data["trigger"]),
                    scalar_u64(&e.data["at_ms"]),
                )
            })
            .collect()
    }

    pub fn has_transition(&self, from: &str, to: &str, trigger: &str) -> bool {
        self.transitions()
            .iter()
            .any(|(f, t, tr, _)| f == from && t == to && tr == trigger)
    }
}

pub fn scalar_str(scalar: &Scalar) -> String {
    match scalar {
        Scalar::Str(s) => s.clone(),
        other => panic!("expected string scalar, got {:?}", other),
    }
}

pub fn scalar_u64(scalar: &Scalar) -> u64 {
    match scalar {
        Scalar::U64(v) => *v,
        other => panic!("expected u64 scalar, got {:?}", other),
    }
}
