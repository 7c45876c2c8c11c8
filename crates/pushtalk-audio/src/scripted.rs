//! Deterministic capture engine for tests and headless automation.
//!
//! Plays a programmed schedule of speech/silence frames against the
//! injected clock: every 20 ms of virtual time yields one 320-sample
//! frame. Call counts are observable through a [`CaptureProbe`] so suites
//! can assert the exactly-once stop/discard invariant after the engine
//! has been moved into a controller.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use pushtalk_foundation::{AudioError, SharedTimeSource, TimeSource};

use crate::engine::{AudioFrame, CaptureEngine, FRAME_MS, FRAME_SIZE_SAMPLES};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Speech,
    Silence,
}

pub type FrameSchedule = Arc<dyn Fn(u64) -> FrameKind + Send + Sync>;

/// Shared observation handle for a [`ScriptedCapture`].
#[derive(Clone, Default)]
pub struct CaptureProbe {
    pub starts: Arc<AtomicUsize>,
    pub stops: Arc<AtomicUsize>,
    pub discards: Arc<AtomicUsize>,
    pub stopped_samples: Arc<AtomicUsize>,
}

impl CaptureProbe {
    pub fn finalizations(&self) -> usize {
        self.stops.load(Ordering::SeqCst) + self.discards.load(Ordering::SeqCst)
    }
}

pub struct ScriptedCapture {
    clock: SharedTimeSource,
    schedule: FrameSchedule,
    probe: CaptureProbe,
    started_at_ms: Option<u64>,
    emitted_ms: u64,
    buffer: Vec<i16>,
    finished: Option<Vec<i16>>,
    fail_start: bool,
    error_at_ms: Option<u64>,
    error_raised: bool,
}

impl ScriptedCapture {
    pub fn new(clock: SharedTimeSource, schedule: FrameSchedule) -> (Self, CaptureProbe) {
        let probe = CaptureProbe::default();
        (
            Self {
                clock,
                schedule,
                probe: probe.clone(),
                started_at_ms: None,
                emitted_ms: 0,
                buffer: Vec::new(),
                finished: None,
                fail_start: false,
                error_at_ms: None,
                error_raised: false,
            },
            probe,
        )
    }

    /// Speech for the first `speech_ms` of the recording, silence after.
    pub fn speech_then_silence(clock: SharedTimeSource, speech_ms: u64) -> (Self, CaptureProbe) {
        Self::new(
            clock,
            Arc::new(move |offset_ms| {
                if offset_ms < speech_ms {
                    FrameKind::Speech
                } else {
                    FrameKind::Silence
                }
            }),
        )
    }

    pub fn always_speech(clock: SharedTimeSource) -> (Self, CaptureProbe) {
        Self::new(clock, Arc::new(|_| FrameKind::Speech))
    }

    pub fn always_silence(clock: SharedTimeSource) -> (Self, CaptureProbe) {
        Self::new(clock, Arc::new(|_| FrameKind::Silence))
    }

    /// Make `start` fail with `DeviceBusy`.
    pub fn with_start_failure(mut self) -> Self {
        self.fail_start = true;
        self
    }

    /// Raise a `DeviceError` once the recording has run for `ms`.
    pub fn with_error_at(mut self, ms: u64) -> Self {
        self.error_at_ms = Some(ms);
        self
    }

    fn elapsed_ms(&self) -> u64 {
        self.started_at_ms
            .map(|start| self.clock.elapsed_ms(start))
            .unwrap_or(0)
    }

    /// Synthesize frames for virtual time that has passed since the last
    /// call, appending to the primary buffer.
    fn catch_up(&mut self) -> Vec<AudioFrame> {
        if self.started_at_ms.is_none() {
            return Vec::new();
        }
        let elapsed = self.elapsed_ms();
        let mut frames = Vec::new();
        while self.emitted_ms + FRAME_MS as u64 <= elapsed {
            let kind = (self.schedule)(self.emitted_ms);
            let samples = synth_frame(kind, self.emitted_ms);
            self.buffer.extend_from_slice(&samples);
            frames.push(AudioFrame {
                samples,
                frame_ms: FRAME_MS,
            });
            self.emitted_ms += FRAME_MS as u64;
        }
        frames
    }

    fn finish(&mut self) -> Vec<i16> {
        self.catch_up();
        self.started_at_ms = None;
        std::mem::take(&mut self.buffer)
    }
}

impl CaptureEngine for ScriptedCapture {
    fn start(&mut self) -> Result<(), AudioError> {
        self.probe.starts.fetch_add(1, Ordering::SeqCst);
        if self.fail_start {
            return Err(AudioError::DeviceBusy("scripted start failure".to_string()));
        }
        self.started_at_ms = Some(self.clock.now_ms());
        self.emitted_ms = 0;
        self.buffer.clear();
        self.finished = None;
        self.error_raised = false;
        Ok(())
    }

    fn stop(&mut self) -> Vec<i16> {
        if self.started_at_ms.is_some() {
            let buffer = self.finish();
            self.probe.stops.fetch_add(1, Ordering::SeqCst);
            self.probe
                .stopped_samples
                .store(buffer.len(), Ordering::SeqCst);
            self.finished = Some(buffer);
        }
        self.finished.clone().unwrap_or_default()
    }

    fn discard(&mut self) {
        if self.started_at_ms.is_some() {
            self.finish();
            self.probe.discards.fetch_add(1, Ordering::SeqCst);
        }
        self.finished = None;
    }

    fn poll_frames(&mut self) -> Vec<AudioFrame> {
        self.catch_up()
    }

    fn take_error(&mut self) -> Option<AudioError> {
        let at = self.error_at_ms?;
        if !self.error_raised && self.started_at_ms.is_some() && self.elapsed_ms() >= at {
            self.error_raised = true;
            return Some(AudioError::DeviceError("scripted device failure".to_string()));
        }
        None
    }
}

/// 440 Hz tone for speech frames, zeros for silence. The tone level is
/// chosen to clear every silence-detector aggressiveness floor.
fn synth_frame(kind: FrameKind, offset_ms: u64) -> Vec<i16> {
    match kind {
        FrameKind::Silence => vec![0i16; FRAME_SIZE_SAMPLES],
        FrameKind::Speech => {
            let start_sample = offset_ms as usize * 16;
            (0..FRAME_SIZE_SAMPLES)
                .map(|i| {
                    let n = (start_sample + i) as f32;
                    let phase = 2.0 * std::f32::consts::PI * 440.0 * n / 16_000.0;
                    (phase.sin() * 12000.0) as i16
                })
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pushtalk_foundation::step_clock;

    #[test]
    fn frames_follow_virtual_time() {
        let clock = step_clock();
        let (mut capture, _probe) = ScriptedCapture::always_speech(clock.clone());

        capture.start().unwrap();
        assert!(capture.poll_frames().is_empty());

        clock.advance_ms(65);
        let frames = capture.poll_frames();
        assert_eq!(frames.len(), 3); // 65 ms -> three whole 20 ms frames
        assert!(frames.iter().all(|f| f.samples.len() == FRAME_SIZE_SAMPLES));

        clock.advance_ms(15);
        let frames = capture.poll_frames();
        assert_eq!(frames.len(), 1); // 80 ms total -> one more
    }

    #[test]
    fn stop_returns_accumulated_buffer() {
        let clock = step_clock();
        let (mut capture, probe) = ScriptedCapture::always_speech(clock.clone());

        capture.start().unwrap();
        clock.advance_ms(200);
        let buffer = capture.stop();
        assert_eq!(buffer.len(), 10 * FRAME_SIZE_SAMPLES);
        assert_eq!(probe.stops.load(Ordering::SeqCst), 1);

        // Idempotent: same buffer, no double-count.
        let again = capture.stop();
        assert_eq!(again.len(), buffer.len());
        assert_eq!(probe.stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn tap_does_not_steal_from_buffer() {
        let clock = step_clock();
        let (mut capture, _probe) = ScriptedCapture::always_speech(clock.clone());

        capture.start().unwrap();
        clock.advance_ms(100);
        let polled = capture.poll_frames();
        assert_eq!(polled.len(), 5);

        let buffer = capture.stop();
        assert_eq!(buffer.len(), 5 * FRAME_SIZE_SAMPLES);
    }

    #[test]
    fn discard_drops_audio() {
        let clock = step_clock();
        let (mut capture, probe) = ScriptedCapture::always_speech(clock.clone());

        capture.start().unwrap();
        clock.advance_ms(100);
        capture.discard();
        assert_eq!(probe.discards.load(Ordering::SeqCst), 1);
        assert!(capture.stop().is_empty());
        assert_eq!(probe.finalizations(), 1);
    }

    #[test]
    fn schedule_switches_speech_to_silence() {
        let clock = step_clock();
        let (mut capture, _probe) = ScriptedCapture::speech_then_silence(clock.clone(), 40);

        capture.start().unwrap();
        clock.advance_ms(80);
        let frames = capture.poll_frames();
        assert_eq!(frames.len(), 4);
        assert!(frames[0].samples.iter().any(|&s| s != 0));
        assert!(frames[1].samples.iter().any(|&s| s != 0));
        assert!(frames[2].samples.iter().all(|&s| s == 0));
        assert!(frames[3].samples.iter().all(|&s| s == 0));
    }

    #[test]
    fn scripted_errors() {
        let clock = step_clock();
        let (capture, _probe) = ScriptedCapture::always_speech(clock.clone());
        let mut failing = capture.with_start_failure();
        assert!(matches!(failing.start(), Err(AudioError::DeviceBusy(_))));

        let (capture, _probe) = ScriptedCapture::always_speech(clock.clone());
        let mut erroring = capture.with_error_at(100);
        erroring.start().unwrap();
        assert!(erroring.take_error().is_none());
        clock.advance_ms(120);
        assert!(matches!(
            erroring.take_error(),
            Some(AudioError::DeviceError(_))
        ));
        // Raised once only.
        assert!(erroring.take_error().is_none());
    }
}
