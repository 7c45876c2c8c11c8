//! Frame-level silence detection for Hybrid-mode auto-stop.
//!
//! Classification is an energy + zero-crossing heuristic: a frame counts
//! as speech when its RMS level clears a per-aggressiveness floor and its
//! zero-crossing rate sits in the band voiced/fricative speech occupies.
//! Silence duration is accumulated from frame durations rather than wall
//! clock, so a scripted frame schedule yields identical results on every
//! run.

use serde::{Deserialize, Serialize};

use crate::constants::frame_duration_ms;
use crate::levels::measure_frame;
use pushtalk_foundation::VadError;

/// Energy floors (dBFS) indexed by aggressiveness 0..=3. Higher
/// aggressiveness demands a hotter signal before calling a frame speech.
const ENERGY_FLOOR_DBFS: [f32; 4] = [-55.0, -46.0, -38.0, -30.0];

/// Zero-crossing band for plausible speech. Above the ceiling the frame is
/// treated as broadband noise regardless of level.
const ZCR_CEILING: f32 = 0.45;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SilenceConfig {
    pub aggressiveness: u8,
}

impl Default for SilenceConfig {
    fn default() -> Self {
        Self { aggressiveness: 2 }
    }
}

pub struct SilenceDetector {
    energy_floor_dbfs: f32,
    silence_ms: u32,
    frames_pushed: u64,
    speech_frames: u64,
}

impl SilenceDetector {
    pub fn new(config: SilenceConfig) -> Self {
        let level = (config.aggressiveness as usize).min(ENERGY_FLOOR_DBFS.len() - 1);
        Self {
            energy_floor_dbfs: ENERGY_FLOOR_DBFS[level],
            silence_ms: 0,
            frames_pushed: 0,
            speech_frames: 0,
        }
    }

    /// Classify one 10/20/30 ms frame. Returns `true` when the frame is
    /// speech. Non-speech frames extend the running silence duration;
    /// a speech frame resets it.
    pub fn push(&mut self, samples: &[i16]) -> Result<bool, VadError> {
        let frame_ms = frame_duration_ms(samples.len())
            .ok_or(VadError::InvalidFrameSize { actual: samples.len() })?;

        let levels = measure_frame(samples);
        let is_speech =
            levels.rms_dbfs > self.energy_floor_dbfs && levels.zero_cross_rate < ZCR_CEILING;

        self.frames_pushed += 1;
        if is_speech {
            self.speech_frames += 1;
            self.silence_ms = 0;
        } else {
            self.silence_ms = self.silence_ms.saturating_add(frame_ms);
        }

        tracing::trace!(
            rms_dbfs = levels.rms_dbfs,
            zero_cross_rate = levels.zero_cross_rate,
            is_speech,
            silence_ms = self.silence_ms,
            "silence detector frame"
        );

        Ok(is_speech)
    }

    /// Sustained non-speech duration since the last speech-classified
    /// frame (or since reset, if no speech has been seen).
    pub fn silence_duration_ms(&self) -> u32 {
        self.silence_ms
    }

    pub fn silence_exceeded(&self, threshold_ms: u32) -> bool {
        self.silence_ms >= threshold_ms
    }

    pub fn reset(&mut self) {
        self.silence_ms = 0;
        self.frames_pushed = 0;
        self.speech_frames = 0;
    }

    pub fn frames_pushed(&self) -> u64 {
        self.frames_pushed
    }

    pub fn speech_frames(&self) -> u64 {
        self.speech_frames
    }
}
