//! Capture engine seam.
//!
//! The controller drives recording through this trait so the real
//! microphone engine and the scripted engine used by tests are
//! interchangeable.

use pushtalk_foundation::AudioError;

/// Capture pipeline output format: 16 kHz mono i16.
pub const SAMPLE_RATE_HZ: u32 = 16_000;

/// Fixed frame cadence for the silence-detector tap.
pub const FRAME_MS: u16 = 20;

/// Samples per 20 ms frame at 16 kHz.
pub const FRAME_SIZE_SAMPLES: usize = 320;

#[derive(Debug, Clone)]
pub struct AudioFrame {
    pub samples: Vec<i16>,
    pub frame_ms: u16,
}

pub trait CaptureEngine: Send {
    /// Open the input device and begin streaming into the session buffer.
    fn start(&mut self) -> Result<(), AudioError>;

    /// Stop streaming, flush any partial frame, and hand the accumulated
    /// buffer out. Idempotent after the first call in a session.
    fn stop(&mut self) -> Vec<i16>;

    /// Stop streaming and drop the buffer (cancel path).
    fn discard(&mut self);

    /// Drain the lazy frame tap. Consuming the tap never removes samples
    /// from the primary buffer; tap frames may be shed under
    /// backpressure.
    fn poll_frames(&mut self) -> Vec<AudioFrame>;

    /// Fetch-and-clear a streaming error raised since the last call.
    fn take_error(&mut self) -> Option<AudioError>;
}
