/// Expected input sample rate. The capture pipeline delivers 16 kHz mono.
pub const SAMPLE_RATE_HZ: u32 = 16_000;

/// Legal frame sizes: 10, 20, and 30 ms at 16 kHz.
pub const FRAME_SIZES_SAMPLES: [usize; 3] = [160, 320, 480];

/// Samples per millisecond at [`SAMPLE_RATE_HZ`].
pub const SAMPLES_PER_MS: usize = (SAMPLE_RATE_HZ / 1000) as usize;

/// Frame duration in ms for a legal frame length, or `None` otherwise.
pub fn frame_duration_ms(samples: usize) -> Option<u32> {
    if FRAME_SIZES_SAMPLES.contains(&samples) {
        Some((samples / SAMPLES_PER_MS) as u32)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legal_frame_durations() {
        assert_eq!(frame_duration_ms(160), Some(10));
        assert_eq!(frame_duration_ms(320), Some(20));
        assert_eq!(frame_duration_ms(480), Some(30));
        assert_eq!(frame_duration_ms(512), None);
        assert_eq!(frame_duration_ms(0), None);
    }
}
