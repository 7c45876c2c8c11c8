//! Per-frame signal measurements.
//!
//! The silence detector classifies on two numbers per frame: an RMS
//! level in dBFS and a zero-crossing rate. Both are plain functions of
//! the sample slice; no state is carried between frames here.

/// Level reported for an empty or all-zero frame. 16-bit audio bottoms
/// out near -96 dBFS, so anything at the floor is unambiguous silence.
pub const DBFS_SILENCE_FLOOR: f32 = -96.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameLevels {
    pub rms_dbfs: f32,
    pub zero_cross_rate: f32,
}

pub fn measure_frame(samples: &[i16]) -> FrameLevels {
    FrameLevels {
        rms_dbfs: rms_dbfs(samples),
        zero_cross_rate: zero_cross_rate(samples),
    }
}

/// Root-mean-square level of the frame in dBFS, clamped to the silence
/// floor. Samples are normalized to [-1, 1] against i16::MAX before
/// accumulation.
pub fn rms_dbfs(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return DBFS_SILENCE_FLOOR;
    }

    let mut acc = 0.0f64;
    for &sample in samples {
        let x = f64::from(sample) / f64::from(i16::MAX);
        acc += x * x;
    }
    let rms = (acc / samples.len() as f64).sqrt();
    if rms <= 0.0 {
        return DBFS_SILENCE_FLOOR;
    }

    ((20.0 * rms.log10()) as f32).max(DBFS_SILENCE_FLOOR)
}

/// Fraction of adjacent sample pairs that change sign. Voiced speech
/// sits well below 0.5; broadband hiss pushes toward it.
pub fn zero_cross_rate(samples: &[i16]) -> f32 {
    if samples.len() < 2 {
        return 0.0;
    }
    let crossings = samples
        .windows(2)
        .filter(|pair| (pair[0] >= 0) != (pair[1] >= 0))
        .count();
    crossings as f32 / (samples.len() - 1) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_zero_frames_sit_on_the_floor() {
        assert_eq!(rms_dbfs(&[]), DBFS_SILENCE_FLOOR);
        assert_eq!(rms_dbfs(&[0i16; 480]), DBFS_SILENCE_FLOOR);
    }

    #[test]
    fn constant_levels_give_known_dbfs() {
        // A constant at full scale has RMS 1.0: 0 dBFS.
        let full = vec![i16::MAX; 160];
        assert!(rms_dbfs(&full).abs() < 0.01);

        // Half scale: 20*log10(0.5) = -6.02 dB.
        let half = vec![16_384i16; 160];
        assert!((rms_dbfs(&half) + 6.02).abs() < 0.05);

        // Quarter scale: -12.04 dB.
        let quarter = vec![8_192i16; 160];
        assert!((rms_dbfs(&quarter) + 12.04).abs() < 0.05);
    }

    #[test]
    fn level_is_independent_of_sign() {
        let positive = vec![12_000i16; 320];
        let negative = vec![-12_000i16; 320];
        assert!((rms_dbfs(&positive) - rms_dbfs(&negative)).abs() < 1e-3);
    }

    #[test]
    fn zcr_tracks_frequency() {
        // 1 kHz at 16 kHz: 16 samples per period, two crossings each.
        let tone_1k: Vec<i16> = (0..320)
            .map(|i| {
                let phase = 2.0 * std::f32::consts::PI * 1_000.0 * i as f32 / 16_000.0;
                (phase.sin() * 10_000.0) as i16
            })
            .collect();
        let zcr = zero_cross_rate(&tone_1k);
        assert!((zcr - 0.125).abs() < 0.02, "zcr was {}", zcr);

        // Sample-rate-alternating signal crosses on every pair.
        let nyquist: Vec<i16> = (0..320)
            .map(|i| if i % 2 == 0 { 900 } else { -900 })
            .collect();
        assert!(zero_cross_rate(&nyquist) > 0.95);

        // DC never crosses.
        assert_eq!(zero_cross_rate(&[700i16; 320]), 0.0);
    }

    #[test]
    fn measure_frame_bundles_both_numbers() {
        let levels = measure_frame(&[0i16; 320]);
        assert_eq!(levels.rms_dbfs, DBFS_SILENCE_FLOOR);
        assert_eq!(levels.zero_cross_rate, 0.0);
    }
}
