pub mod constants;
pub mod detector;
pub mod levels;

pub use constants::{FRAME_SIZES_SAMPLES, SAMPLE_RATE_HZ};
pub use detector::{SilenceConfig, SilenceDetector};
pub use levels::{measure_frame, rms_dbfs, zero_cross_rate, FrameLevels, DBFS_SILENCE_FLOOR};
