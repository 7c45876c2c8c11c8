pub mod capture;
pub mod device;
pub mod engine;
pub mod scripted;

pub use capture::{CaptureStats, MicCapture};
pub use device::DeviceManager;
pub use engine::{AudioFrame, CaptureEngine, FRAME_MS, FRAME_SIZE_SAMPLES, SAMPLE_RATE_HZ};
pub use scripted::{CaptureProbe, FrameKind, ScriptedCapture};
