pub mod error;
pub mod time;

pub use error::{AudioError, CancelReason, ConfigError, KeyboardError, PushTalkError, VadError};
pub use time::{step_clock, uptime_clock, SharedTimeSource, StepClock, TimeSource, UptimeClock};
