pub mod event_log;
pub mod session_stats;

pub use event_log::{EventKind, EventLog, PttEvent, Scalar};
pub use session_stats::SessionStats;
