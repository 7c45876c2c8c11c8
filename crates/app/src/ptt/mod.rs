pub mod controller;
pub mod session;
pub mod shim;
pub mod state_machine;

pub use controller::{ControllerCallbacks, ControllerThread, PttController};
pub use session::{record_with_ptt, RecordingSession, SessionOutcome};
pub use shim::{RecorderShim, UtteranceRecorder};
pub use state_machine::{InvalidTransition, PttState, StateMachine, Trigger, TRANSITIONS};
