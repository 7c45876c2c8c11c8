pub mod backend;
pub mod chord;
pub mod keys;
pub mod queue;
pub mod rdev_backend;
pub mod source;

pub use backend::{
    detect_backend, EventSink, FailingBackend, KeyboardBackend, ScriptedBackend, ScriptedHandle,
};
pub use chord::{ChordId, ChordTracker, KeyChord};
pub use keys::KeyToken;
pub use queue::{EventQueue, KeyboardEvent};
pub use rdev_backend::RdevBackend;
pub use source::KeyboardSource;
