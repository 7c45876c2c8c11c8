//! Push-to-talk lifecycle state machine.
//!
//! Transitions live in a static table keyed by `(state, trigger)`; the
//! controller is a thin dispatcher over it. Anything not in the table is
//! an `InvalidTransition` and leaves the state untouched.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PttState {
    Idle,
    WaitingForKey,
    KeyPressed,
    Recording,
    RecordingStopped,
    RecordingCancelled,
    Processing,
}

impl PttState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PttState::Idle => "idle",
            PttState::WaitingForKey => "waiting_for_key",
            PttState::KeyPressed => "key_pressed",
            PttState::Recording => "recording",
            PttState::RecordingStopped => "recording_stopped",
            PttState::RecordingCancelled => "recording_cancelled",
            PttState::Processing => "processing",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
    Enable,
    ChordMatch,
    StartRecording,
    ChordReleaseBeforeMin,
    ChordReleaseAfterMin,
    SecondTogglePress,
    SilenceExceeded,
    CancelPressed,
    Timeout,
    CaptureError,
    Finalize,
    Complete,
    Disable,
}

impl Trigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trigger::Enable => "enable",
            Trigger::ChordMatch => "chord_match",
            Trigger::StartRecording => "start_recording",
            Trigger::ChordReleaseBeforeMin => "chord_release_before_min",
            Trigger::ChordReleaseAfterMin => "chord_release_after_min",
            Trigger::SecondTogglePress => "second_toggle_press",
            Trigger::SilenceExceeded => "silence_exceeded",
            Trigger::CancelPressed => "cancel_pressed",
            Trigger::Timeout => "timeout",
            Trigger::CaptureError => "capture_error",
            Trigger::Finalize => "finalize",
            Trigger::Complete => "complete",
            Trigger::Disable => "disable",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid transition from {from:?} on {trigger:?}")]
pub struct InvalidTransition {
    pub from: PttState,
    pub trigger: Trigger,
}

/// The complete legal-transition table. Everything else is rejected.
pub const TRANSITIONS: &[(PttState, Trigger, PttState)] = &[
    (PttState::Idle, Trigger::Enable, PttState::WaitingForKey),
    (PttState::WaitingForKey, Trigger::ChordMatch, PttState::KeyPressed),
    (PttState::KeyPressed, Trigger::StartRecording, PttState::Recording),
    (PttState::KeyPressed, Trigger::ChordReleaseBeforeMin, PttState::WaitingForKey),
    (PttState::KeyPressed, Trigger::CancelPressed, PttState::WaitingForKey),
    (PttState::Recording, Trigger::ChordReleaseAfterMin, PttState::RecordingStopped),
    (PttState::Recording, Trigger::SecondTogglePress, PttState::RecordingStopped),
    (PttState::Recording, Trigger::SilenceExceeded, PttState::RecordingStopped),
    (PttState::Recording, Trigger::CancelPressed, PttState::RecordingCancelled),
    (PttState::Recording, Trigger::Timeout, PttState::RecordingCancelled),
    (PttState::Recording, Trigger::CaptureError, PttState::RecordingCancelled),
    (PttState::RecordingStopped, Trigger::Finalize, PttState::Processing),
    (PttState::RecordingCancelled, Trigger::Finalize, PttState::Processing),
    (PttState::Processing, Trigger::Complete, PttState::Idle),
    (PttState::WaitingForKey, Trigger::Disable, PttState::Idle),
    (PttState::KeyPressed, Trigger::Disable, PttState::Idle),
    (PttState::Recording, Trigger::Disable, PttState::Idle),
    (PttState::RecordingStopped, Trigger::Disable, PttState::Idle),
    (PttState::RecordingCancelled, Trigger::Disable, PttState::Idle),
    (PttState::Processing, Trigger::Disable, PttState::Idle),
];

pub fn lookup(from: PttState, trigger: Trigger) -> Option<PttState> {
    TRANSITIONS
        .iter()
        .find(|(f, t, _)| *f == from && *t == trigger)
        .map(|(_, _, to)| *to)
}

pub struct StateMachine {
    state: PttState,
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            state: PttState::Idle,
        }
    }

    pub fn state(&self) -> PttState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state != PttState::Idle
    }

    /// Apply a trigger. On success returns `(from, to)`; on failure the
    /// state is unchanged.
    pub fn apply(&mut self, trigger: Trigger) -> Result<(PttState, PttState), InvalidTransition> {
        let from = self.state;
        match lookup(from, trigger) {
            Some(to) => {
                self.state = to;
                Ok((from, to))
            }
            None => Err(InvalidTransition { from, trigger }),
        }
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}
