use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PushTalkError {
    #[error(transparent)]
    Keyboard(#[from] KeyboardError),

    #[error(transparent)]
    Audio(#[from] AudioError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Vad(#[from] VadError),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Error, Debug)]
pub enum KeyboardError {
    #[error("Keyboard monitoring not permitted by OS policy: {0}")]
    PermissionDenied(String),

    #[error("No keyboard backend available: {0}")]
    Unsupported(String),

    #[error("Keyboard source is already running")]
    AlreadyRunning,

    #[error("Keyboard monitor failed: {0}")]
    Fatal(String),
}

#[derive(Error, Debug)]
pub enum AudioError {
    #[error("No input device available")]
    NoInputDevice,

    #[error("Input device is busy: {0}")]
    DeviceBusy(String),

    #[error("Device error: {0}")]
    DeviceError(String),

    #[error("Format not supported: {format}")]
    FormatNotSupported { format: String },

    #[error("No audio data for {duration:?}")]
    NoDataTimeout { duration: Duration },

    #[error("Fatal audio error: {0}")]
    Fatal(String),
}

impl From<cpal::DevicesError> for AudioError {
    fn from(err: cpal::DevicesError) -> Self {
        AudioError::DeviceError(err.to_string())
    }
}

impl From<cpal::SupportedStreamConfigsError> for AudioError {
    fn from(err: cpal::SupportedStreamConfigsError) -> Self {
        match err {
            cpal::SupportedStreamConfigsError::DeviceNotAvailable => AudioError::NoInputDevice,
            other => AudioError::DeviceError(other.to_string()),
        }
    }
}

impl From<cpal::BuildStreamError> for AudioError {
    fn from(err: cpal::BuildStreamError) -> Self {
        match err {
            cpal::BuildStreamError::DeviceNotAvailable => AudioError::NoInputDevice,
            cpal::BuildStreamError::StreamConfigNotSupported => AudioError::FormatNotSupported {
                format: "requested stream config".to_string(),
            },
            other => AudioError::DeviceError(other.to_string()),
        }
    }
}

impl From<cpal::PlayStreamError> for AudioError {
    fn from(err: cpal::PlayStreamError) -> Self {
        AudioError::DeviceError(err.to_string())
    }
}

impl From<cpal::StreamError> for AudioError {
    fn from(err: cpal::StreamError) -> Self {
        match err {
            cpal::StreamError::DeviceNotAvailable => AudioError::NoInputDevice,
            other => AudioError::DeviceError(other.to_string()),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid chord {spec:?}: {reason}")]
    InvalidChord { spec: String, reason: String },

    #[error("{field} out of range: {reason}")]
    OutOfRange { field: &'static str, reason: String },

    #[error("Validation failed: {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration parsing error: {0}")]
    Parse(String),
}

#[derive(Error, Debug)]
pub enum VadError {
    #[error("Invalid frame size: expected 160/320/480 samples, got {actual}")]
    InvalidFrameSize { actual: usize },
}

/// Why an in-flight recording was abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    UserCancel,
    Timeout,
    CaptureError,
    Disabled,
}

impl CancelReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CancelReason::UserCancel => "user_cancel",
            CancelReason::Timeout => "timeout",
            CancelReason::CaptureError => "capture_error",
            CancelReason::Disabled => "disabled",
        }
    }
}

impl std::fmt::Display for CancelReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
