use thiserror::Error;

/// Failures the capture/replay core can report. None of them is fatal: the
/// tick loop logs and carries on, the store falls back to memory.
#[derive(Debug, Error)]
pub enum CascadeError {
    /// Input device or file could not be opened. Retrying is allowed.
    #[error("audio input unavailable: {0}")]
    AcquisitionDenied(String),

    /// A frame did not have the shape its analysis params promise.
    #[error("invalid frame: expected {expected} {what}, got {actual}")]
    InvalidFrame {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// An imported or persisted recording entry could not be used.
    #[error("malformed recording: {0}")]
    MalformedRecording(String),

    #[error("recording storage unavailable: {0}")]
    StorageUnavailable(String),
}

pub type Result<T> = std::result::Result<T, CascadeError>;
