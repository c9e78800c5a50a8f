use thiserror::Error;

/// Errors produced by the capture engine and its collaborators.
///
/// Producer-level variants (`DeviceUnavailable` for a secondary source,
/// `CaptureGap`) are logged where they happen and never stop the controller.
/// `ConcurrentSaveRejected` exists for callers that want to surface a skipped
/// trigger; the coordinator itself reports it as a `TriggerOutcome`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("device not available: {0}")]
    DeviceUnavailable(String),

    #[error("capture gap: {0}")]
    CaptureGap(String),

    #[error("encoding failed: {0}")]
    EncodingFailed(String),

    #[error("a save is already in progress")]
    ConcurrentSaveRejected,

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("configuration failed: {0}")]
    ConfigurationFailed(String),

    #[error("storage error: {0}")]
    StorageError(String),
}

impl CaptureError {
    /// Whether this error only costs a single frame or chunk.
    pub fn is_gap(&self) -> bool {
        matches!(self, Self::CaptureGap(_))
    }
}
