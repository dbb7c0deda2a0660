//! Capture error types.

/// Reasons a capture command is refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    #[error("not connected to relay")]
    NotConnected,

    #[error("not registered with relay")]
    NotRegistered,

    #[error("capture already active for '{0}'")]
    AlreadyActive(String),

    #[error("transfer for '{0}' still in progress")]
    TransferInProgress(String),

    #[error("invalid folder name: {0}")]
    InvalidName(String),

    #[error("no capture to stop")]
    NotCapturing,
}
