//! Core error types.

use shutterlink_capture::CaptureError;
use shutterlink_connection::TransportError;

/// Errors returned to operator commands.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error("send failed: {0}")]
    Transport(#[from] TransportError),

    #[error("operator core has shut down")]
    Shutdown,
}

impl CoreError {
    /// Whether the command was refused because the relay link is down.
    pub fn is_not_connected(&self) -> bool {
        matches!(
            self,
            Self::Capture(CaptureError::NotConnected | CaptureError::NotRegistered)
                | Self::Transport(TransportError::NotOpen)
        )
    }
}
