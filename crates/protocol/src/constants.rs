use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Role announced to the relay by the operator endpoint.
pub const OPERATOR_ROLE: &str = "laptop";

/// Default relay endpoint for the operator.
pub const DEFAULT_RELAY_URL: &str = "ws://your-render-app.onrender.com/laptop";

/// Time allowed to establish the WebSocket connection (TCP + handshake).
pub const WS_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Time allowed to hand an outbound message to the connection.
pub const WS_SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// How often to send keepalive pings.
pub const WS_PING_PERIOD: Duration = Duration::from_secs(20);

/// Time to wait for a pong response (or any incoming message).
///
/// Acts as a read deadline: if nothing arrives within this window the
/// connection is considered dead. Large enough to cover a device that is
/// busy zipping a capture folder before the first chunk goes out.
pub const WS_PONG_WAIT: Duration = Duration::from_secs(60);

/// Maximum inbound message size in bytes (64 MiB).
pub const WS_MAX_MESSAGE_SIZE: usize = 64 * 1024 * 1024;

/// Chunks whose id is a multiple of this are reported to the operator.
pub const CHUNK_LOG_INTERVAL: i64 = 10;

/// File extension of the archive written for each completed transfer.
pub const ARCHIVE_EXTENSION: &str = "zip";

/// `chrono` format used for generated folder names, e.g. `20240101_093000`.
pub const FOLDER_NAME_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Folder name used when the device omits one on transfer messages.
pub const UNKNOWN_FOLDER: &str = "unknown";

/// Message type identifier carried in the `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    // Operator -> device
    Register,
    StartCapture,
    StopCapture,

    // Device -> operator
    CaptureStarted,
    FileTransferStart,
    FileChunk,
    FileTransferComplete,
    Error,

    /// Forward compatibility: unknown message types deserialize here.
    #[serde(other)]
    Unknown,
}

impl MessageType {
    /// Wire name of the type, as it appears in the `type` field.
    pub fn as_str(self) -> &'static str {
        match self {
            MessageType::Register => "register",
            MessageType::StartCapture => "start_capture",
            MessageType::StopCapture => "stop_capture",
            MessageType::CaptureStarted => "capture_started",
            MessageType::FileTransferStart => "file_transfer_start",
            MessageType::FileChunk => "file_chunk",
            MessageType::FileTransferComplete => "file_transfer_complete",
            MessageType::Error => "error",
            MessageType::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_type_serialization() {
        assert_eq!(
            serde_json::to_string(&MessageType::FileTransferStart).unwrap(),
            "\"file_transfer_start\""
        );
        assert_eq!(
            serde_json::to_string(&MessageType::StopCapture).unwrap(),
            "\"stop_capture\""
        );
    }

    #[test]
    fn message_type_deserialization() {
        let mt: MessageType = serde_json::from_str("\"capture_started\"").unwrap();
        assert_eq!(mt, MessageType::CaptureStarted);
    }

    #[test]
    fn unknown_message_type() {
        let mt: MessageType = serde_json::from_str("\"jetson_status\"").unwrap();
        assert_eq!(mt, MessageType::Unknown);
    }

    #[test]
    fn as_str_matches_serde_name() {
        for mt in [
            MessageType::Register,
            MessageType::StartCapture,
            MessageType::StopCapture,
            MessageType::CaptureStarted,
            MessageType::FileTransferStart,
            MessageType::FileChunk,
            MessageType::FileTransferComplete,
            MessageType::Error,
        ] {
            let json = serde_json::to_string(&mt).unwrap();
            assert_eq!(json, format!("\"{}\"", mt.as_str()));
        }
    }
}
