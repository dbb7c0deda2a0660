use serde::{Deserialize, Serialize};

use crate::constants::MessageType;
use crate::messages::{
    CaptureStartedEvent, ErrorEvent, FileChunk, FileTransferComplete, FileTransferStart,
    RegisterRequest, StartCaptureRequest,
};

/// Every message exchanged over the relay channel.
///
/// The wire form is a flat JSON object whose `type` field selects the
/// variant; the remaining fields belong to the variant's payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    Register(RegisterRequest),
    StartCapture(StartCaptureRequest),
    StopCapture,
    CaptureStarted(CaptureStartedEvent),
    FileTransferStart(FileTransferStart),
    FileChunk(FileChunk),
    FileTransferComplete(FileTransferComplete),
    Error(ErrorEvent),
    /// Forward compatibility: unknown `type` values deserialize here.
    #[serde(other)]
    Unknown,
}

impl Message {
    /// Registration message for the given role.
    pub fn register(client_type: impl Into<String>) -> Self {
        Message::Register(RegisterRequest {
            client_type: client_type.into(),
        })
    }

    /// Start command for the given folder.
    pub fn start_capture(folder_name: impl Into<String>) -> Self {
        Message::StartCapture(StartCaptureRequest {
            folder_name: folder_name.into(),
        })
    }

    /// Returns the type discriminator of this message.
    pub fn msg_type(&self) -> MessageType {
        match self {
            Message::Register(_) => MessageType::Register,
            Message::StartCapture(_) => MessageType::StartCapture,
            Message::StopCapture => MessageType::StopCapture,
            Message::CaptureStarted(_) => MessageType::CaptureStarted,
            Message::FileTransferStart(_) => MessageType::FileTransferStart,
            Message::FileChunk(_) => MessageType::FileChunk,
            Message::FileTransferComplete(_) => MessageType::FileTransferComplete,
            Message::Error(_) => MessageType::Error,
            Message::Unknown => MessageType::Unknown,
        }
    }

    /// Serializes to the JSON text sent in a WebSocket text frame.
    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parses a WebSocket text frame.
    pub fn from_text(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
