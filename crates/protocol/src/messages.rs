use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::constants::UNKNOWN_FOLDER;

// ---------------------------------------------------------------------------
// Operator -> device
// ---------------------------------------------------------------------------

/// Announces the endpoint's role to the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub client_type: String,
}

/// Asks the device to start capturing into `folder_name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartCaptureRequest {
    pub folder_name: String,
}

// ---------------------------------------------------------------------------
// Device -> operator
// ---------------------------------------------------------------------------

/// Acknowledges that capture is running on the device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureStartedEvent {
    #[serde(default)]
    pub folder_name: String,
}

/// Announces an upcoming chunked transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileTransferStart {
    #[serde(default = "unknown_folder")]
    pub folder_name: String,
    /// Declared archive size in bytes. Only used for progress.
    #[serde(default)]
    pub file_size: i64,
}

/// One fragment of the archive payload.
///
/// `data` stays base64 text on the wire; the receiver decodes it with
/// [`FileChunk::decode_data`] so a corrupt chunk can be handled as a
/// transfer-level error instead of an unparseable message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileChunk {
    #[serde(default)]
    pub data: String,
    #[serde(default = "missing_chunk_id")]
    pub chunk_id: i64,
    #[serde(default)]
    pub is_last: bool,
}

impl FileChunk {
    /// Builds a chunk from raw bytes.
    pub fn new(chunk_id: i64, bytes: &[u8], is_last: bool) -> Self {
        Self {
            data: STANDARD.encode(bytes),
            chunk_id,
            is_last,
        }
    }

    /// Decodes the base64 payload into raw bytes.
    pub fn decode_data(&self) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(self.data.as_bytes())
    }
}

/// Marks the end of a chunked transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileTransferComplete {
    #[serde(default = "unknown_folder")]
    pub folder_name: String,
}

/// Error reported by the device or the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEvent {
    #[serde(default = "unknown_error")]
    pub message: String,
}

fn unknown_folder() -> String {
    UNKNOWN_FOLDER.into()
}

fn missing_chunk_id() -> i64 {
    -1
}

fn unknown_error() -> String {
    "Unknown error".into()
}
