//! Wire protocol between the operator endpoint and the capture device.
//!
//! Messages are JSON objects carried in WebSocket text frames, relayed
//! unchanged between the two peers.

pub mod constants;
pub mod envelope;
pub mod messages;

pub use constants::MessageType;
pub use envelope::Message;
pub use messages::{
    CaptureStartedEvent, ErrorEvent, FileChunk, FileTransferComplete, FileTransferStart,
    RegisterRequest, StartCaptureRequest,
};
