//! Capture control: the start/stop handshake with the remote device.
//!
//! [`CaptureController`] decides whether a command may be sent, builds the
//! wire message and tracks the device's acknowledgements. It performs no
//! I/O; the caller sends what it returns.

pub mod controller;
pub mod error;
pub mod naming;
pub mod types;

pub use controller::CaptureController;
pub use error::CaptureError;
pub use naming::{folder_name_at, generate_folder_name};
pub use types::{CaptureJob, CaptureStatus, JobStatus, LinkState};
