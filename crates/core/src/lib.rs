//! Operator core: the single task that owns the connection, the capture
//! handshake and the transfer state machine.
//!
//! The presentation layer talks to it through an [`OperatorHandle`] and
//! renders the [`CoreEvent`] stream; it never touches protocol state.

mod config;
mod dispatch;
mod error;
mod events;
mod handle;
mod materialize;
mod operator;

pub use config::CoreConfig;
pub use error::CoreError;
pub use events::{CoreEvent, CoreSnapshot, DownloadSummary, LogLevel, LogLine, TransferOutcome};
pub use handle::OperatorHandle;
pub use operator::OperatorCore;

pub use shutterlink_capture::{CaptureStatus, generate_folder_name};
pub use shutterlink_connection::{ConnectionState, ReconnectConfig, TransportConfig};
pub use shutterlink_transfer::{ChunkOrdering, TransferSnapshot};
