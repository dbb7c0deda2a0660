//! Events and snapshots published to the presentation layer.

use std::fmt;
use std::path::PathBuf;

use shutterlink_capture::CaptureStatus;
use shutterlink_connection::ConnectionState;
use shutterlink_transfer::{IntegrityWarning, TransferSnapshot};

/// Severity of an operator log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warn => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

/// A line meant for the operator's log view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub level: LogLevel,
    pub message: String,
}

/// A downloaded and unpacked archive.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadSummary {
    pub folder_name: String,
    pub archive_path: PathBuf,
    pub extract_dir: PathBuf,
    pub entry_count: usize,
    /// Size disagreement noticed while receiving, if any.
    pub warning: Option<IntegrityWarning>,
}

/// How a completed transfer ended on disk.
#[derive(Debug, Clone, PartialEq)]
pub enum TransferOutcome {
    Saved(DownloadSummary),
    Failed {
        folder_name: String,
        error: String,
        /// Archive kept on disk for inspection.
        archive_path: Option<PathBuf>,
    },
}

/// Event published by the operator core.
#[derive(Debug, Clone, PartialEq)]
pub enum CoreEvent {
    Connection(ConnectionState),
    Capture(CaptureStatus),
    /// Transfer progress in percent, `0..=100`.
    Progress(f64),
    Log(LogLine),
    TransferFinished(TransferOutcome),
}

/// Point-in-time view of the core's state.
#[derive(Debug, Clone, PartialEq)]
pub struct CoreSnapshot {
    pub connection: ConnectionState,
    pub registered: bool,
    pub capture: CaptureStatus,
    pub transfer: Option<TransferSnapshot>,
    pub progress: f64,
    /// Folder currently being written to disk.
    pub materializing: Option<String>,
}
