//! Capture status and job records.

use std::fmt;

/// What the operator is waiting for, as seen from this endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CaptureStatus {
    #[default]
    Idle,
    /// `start_capture` sent, waiting for `capture_started`.
    AwaitingStart { folder: String },
    Capturing { folder: String },
    /// `stop_capture` sent, waiting for the archive to arrive.
    AwaitingStop { folder: String },
}

impl CaptureStatus {
    /// Folder of the active job, if any.
    pub fn folder(&self) -> Option<&str> {
        match self {
            Self::Idle => None,
            Self::AwaitingStart { folder }
            | Self::Capturing { folder }
            | Self::AwaitingStop { folder } => Some(folder),
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Whether a start command may be offered.
    pub fn can_start(&self) -> bool {
        self.is_idle()
    }

    /// Whether a stop command may be offered.
    pub fn can_stop(&self) -> bool {
        matches!(self, Self::AwaitingStart { .. } | Self::Capturing { .. })
    }
}

impl fmt::Display for CaptureStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::AwaitingStart { folder } => write!(f, "starting '{folder}'"),
            Self::Capturing { folder } => write!(f, "capturing '{folder}'"),
            Self::AwaitingStop { folder } => write!(f, "stopping '{folder}'"),
        }
    }
}

/// Lifecycle of a single capture run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Idle,
    Requested,
    Running,
    Completed,
    Failed,
}

/// One requested capture run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureJob {
    pub folder_name: String,
    pub status: JobStatus,
}

impl CaptureJob {
    pub fn new(folder_name: impl Into<String>) -> Self {
        Self {
            folder_name: folder_name.into(),
            status: JobStatus::Idle,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.status, JobStatus::Completed | JobStatus::Failed)
    }
}

/// Connection facts a capture command depends on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkState {
    pub connected: bool,
    pub registered: bool,
}

impl LinkState {
    pub fn ready() -> Self {
        Self {
            connected: true,
            registered: true,
        }
    }
}
