//! Command side of the operator core.

use tokio::sync::{mpsc, oneshot};

use crate::error::CoreError;
use crate::events::CoreSnapshot;

pub(crate) type Reply<T> = oneshot::Sender<T>;

pub(crate) enum Command {
    StartCapture {
        folder_name: String,
        reply: Reply<Result<String, CoreError>>,
    },
    StopCapture {
        reply: Reply<Result<(), CoreError>>,
    },
    Reconnect {
        reply: Reply<()>,
    },
    Snapshot {
        reply: Reply<CoreSnapshot>,
    },
    Shutdown,
}

/// Cloneable handle for sending commands to a running [`OperatorCore`].
///
/// Every method fails with [`CoreError::Shutdown`] once the core task has
/// exited.
///
/// [`OperatorCore`]: crate::OperatorCore
#[derive(Debug, Clone)]
pub struct OperatorHandle {
    tx: mpsc::Sender<Command>,
}

impl OperatorHandle {
    pub(crate) fn new(tx: mpsc::Sender<Command>) -> Self {
        Self { tx }
    }

    /// Requests a capture into `folder_name` (blank for a generated name).
    /// Returns the folder name that was sent.
    pub async fn start_capture(&self, folder_name: impl Into<String>) -> Result<String, CoreError> {
        let folder_name = folder_name.into();
        self.call(|reply| Command::StartCapture { folder_name, reply })
            .await?
    }

    /// Requests the device to stop capturing and send the archive.
    pub async fn stop_capture(&self) -> Result<(), CoreError> {
        self.call(|reply| Command::StopCapture { reply }).await?
    }

    /// Drops the current connection, if any, and connects again right away.
    pub async fn reconnect(&self) -> Result<(), CoreError> {
        self.call(|reply| Command::Reconnect { reply }).await
    }

    pub async fn snapshot(&self) -> Result<CoreSnapshot, CoreError> {
        self.call(|reply| Command::Snapshot { reply }).await
    }

    /// Asks the core to close the connection and exit. Pending archive
    /// writes finish first.
    pub async fn shutdown(&self) -> Result<(), CoreError> {
        self.tx
            .send(Command::Shutdown)
            .await
            .map_err(|_| CoreError::Shutdown)
    }

    async fn call<T>(&self, make: impl FnOnce(Reply<T>) -> Command) -> Result<T, CoreError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| CoreError::Shutdown)?;
        rx.await.map_err(|_| CoreError::Shutdown)
    }
}
