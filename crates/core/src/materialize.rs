//! Archive materialization on the blocking pool.

use tokio::task::{JoinError, JoinHandle};

use shutterlink_transfer::{
    ArchiveMaterializer, CompletedTransfer, IntegrityWarning, MaterializedArchive, TransferError,
};

/// A materialization running on a blocking worker.
pub(crate) struct PendingMaterialization {
    pub(crate) folder_name: String,
    pub(crate) warning: Option<IntegrityWarning>,
    handle: JoinHandle<Result<MaterializedArchive, TransferError>>,
}

impl PendingMaterialization {
    /// Hands the assembled payload to a blocking worker.
    pub(crate) fn spawn(materializer: &ArchiveMaterializer, done: CompletedTransfer) -> Self {
        let CompletedTransfer {
            folder_name,
            archive,
            warning,
            ..
        } = done;
        let materializer = materializer.clone();
        let folder = folder_name.clone();
        let handle = tokio::task::spawn_blocking(move || {
            materializer.materialize(&folder, archive.as_bytes())
        });
        Self {
            folder_name,
            warning,
            handle,
        }
    }

    /// Waits for the worker.
    pub(crate) async fn join(
        &mut self,
    ) -> Result<Result<MaterializedArchive, TransferError>, JoinError> {
        (&mut self.handle).await
    }
}

/// Resolves when the pending materialization, if any, finishes.
pub(crate) async fn join_pending(
    pending: &mut Option<PendingMaterialization>,
) -> Result<Result<MaterializedArchive, TransferError>, JoinError> {
    match pending {
        Some(p) => p.join().await,
        None => std::future::pending().await,
    }
}
