//! Chunked archive reception and materialization.
//!
//! [`TransferAssembler`] turns the `file_transfer_start` / `file_chunk` /
//! `file_transfer_complete` sequence into one assembled payload, and
//! [`ArchiveMaterializer`] writes that payload to disk and unpacks it.

mod archive;
mod assembler;
mod progress;
mod validation;

use std::path::{Path, PathBuf};

pub use archive::{ArchiveMaterializer, MaterializedArchive};
pub use assembler::{
    AbandonedTransfer, AssembledArchive, ChunkAccepted, ChunkOrdering, CompletedTransfer,
    IntegrityWarning, OrderingAnomaly, TransferAssembler, TransferSnapshot, TransferStarted,
};
pub use progress::{ProgressMeter, megabytes, percent_of};
pub use validation::validate_folder_name;

/// A message that does not fit the transfer sequence.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolViolation {
    #[error("chunk {chunk_id} received with no transfer in progress")]
    ChunkWithoutTransfer { chunk_id: i64 },

    #[error("transfer complete for '{folder}' received with no transfer in progress")]
    CompleteWithoutTransfer { folder: String },

    #[error("chunk {chunk_id} is not valid base64: {source}")]
    InvalidChunkData {
        chunk_id: i64,
        #[source]
        source: base64::DecodeError,
    },

    #[error("chunk {got} out of order, expected {expected}")]
    OutOfOrderChunk { expected: i64, got: i64 },
}

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolViolation),

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        /// Archive file left on disk, if it was written before the failure.
        archive: Option<PathBuf>,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid archive {}: {source}", archive.display())]
    ArchiveFormat {
        archive: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("invalid folder name: {0}")]
    InvalidName(String),
}

impl TransferError {
    /// Archive file kept on disk after a failed materialization.
    pub fn retained_archive(&self) -> Option<&Path> {
        match self {
            Self::Write { archive, .. } => archive.as_deref(),
            Self::ArchiveFormat { archive, .. } => Some(archive),
            _ => None,
        }
    }
}
