//! Chunked-transfer state machine.

use std::fmt;

use tracing::{debug, warn};

use shutterlink_protocol::constants::CHUNK_LOG_INTERVAL;
use shutterlink_protocol::messages::{FileChunk, FileTransferComplete, FileTransferStart};

use crate::progress::{ProgressMeter, megabytes};
use crate::{ProtocolViolation, TransferError};

/// How chunk ids are checked against arrival order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChunkOrdering {
    /// Trust the channel's ordering; anomalies are only reported.
    #[default]
    Lenient,
    /// Every chunk after the first must carry the previous id + 1.
    Strict,
}

/// Chunk id that does not follow its predecessor. Reported, not fatal,
/// under [`ChunkOrdering::Lenient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderingAnomaly {
    Gap { expected: i64, got: i64 },
    Repeat { chunk_id: i64 },
    Regression { previous: i64, got: i64 },
}

impl fmt::Display for OrderingAnomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gap { expected, got } => write!(f, "expected chunk {expected}, got {got}"),
            Self::Repeat { chunk_id } => write!(f, "chunk {chunk_id} repeated"),
            Self::Regression { previous, got } => {
                write!(f, "chunk {got} arrived after chunk {previous}")
            }
        }
    }
}

/// Disagreement between the declared and received byte counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrityWarning {
    /// Transfer announced without a usable size.
    UnknownSize { declared: i64 },
    /// Fewer bytes arrived than were declared.
    Shortfall { received: u64, declared: u64 },
    /// More bytes arrived than the final chunk can account for.
    Overshoot { received: u64, declared: u64 },
}

impl fmt::Display for IntegrityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownSize { declared } => {
                write!(f, "transfer size not declared (file_size={declared})")
            }
            Self::Shortfall { received, declared } => {
                write!(f, "received {received} of {declared} declared bytes")
            }
            Self::Overshoot { received, declared } => {
                write!(f, "received {received} bytes, more than the {declared} declared")
            }
        }
    }
}

/// State of an in-flight transfer.
#[derive(Debug)]
struct TransferState {
    folder_name: String,
    chunks: Vec<Vec<u8>>,
    meter: ProgressMeter,
    last_chunk_id: Option<i64>,
    last_chunk_len: usize,
}

impl TransferState {
    fn new(folder_name: String, declared: i64) -> Self {
        Self {
            folder_name,
            chunks: Vec::new(),
            meter: ProgressMeter::new(declared),
            last_chunk_id: None,
            last_chunk_len: 0,
        }
    }

    fn abandoned(self) -> AbandonedTransfer {
        AbandonedTransfer {
            folder_name: self.folder_name,
            received: self.meter.received(),
            declared: self.meter.declared(),
            chunks: self.chunks.len(),
        }
    }

    fn check_order(&self, chunk_id: i64) -> Option<OrderingAnomaly> {
        let previous = self.last_chunk_id?;
        let expected = previous.checked_add(1)?;
        if chunk_id == expected {
            None
        } else if chunk_id == previous {
            Some(OrderingAnomaly::Repeat { chunk_id })
        } else if chunk_id < previous {
            Some(OrderingAnomaly::Regression {
                previous,
                got: chunk_id,
            })
        } else {
            Some(OrderingAnomaly::Gap {
                expected,
                got: chunk_id,
            })
        }
    }

    fn integrity(&self) -> Option<IntegrityWarning> {
        let declared = self.meter.declared();
        let received = self.meter.received();
        if declared <= 0 {
            return Some(IntegrityWarning::UnknownSize { declared });
        }
        let declared = declared as u64;
        if received < declared {
            Some(IntegrityWarning::Shortfall { received, declared })
        } else if received - declared > self.last_chunk_len as u64 {
            Some(IntegrityWarning::Overshoot { received, declared })
        } else {
            None
        }
    }
}

/// A transfer dropped before completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbandonedTransfer {
    pub folder_name: String,
    pub received: u64,
    pub declared: i64,
    pub chunks: usize,
}

/// Outcome of a transfer-start announcement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferStarted {
    pub folder_name: String,
    pub declared: i64,
    /// Transfer that was still receiving and got replaced.
    pub replaced: Option<AbandonedTransfer>,
    pub warning: Option<IntegrityWarning>,
}

/// Outcome of an accepted chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkAccepted {
    pub chunk_id: i64,
    pub is_last: bool,
    pub len: usize,
    pub received: u64,
    pub declared: i64,
    /// Progress in percent, `0..=100`, non-decreasing within a transfer.
    pub progress: f64,
    /// Whether this chunk is worth a line in the operator log.
    pub should_log: bool,
    pub anomaly: Option<OrderingAnomaly>,
}

impl ChunkAccepted {
    /// Operator-facing progress line, `"1.25 MB / 3.00 MB"`.
    pub fn progress_line(&self) -> String {
        format!(
            "Chunk {}: {:.2} MB / {:.2} MB",
            self.chunk_id,
            megabytes(self.received),
            megabytes(self.declared.max(0) as u64),
        )
    }
}

/// Concatenation of all chunks of one transfer, in receipt order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledArchive {
    bytes: Vec<u8>,
}

impl AssembledArchive {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// A finished transfer, ready to be materialized.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedTransfer {
    /// Folder named by the transfer-start message.
    pub folder_name: String,
    pub archive: AssembledArchive,
    pub chunks: usize,
    pub warning: Option<IntegrityWarning>,
}

/// Read-only view of the active transfer.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferSnapshot {
    pub folder_name: String,
    pub received: u64,
    pub declared: i64,
    pub progress: f64,
}

/// Receives one chunked transfer at a time.
///
/// Idle until a transfer-start arrives, then Receiving until the matching
/// transfer-complete, a protocol violation, or [`abandon`](Self::abandon).
#[derive(Debug, Default)]
pub struct TransferAssembler {
    ordering: ChunkOrdering,
    state: Option<TransferState>,
}

impl TransferAssembler {
    pub fn new(ordering: ChunkOrdering) -> Self {
        Self {
            ordering,
            state: None,
        }
    }

    pub fn ordering(&self) -> ChunkOrdering {
        self.ordering
    }

    pub fn is_receiving(&self) -> bool {
        self.state.is_some()
    }

    pub fn snapshot(&self) -> Option<TransferSnapshot> {
        self.state.as_ref().map(|s| TransferSnapshot {
            folder_name: s.folder_name.clone(),
            received: s.meter.received(),
            declared: s.meter.declared(),
            progress: s.meter.percent(),
        })
    }

    /// Begins a transfer. A transfer already in progress is discarded and
    /// reported in [`TransferStarted::replaced`].
    pub fn on_start(&mut self, msg: &FileTransferStart) -> TransferStarted {
        let replaced = self.state.take().map(TransferState::abandoned);
        if let Some(prev) = &replaced {
            warn!(
                folder = %prev.folder_name,
                received = prev.received,
                "transfer restarted before completion, discarding previous state"
            );
        }

        let warning = (msg.file_size <= 0).then_some(IntegrityWarning::UnknownSize {
            declared: msg.file_size,
        });
        if let Some(w) = &warning {
            warn!(folder = %msg.folder_name, "{w}");
        }

        debug!(folder = %msg.folder_name, file_size = msg.file_size, "transfer started");
        self.state = Some(TransferState::new(msg.folder_name.clone(), msg.file_size));

        TransferStarted {
            folder_name: msg.folder_name.clone(),
            declared: msg.file_size,
            replaced,
            warning,
        }
    }

    /// Decodes and appends a chunk.
    ///
    /// Invalid base64 and (under [`ChunkOrdering::Strict`]) out-of-order ids
    /// discard the transfer.
    pub fn on_chunk(&mut self, msg: &FileChunk) -> Result<ChunkAccepted, TransferError> {
        let Some(state) = self.state.as_mut() else {
            return Err(ProtocolViolation::ChunkWithoutTransfer {
                chunk_id: msg.chunk_id,
            }
            .into());
        };

        let data = match msg.decode_data() {
            Ok(data) => data,
            Err(source) => {
                self.state = None;
                return Err(ProtocolViolation::InvalidChunkData {
                    chunk_id: msg.chunk_id,
                    source,
                }
                .into());
            }
        };

        let anomaly = match self.ordering {
            // Missing ids (-1) carry no ordering information.
            ChunkOrdering::Lenient if msg.chunk_id < 0 => None,
            ChunkOrdering::Lenient => state.check_order(msg.chunk_id),
            ChunkOrdering::Strict => {
                let expected = state.last_chunk_id.map(|id| id.saturating_add(1));
                let in_order = msg.chunk_id >= 0 && expected.is_none_or(|e| e == msg.chunk_id);
                if !in_order {
                    self.state = None;
                    return Err(ProtocolViolation::OutOfOrderChunk {
                        expected: expected.unwrap_or(0),
                        got: msg.chunk_id,
                    }
                    .into());
                }
                None
            }
        };
        if let Some(a) = &anomaly {
            warn!(folder = %state.folder_name, "{a}");
        }

        let len = data.len();
        let progress = state.meter.add(len);
        state.chunks.push(data);
        if msg.chunk_id >= 0 {
            state.last_chunk_id = Some(msg.chunk_id);
        }
        state.last_chunk_len = len;

        Ok(ChunkAccepted {
            chunk_id: msg.chunk_id,
            is_last: msg.is_last,
            len,
            received: state.meter.received(),
            declared: state.meter.declared(),
            progress,
            should_log: msg.is_last || msg.chunk_id.rem_euclid(CHUNK_LOG_INTERVAL) == 0,
            anomaly,
        })
    }

    /// Finishes the transfer and returns the assembled payload. The
    /// assembler is idle afterwards.
    pub fn on_complete(
        &mut self,
        msg: &FileTransferComplete,
    ) -> Result<CompletedTransfer, TransferError> {
        let Some(state) = self.state.take() else {
            return Err(ProtocolViolation::CompleteWithoutTransfer {
                folder: msg.folder_name.clone(),
            }
            .into());
        };

        if msg.folder_name != state.folder_name {
            warn!(
                started = %state.folder_name,
                completed = %msg.folder_name,
                "transfer complete names a different folder, keeping the announced one"
            );
        }

        // Size problems were already reported at start.
        let warning = state
            .integrity()
            .filter(|w| !matches!(w, IntegrityWarning::UnknownSize { .. }));
        if let Some(w) = &warning {
            warn!(folder = %state.folder_name, "{w}");
        }

        let chunks = state.chunks.len();
        let bytes = state.chunks.concat();
        debug!(folder = %state.folder_name, bytes = bytes.len(), chunks, "transfer assembled");

        Ok(CompletedTransfer {
            folder_name: state.folder_name,
            archive: AssembledArchive { bytes },
            chunks,
            warning,
        })
    }

    /// Drops the active transfer, if any.
    pub fn abandon(&mut self) -> Option<AbandonedTransfer> {
        self.state.take().map(TransferState::abandoned)
    }
}
