//! Routing of inbound device messages.

use tracing::debug;

use shutterlink_protocol::envelope::Message;
use shutterlink_protocol::messages::{
    CaptureStartedEvent, ErrorEvent, FileChunk, FileTransferComplete, FileTransferStart,
};
use shutterlink_transfer::megabytes;

use crate::events::LogLevel;
use crate::operator::OperatorCore;

impl OperatorCore {
    /// Routes one message from the current session by kind.
    pub(crate) async fn dispatch(&mut self, message: Message) {
        match message {
            Message::CaptureStarted(event) => self.on_capture_started(event).await,
            Message::FileTransferStart(start) => self.on_transfer_start(start).await,
            Message::FileChunk(chunk) => self.on_chunk(chunk).await,
            Message::FileTransferComplete(done) => self.on_transfer_complete(done).await,
            Message::Error(event) => self.on_remote_error(event).await,
            Message::Register(_) | Message::StartCapture(_) | Message::StopCapture => {
                debug!(msg_type = %message.msg_type(), "ignoring operator-bound command echoed by relay");
            }
            Message::Unknown => debug!("ignoring message of unknown type"),
        }
    }

    async fn on_capture_started(&mut self, event: CaptureStartedEvent) {
        self.log(
            LogLevel::Info,
            format!("Capture started on device in folder: {}", event.folder_name),
        )
        .await;
        if self.capture.on_capture_started(&event.folder_name) {
            self.emit_capture().await;
        }
    }

    async fn on_transfer_start(&mut self, start: FileTransferStart) {
        // The previous archive of the same job must be on disk first.
        if self
            .materializing
            .as_ref()
            .is_some_and(|m| m.folder_name == start.folder_name)
        {
            self.finish_materialization().await;
        }

        let started = self.assembler.on_start(&start);
        if let Some(prev) = &started.replaced {
            self.log(
                LogLevel::Warn,
                format!(
                    "Protocol error: transfer for '{}' restarted, discarded {} received bytes",
                    prev.folder_name, prev.received
                ),
            )
            .await;
        }
        if let Some(warning) = &started.warning {
            self.log(LogLevel::Warn, format!("Data integrity warning: {warning}"))
                .await;
        }
        self.log(
            LogLevel::Info,
            format!(
                "Starting to receive file for folder: {} ({:.2} MB)",
                start.folder_name,
                megabytes(start.file_size.max(0) as u64)
            ),
        )
        .await;
        self.set_progress(0.0).await;
    }

    async fn on_chunk(&mut self, chunk: FileChunk) {
        match self.assembler.on_chunk(&chunk) {
            Ok(accepted) => {
                if let Some(anomaly) = &accepted.anomaly {
                    self.log(LogLevel::Warn, format!("Chunk order: {anomaly}"))
                        .await;
                }
                if accepted.progress != self.progress {
                    self.set_progress(accepted.progress).await;
                }
                if accepted.should_log {
                    self.log(LogLevel::Info, accepted.progress_line()).await;
                }
            }
            Err(e) => {
                self.log(LogLevel::Warn, e.to_string()).await;
            }
        }
    }

    async fn on_transfer_complete(&mut self, done: FileTransferComplete) {
        // A completion without a transfer leaves the capture alone.
        let completed = match self.assembler.on_complete(&done) {
            Ok(completed) => completed,
            Err(e) => {
                self.log(LogLevel::Warn, e.to_string()).await;
                return;
            }
        };
        if self.capture.on_transfer_complete() {
            self.emit_capture().await;
        }

        self.log(
            LogLevel::Info,
            format!(
                "File transfer complete for folder: {} ({} bytes in {} chunks)",
                completed.folder_name,
                completed.archive.len(),
                completed.chunks
            ),
        )
        .await;
        if let Some(warning) = &completed.warning {
            self.log(LogLevel::Warn, format!("Data integrity warning: {warning}"))
                .await;
        }
        self.set_progress(100.0).await;
        self.spawn_materialization(completed).await;
    }

    async fn on_remote_error(&mut self, event: ErrorEvent) {
        self.log(
            LogLevel::Error,
            format!("Error from device: {}", event.message),
        )
        .await;
        if self.capture.on_remote_error() {
            self.emit_capture().await;
        }
    }
}
