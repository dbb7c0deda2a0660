//! The operator core task.

use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use shutterlink_capture::{CaptureController, LinkState};
use shutterlink_connection::{
    CloseReason, ConnectionState, Connector, FirstAttempt, ReconnectConfig, Session, SessionId,
    SessionRegistrar, TransportError, TransportEvent, connect_loop,
};
use shutterlink_protocol::envelope::Message;
use shutterlink_transfer::{
    ArchiveMaterializer, CompletedTransfer, MaterializedArchive, TransferAssembler, TransferError,
};

use crate::config::CoreConfig;
use crate::error::CoreError;
use crate::events::{CoreEvent, CoreSnapshot, DownloadSummary, LogLevel, LogLine, TransferOutcome};
use crate::handle::{Command, OperatorHandle};
use crate::materialize::{PendingMaterialization, join_pending};

const COMMAND_CHANNEL_SIZE: usize = 32;
const EVENT_CHANNEL_SIZE: usize = 256;
const TRANSPORT_CHANNEL_SIZE: usize = 256;

/// A connect loop in flight.
struct Connecting {
    handle: JoinHandle<Option<Session>>,
    cancel: CancellationToken,
}

async fn join_connecting(
    connecting: &mut Option<Connecting>,
) -> Result<Option<Session>, JoinError> {
    match connecting {
        Some(c) => (&mut c.handle).await,
        None => std::future::pending().await,
    }
}

/// Owns every state machine of the operator endpoint and processes
/// transport events, operator commands, connect outcomes and
/// materialization outcomes one at a time.
pub struct OperatorCore {
    connector: Connector,
    reconnect: ReconnectConfig,
    registrar: SessionRegistrar,
    pub(crate) capture: CaptureController,
    pub(crate) assembler: TransferAssembler,
    materializer: ArchiveMaterializer,

    session: Option<Session>,
    state: ConnectionState,
    pub(crate) progress: f64,
    connecting: Option<Connecting>,
    pub(crate) materializing: Option<PendingMaterialization>,

    transport_tx: mpsc::Sender<TransportEvent>,
    transport_rx: mpsc::Receiver<TransportEvent>,
    commands_rx: mpsc::Receiver<Command>,
    events_tx: mpsc::Sender<CoreEvent>,
}

impl OperatorCore {
    /// Builds the core, the handle that drives it and its event stream.
    /// Nothing happens until [`run`](Self::run) is awaited.
    pub fn new(config: CoreConfig) -> (Self, OperatorHandle, mpsc::Receiver<CoreEvent>) {
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_SIZE);
        let (transport_tx, transport_rx) = mpsc::channel(TRANSPORT_CHANNEL_SIZE);

        let core = Self {
            connector: Connector::new(config.relay_url, config.role, config.transport),
            reconnect: config.reconnect,
            registrar: SessionRegistrar::new(),
            capture: CaptureController::new(),
            assembler: TransferAssembler::new(config.chunk_ordering),
            materializer: ArchiveMaterializer::new(config.save_dir),
            session: None,
            state: ConnectionState::Disconnected,
            progress: 0.0,
            connecting: None,
            materializing: None,
            transport_tx,
            transport_rx,
            commands_rx,
            events_tx,
        };
        (core, OperatorHandle::new(commands_tx), events_rx)
    }

    /// Runs until [`OperatorHandle::shutdown`] is called or every handle is
    /// dropped.
    pub async fn run(mut self) {
        info!(url = self.connector.url(), "operator core started");
        self.start_connect(FirstAttempt::Immediate).await;

        loop {
            tokio::select! {
                cmd = self.commands_rx.recv() => match cmd {
                    Some(Command::Shutdown) | None => break,
                    Some(cmd) => self.handle_command(cmd).await,
                },
                Some(event) = self.transport_rx.recv() => {
                    self.handle_transport(event).await;
                }
                result = join_connecting(&mut self.connecting) => {
                    self.connecting = None;
                    self.on_connect_result(result).await;
                }
                result = join_pending(&mut self.materializing) => {
                    self.on_materialized(result).await;
                }
            }
        }

        self.stop().await;
    }

    async fn stop(&mut self) {
        self.cancel_connect();
        if let Some(session) = self.session.take() {
            session.close();
        }
        self.finish_materialization().await;
        info!("operator core stopped");
    }

    // -- commands --------------------------------------------------------

    async fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::StartCapture { folder_name, reply } => {
                let result = self.start_capture(&folder_name).await;
                let _ = reply.send(result);
            }
            Command::StopCapture { reply } => {
                let result = self.stop_capture().await;
                let _ = reply.send(result);
            }
            Command::Reconnect { reply } => {
                self.manual_reconnect().await;
                let _ = reply.send(());
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            Command::Shutdown => {}
        }
    }

    fn link(&self) -> LinkState {
        self.session
            .as_ref()
            .map(|s| LinkState {
                connected: s.is_connected(),
                registered: s.is_registered(),
            })
            .unwrap_or_default()
    }

    async fn start_capture(&mut self, folder_name: &str) -> Result<String, CoreError> {
        let link = self.link();
        let busy = self
            .assembler
            .snapshot()
            .map(|t| t.folder_name)
            .or_else(|| self.materializing.as_ref().map(|m| m.folder_name.clone()));

        let message = match self.capture.request_start(folder_name, link, busy.as_deref()) {
            Ok(message) => message,
            Err(e) => {
                self.log(LogLevel::Warn, format!("Cannot start capture: {e}"))
                    .await;
                return Err(e.into());
            }
        };
        let folder = self.capture.status().folder().unwrap_or_default().to_string();

        self.send_command(&message).await?;
        self.log(
            LogLevel::Info,
            format!("Sent start capture command with folder name: {folder}"),
        )
        .await;
        Ok(folder)
    }

    async fn stop_capture(&mut self) -> Result<(), CoreError> {
        let link = self.link();
        let message = match self.capture.request_stop(link) {
            Ok(message) => message,
            Err(e) => {
                self.log(LogLevel::Warn, format!("Cannot stop capture: {e}"))
                    .await;
                return Err(e.into());
            }
        };
        self.send_command(&message).await?;
        self.log(LogLevel::Info, "Sent stop capture command").await;
        Ok(())
    }

    /// Sends a capture command, rolling the controller back on failure.
    async fn send_command(&mut self, message: &Message) -> Result<(), CoreError> {
        let result = match &self.session {
            Some(session) => session.send(message).await,
            None => Err(TransportError::NotOpen),
        };
        if let Err(e) = result {
            self.capture.on_send_failed();
            self.log(
                LogLevel::Error,
                format!("Error sending {} command: {e}", message.msg_type()),
            )
            .await;
            return Err(e.into());
        }
        self.emit_capture().await;
        Ok(())
    }

    async fn manual_reconnect(&mut self) {
        self.log(LogLevel::Info, "Reconnecting to relay...").await;
        self.cancel_connect();
        if let Some(session) = self.session.take() {
            session.close();
            self.on_session_lost().await;
        }
        self.start_connect(FirstAttempt::Immediate).await;
    }

    fn snapshot(&self) -> CoreSnapshot {
        CoreSnapshot {
            connection: self.state.clone(),
            registered: self.session.as_ref().is_some_and(Session::is_registered),
            capture: self.capture.status().clone(),
            transfer: self.assembler.snapshot(),
            progress: self.progress,
            materializing: self.materializing.as_ref().map(|m| m.folder_name.clone()),
        }
    }

    // -- connection ------------------------------------------------------

    async fn start_connect(&mut self, first: FirstAttempt) {
        if first == FirstAttempt::Immediate {
            self.set_state(ConnectionState::Connecting).await;
            self.log(LogLevel::Info, "Connecting to relay...").await;
        }
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(connect_loop(
            self.connector.clone(),
            self.reconnect.clone(),
            first,
            self.transport_tx.clone(),
            cancel.clone(),
        ));
        self.connecting = Some(Connecting { handle, cancel });
    }

    fn cancel_connect(&mut self) {
        if let Some(connecting) = self.connecting.take() {
            connecting.cancel.cancel();
        }
    }

    async fn on_connect_result(&mut self, result: Result<Option<Session>, JoinError>) {
        let mut session = match result {
            Ok(Some(session)) => session,
            Ok(None) => return,
            Err(e) => {
                error!(error = %e, "connect task failed");
                self.start_connect(FirstAttempt::AfterBackoff).await;
                return;
            }
        };

        self.set_state(ConnectionState::Connected).await;
        self.log(LogLevel::Info, "Connected to relay").await;

        if let Err(e) = self.registrar.register(&mut session).await {
            session.close();
            self.log(LogLevel::Error, format!("Registration failed: {e}"))
                .await;
            self.set_state(ConnectionState::Disconnected).await;
            self.start_connect(FirstAttempt::AfterBackoff).await;
            return;
        }

        session.start_receiving(self.transport_tx.clone());
        self.session = Some(session);
        self.set_state(ConnectionState::Registered).await;
    }

    fn current_session(&self) -> Option<SessionId> {
        self.session.as_ref().map(Session::id)
    }

    async fn handle_transport(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Message { session, message } => {
                if self.current_session() != Some(session) {
                    debug!(%session, msg_type = %message.msg_type(), "ignoring message from stale session");
                    return;
                }
                self.dispatch(message).await;
            }
            TransportEvent::Closed { session, reason } => {
                if self.current_session() != Some(session) {
                    debug!(%session, %reason, "ignoring close of stale session");
                    return;
                }
                self.on_closed(reason).await;
            }
            TransportEvent::Reconnecting {
                attempt,
                next_retry,
            } => {
                if self.connecting.is_none() {
                    return;
                }
                self.set_state(ConnectionState::Reconnecting { attempt })
                    .await;
                self.log(
                    LogLevel::Info,
                    format!(
                        "Reconnecting in {:.1}s (attempt {attempt})",
                        next_retry.as_secs_f64()
                    ),
                )
                .await;
            }
            TransportEvent::ConnectFailed { attempt, error } => {
                if self.connecting.is_none() {
                    return;
                }
                self.log(
                    LogLevel::Warn,
                    format!("Connection attempt {attempt} failed: {error}"),
                )
                .await;
            }
        }
    }

    async fn on_closed(&mut self, reason: CloseReason) {
        self.session = None;
        self.log(
            LogLevel::Warn,
            format!("Disconnected from relay: {reason}"),
        )
        .await;
        self.on_session_lost().await;
        self.start_connect(FirstAttempt::AfterBackoff).await;
    }

    /// Clears everything tied to the lost connection.
    async fn on_session_lost(&mut self) {
        if let Some(dropped) = self.assembler.abandon() {
            self.log(
                LogLevel::Warn,
                format!(
                    "Transfer for '{}' abandoned after {} of {} bytes",
                    dropped.folder_name, dropped.received, dropped.declared
                ),
            )
            .await;
        }
        if self.capture.on_disconnect() {
            self.emit_capture().await;
        }
        self.set_state(ConnectionState::Disconnected).await;
    }

    // -- materialization -------------------------------------------------

    pub(crate) async fn finish_materialization(&mut self) {
        if let Some(mut pending) = self.materializing.take() {
            let result = pending.join().await;
            self.report_materialization(pending, result).await;
        }
    }

    async fn on_materialized(
        &mut self,
        result: Result<Result<MaterializedArchive, TransferError>, JoinError>,
    ) {
        if let Some(pending) = self.materializing.take() {
            self.report_materialization(pending, result).await;
        }
    }

    async fn report_materialization(
        &mut self,
        pending: PendingMaterialization,
        result: Result<Result<MaterializedArchive, TransferError>, JoinError>,
    ) {
        let folder_name = pending.folder_name;
        let outcome = match result {
            Ok(Ok(out)) => {
                self.log(
                    LogLevel::Info,
                    format!("Saved zip file to: {}", out.archive_path.display()),
                )
                .await;
                self.log(
                    LogLevel::Info,
                    format!(
                        "Successfully downloaded and extracted {} files to: {}",
                        out.entry_count,
                        out.extract_dir.display()
                    ),
                )
                .await;
                TransferOutcome::Saved(DownloadSummary {
                    folder_name,
                    archive_path: out.archive_path,
                    extract_dir: out.extract_dir,
                    entry_count: out.entry_count,
                    warning: pending.warning,
                })
            }
            Ok(Err(e)) => {
                let archive_path = e.retained_archive().map(|p| p.to_path_buf());
                self.log(
                    LogLevel::Error,
                    format!("Failed to save or extract the received file: {e}"),
                )
                .await;
                TransferOutcome::Failed {
                    folder_name,
                    error: e.to_string(),
                    archive_path,
                }
            }
            Err(e) => {
                error!(folder = %folder_name, error = %e, "materialization task failed");
                self.log(
                    LogLevel::Error,
                    format!("Failed to save the received file: {e}"),
                )
                .await;
                TransferOutcome::Failed {
                    folder_name,
                    error: e.to_string(),
                    archive_path: None,
                }
            }
        };
        self.emit(CoreEvent::TransferFinished(outcome)).await;
    }

    pub(crate) async fn spawn_materialization(
        &mut self,
        done: CompletedTransfer,
    ) {
        // One write at a time keeps archive naming race-free.
        self.finish_materialization().await;
        self.materializing = Some(PendingMaterialization::spawn(&self.materializer, done));
    }

    // -- events ----------------------------------------------------------

    pub(crate) async fn emit(&self, event: CoreEvent) {
        let _ = self.events_tx.send(event).await;
    }

    pub(crate) async fn emit_capture(&self) {
        self.emit(CoreEvent::Capture(self.capture.status().clone()))
            .await;
    }

    pub(crate) async fn set_progress(&mut self, progress: f64) {
        self.progress = progress;
        self.emit(CoreEvent::Progress(progress)).await;
    }

    async fn set_state(&mut self, state: ConnectionState) {
        if self.state == state {
            return;
        }
        debug!(from = ?self.state, to = ?state, "connection state changed");
        self.state = state.clone();
        self.emit(CoreEvent::Connection(state)).await;
    }

    /// Logs through `tracing` and forwards the line to the operator.
    pub(crate) async fn log(&self, level: LogLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            LogLevel::Info => info!("{message}"),
            LogLevel::Warn => warn!("{message}"),
            LogLevel::Error => error!("{message}"),
        }
        self.emit(CoreEvent::Log(LogLine { level, message })).await;
    }
}
