//! WebSocket client for the relay channel.
//!
//! One [`WsClient`] owns one connection: a write pump serialising all
//! outbound frames, a ping pump for keepalive, and (once started) a read
//! pump delivering parsed messages in arrival order.

use futures_util::StreamExt;
use futures_util::stream::SplitStream;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, tungstenite};
use tracing::debug;

use shutterlink_protocol::envelope::Message;

use crate::pumps::Shutdown;
use crate::pumps::read::ReadLimits;
use crate::types::{SessionId, TransportConfig, TransportEvent};

/// Floor for the frame limit handed to tungstenite.
const MIN_WIRE_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

type WsRead = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Errors from the relay transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("connection error: {0}")]
    Connect(#[from] tungstenite::Error),

    #[error("connection timed out")]
    ConnectTimeout,

    #[error("channel not open")]
    NotOpen,

    #[error("send timed out")]
    SendTimeout,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// WebSocket client connected to the relay.
pub struct WsClient {
    session: SessionId,
    write_tx: mpsc::Sender<tungstenite::Message>,
    /// Read half, parked until [`WsClient::start_receiving`] hands it to
    /// the read pump.
    read: Option<WsRead>,
    config: TransportConfig,
    shutdown: Shutdown,
    _write_handle: JoinHandle<()>,
    _ping_handle: JoinHandle<()>,
    read_handle: Option<JoinHandle<()>>,
}

impl WsClient {
    /// Connects to the relay at `url`.
    ///
    /// Fails with [`TransportError::Connect`] on DNS/TCP/handshake failure
    /// and [`TransportError::ConnectTimeout`] when the attempt exceeds the
    /// configured bound. Inbound frames are not read until
    /// [`start_receiving`](Self::start_receiving) is called.
    pub async fn connect(url: &str, config: &TransportConfig) -> Result<Self, TransportError> {
        // tungstenite's limits sit above the application limit; the read
        // pump drops anything in between and keeps the connection.
        let wire_limit = config
            .max_message_size
            .saturating_mul(2)
            .max(MIN_WIRE_MESSAGE_SIZE);
        let mut ws_config = tungstenite::protocol::WebSocketConfig::default();
        ws_config.max_message_size = Some(wire_limit);
        ws_config.max_frame_size = Some(wire_limit);

        let (ws_stream, _) = tokio::time::timeout(
            config.connect_timeout,
            tokio_tungstenite::connect_async_with_config(url, Some(ws_config), false),
        )
        .await
        .map_err(|_| TransportError::ConnectTimeout)??;
        let (write, read) = ws_stream.split();

        let session = SessionId::new();
        let (write_tx, write_rx) = mpsc::channel::<tungstenite::Message>(256);
        let shutdown = Shutdown::new();

        let write_handle = tokio::spawn(crate::pumps::write::write_pump(
            write,
            write_rx,
            config.send_timeout,
            shutdown.clone(),
        ));
        let ping_handle = tokio::spawn(crate::pumps::ping::ping_pump(
            write_tx.clone(),
            config.ping_period,
            shutdown.clone(),
        ));

        debug!(%session, %url, "connected to relay");

        Ok(Self {
            session,
            write_tx,
            read: Some(read),
            config: config.clone(),
            shutdown,
            _write_handle: write_handle,
            _ping_handle: ping_handle,
            read_handle: None,
        })
    }

    /// Id of this connection.
    pub fn session_id(&self) -> SessionId {
        self.session
    }

    /// Returns `true` until the connection has been closed by either side.
    pub fn is_open(&self) -> bool {
        !self.shutdown.is_closed()
    }

    /// Starts the read pump, delivering inbound messages and the final
    /// close notification to `events_tx`. Subsequent calls do nothing.
    pub fn start_receiving(&mut self, events_tx: mpsc::Sender<TransportEvent>) {
        let Some(read) = self.read.take() else {
            return;
        };
        let limits = ReadLimits {
            pong_wait: self.config.pong_wait,
            max_message_size: self.config.max_message_size,
        };
        self.read_handle = Some(tokio::spawn(crate::pumps::read::read_pump(
            read,
            self.session,
            events_tx,
            self.write_tx.clone(),
            limits,
            self.shutdown.clone(),
        )));
    }

    /// Serialises and queues a message on the single writer.
    ///
    /// Fails with [`TransportError::NotOpen`] once the connection is closed
    /// and [`TransportError::SendTimeout`] if the writer stays backed up.
    pub async fn send(&self, message: &Message) -> Result<(), TransportError> {
        if !self.is_open() {
            return Err(TransportError::NotOpen);
        }
        let json = message.to_text()?;
        let frame = tungstenite::Message::Text(json.into());
        match tokio::time::timeout(self.config.send_timeout, self.write_tx.send(frame)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(TransportError::NotOpen),
            Err(_) => Err(TransportError::SendTimeout),
        }
    }

    /// Closes the connection. Pending sends are dropped; the read pump, if
    /// running, reports the close as local.
    pub fn close(&self) {
        self.shutdown.close();
    }
}

impl Drop for WsClient {
    fn drop(&mut self) {
        self.shutdown.close();
        self._write_handle.abort();
        self._ping_handle.abort();
        if let Some(handle) = &self.read_handle {
            handle.abort();
        }
    }
}
