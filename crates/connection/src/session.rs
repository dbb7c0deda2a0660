//! One logical connection to the relay.

use tokio::sync::mpsc;

use shutterlink_protocol::envelope::Message;

use crate::types::{SessionId, TransportConfig, TransportEvent};
use crate::ws_client::{TransportError, WsClient};

/// A live connection plus the role it speaks for.
///
/// A `Session` is never reused: every reconnect yields a new value with
/// `registered == false`.
pub struct Session {
    client: WsClient,
    role: String,
    registered: bool,
}

impl Session {
    pub fn new(client: WsClient, role: impl Into<String>) -> Self {
        Self {
            client,
            role: role.into(),
            registered: false,
        }
    }

    pub fn id(&self) -> SessionId {
        self.client.session_id()
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn is_connected(&self) -> bool {
        self.client.is_open()
    }

    /// Whether the role has been announced on this connection.
    pub fn is_registered(&self) -> bool {
        self.registered
    }

    pub(crate) fn mark_registered(&mut self) {
        self.registered = true;
    }

    pub async fn send(&self, message: &Message) -> Result<(), TransportError> {
        self.client.send(message).await
    }

    /// Starts delivering inbound messages to `events_tx`.
    pub fn start_receiving(&mut self, events_tx: mpsc::Sender<TransportEvent>) {
        self.client.start_receiving(events_tx);
    }

    pub fn close(&self) {
        self.client.close();
    }
}

/// Opens sessions against a fixed relay endpoint.
#[derive(Debug, Clone)]
pub struct Connector {
    url: String,
    role: String,
    config: TransportConfig,
}

impl Connector {
    pub fn new(url: impl Into<String>, role: impl Into<String>, config: TransportConfig) -> Self {
        Self {
            url: url.into(),
            role: role.into(),
            config,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Opens a new, unregistered session.
    pub async fn connect(&self) -> Result<Session, TransportError> {
        let client = WsClient::connect(&self.url, &self.config).await?;
        Ok(Session::new(client, self.role.clone()))
    }
}
