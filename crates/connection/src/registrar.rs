//! Role announcement on a fresh connection.

use tracing::info;

use shutterlink_protocol::envelope::Message;

use crate::session::Session;
use crate::ws_client::TransportError;

/// Sends the one `register` message a connection needs before the relay
/// routes device traffic to it.
#[derive(Debug, Clone, Default)]
pub struct SessionRegistrar;

impl SessionRegistrar {
    pub fn new() -> Self {
        Self
    }

    /// Registration message for a session.
    pub fn registration(session: &Session) -> Message {
        Message::register(session.role())
    }

    /// Announces the session's role. Does nothing if the session is already
    /// registered, so the message goes out at most once per connection.
    pub async fn register(&self, session: &mut Session) -> Result<(), TransportError> {
        if session.is_registered() {
            return Ok(());
        }
        session.send(&Self::registration(session)).await?;
        session.mark_registered();
        info!(session = %session.id(), role = session.role(), "registered with relay");
        Ok(())
    }
}
