//! Relay connection for the operator endpoint.
//!
//! Provides the WebSocket transport, per-connection sessions, role
//! registration and the backoff-driven connect loop.

mod pumps;
pub mod reconnection;
pub mod registrar;
pub mod session;
pub mod types;
pub mod ws_client;

#[cfg(test)]
mod test_relay;

pub use reconnection::{FirstAttempt, connect_loop};
pub use registrar::SessionRegistrar;
pub use session::{Connector, Session};
pub use types::{
    CloseReason, ConnectionState, ReconnectConfig, SessionId, TransportConfig, TransportEvent,
};
pub use ws_client::{TransportError, WsClient};
