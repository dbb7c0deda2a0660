//! Public types for the relay connection.

use std::fmt;
use std::time::Duration;

use shutterlink_protocol::constants::{
    WS_CONNECT_TIMEOUT, WS_MAX_MESSAGE_SIZE, WS_PING_PERIOD, WS_PONG_WAIT, WS_SEND_TIMEOUT,
};
use shutterlink_protocol::envelope::Message;

/// Identifies one connection lifetime. A fresh id is minted on every
/// successful connect, so events from a replaced connection can be told
/// apart from the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(uuid::Uuid);

impl SessionId {
    pub(crate) fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form is enough to correlate log lines.
        let s = self.0.simple().to_string();
        f.write_str(&s[..8])
    }
}

/// Connection state of the operator endpoint.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionState {
    /// WebSocket handshake in progress.
    Connecting,
    /// Channel open, registration not yet sent.
    Connected,
    /// Channel open and role announced to the relay.
    Registered,
    /// Connection lost, waiting before the next attempt.
    Reconnecting { attempt: u32 },
    /// No connection and none scheduled.
    Disconnected,
}

impl ConnectionState {
    /// Returns `true` while a channel is open.
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected | ConnectionState::Registered)
    }
}

/// Why a connection ended.
#[derive(Debug, Clone, PartialEq)]
pub enum CloseReason {
    /// The relay closed the connection (close frame or clean end of stream).
    Peer { code: Option<u16>, reason: String },
    /// Transport failure while reading or writing.
    Network(String),
    /// Nothing arrived within the pong wait.
    KeepaliveTimeout,
    /// Closed by this endpoint.
    Local,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::Peer { code: Some(code), reason } if !reason.is_empty() => {
                write!(f, "closed by relay ({code}: {reason})")
            }
            CloseReason::Peer { code: Some(code), .. } => write!(f, "closed by relay ({code})"),
            CloseReason::Peer { code: None, .. } => f.write_str("closed by relay"),
            CloseReason::Network(e) => write!(f, "network error: {e}"),
            CloseReason::KeepaliveTimeout => f.write_str("keepalive timeout"),
            CloseReason::Local => f.write_str("closed locally"),
        }
    }
}

/// Events produced by the transport, delivered in arrival order.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// A message arrived on the given connection.
    Message { session: SessionId, message: Message },
    /// The given connection ended. Fires exactly once per started session.
    Closed {
        session: SessionId,
        reason: CloseReason,
    },
    /// A connect attempt is scheduled after `next_retry`.
    Reconnecting { attempt: u32, next_retry: Duration },
    /// A connect attempt failed.
    ConnectFailed { attempt: u32, error: String },
}

/// Timeouts and limits for one relay connection.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Bound on TCP connect plus WebSocket handshake.
    pub connect_timeout: Duration,
    /// Bound on handing a message to the connection.
    pub send_timeout: Duration,
    /// Keepalive ping interval.
    pub ping_period: Duration,
    /// Read deadline, reset by any inbound frame.
    pub pong_wait: Duration,
    /// Largest inbound message accepted.
    pub max_message_size: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: WS_CONNECT_TIMEOUT,
            send_timeout: WS_SEND_TIMEOUT,
            ping_period: WS_PING_PERIOD,
            pong_wait: WS_PONG_WAIT,
            max_message_size: WS_MAX_MESSAGE_SIZE,
        }
    }
}

/// Configuration for automatic reconnection with exponential backoff.
///
/// A `backoff_factor` of 1.0 gives a flat retry delay.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt.
    pub initial_delay: Duration,
    /// Maximum delay between attempts (backoff cap).
    pub max_delay: Duration,
    /// Multiplier for each subsequent attempt.
    pub backoff_factor: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(60),
            backoff_factor: 2.0,
        }
    }
}

impl ReconnectConfig {
    /// Calculates the delay for a given attempt number (1-based),
    /// with ±25% jitter so several operators do not retry in lockstep.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(63) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.backoff_factor.max(1.0).powi(exp);
        let capped = secs.min(self.max_delay.as_secs_f64());
        let jitter = capped * 0.25;
        let offset = (std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .subsec_nanos() as f64
            / u32::MAX as f64)
            * 2.0
            - 1.0; // [-1.0, 1.0)
        let with_jitter = (capped + jitter * offset).max(0.01);
        Duration::from_secs_f64(with_jitter)
    }
}
