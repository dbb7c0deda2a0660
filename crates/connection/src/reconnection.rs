//! Connect loop with exponential backoff.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::session::{Connector, Session};
use crate::types::{ReconnectConfig, TransportEvent};

/// When the first attempt of a [`connect_loop`] runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirstAttempt {
    /// Initial or operator-requested connect.
    Immediate,
    /// Reconnect after a lost connection.
    AfterBackoff,
}

/// Keeps trying to open a session until one succeeds or `cancel` fires.
///
/// Each scheduled wait is announced as [`TransportEvent::Reconnecting`]
/// and each failure as [`TransportEvent::ConnectFailed`]. Returns `None`
/// only when cancelled.
pub async fn connect_loop(
    connector: Connector,
    backoff: ReconnectConfig,
    first: FirstAttempt,
    events_tx: mpsc::Sender<TransportEvent>,
    cancel: CancellationToken,
) -> Option<Session> {
    let mut attempt: u32 = 0;

    loop {
        attempt = attempt.saturating_add(1);

        // Attempts numbered from the first delayed one.
        let backoff_step = match first {
            FirstAttempt::Immediate => attempt - 1,
            FirstAttempt::AfterBackoff => attempt,
        };
        if backoff_step > 0 {
            let delay = backoff.delay_for_attempt(backoff_step);
            info!(
                attempt,
                delay_secs = format_args!("{:.1}", delay.as_secs_f64()),
                "reconnecting"
            );
            let _ = events_tx
                .send(TransportEvent::Reconnecting {
                    attempt,
                    next_retry: delay,
                })
                .await;

            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("reconnect cancelled");
                    return None;
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }

        if cancel.is_cancelled() {
            return None;
        }

        debug!(url = connector.url(), attempt, "connecting to relay");
        let result = tokio::select! {
            _ = cancel.cancelled() => return None,
            result = connector.connect() => result,
        };

        match result {
            Ok(session) => {
                info!(session = %session.id(), attempt, "connected to relay");
                return Some(session);
            }
            Err(e) => {
                warn!(attempt, error = %e, "connect attempt failed");
                let _ = events_tx
                    .send(TransportEvent::ConnectFailed {
                        attempt,
                        error: e.to_string(),
                    })
                    .await;
            }
        }
    }
}
