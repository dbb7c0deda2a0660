//! Write pump: the only writer of outbound frames.

use std::time::Duration;

use futures_util::SinkExt;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use tracing::error;

use super::Shutdown;
use crate::types::CloseReason;

/// Writes queued frames to the WebSocket, one at a time.
///
/// A write that fails or stalls for longer than `write_timeout` ends the
/// connection with a network failure.
pub(crate) async fn write_pump<S>(
    mut write: S,
    mut write_rx: mpsc::Receiver<tungstenite::Message>,
    write_timeout: Duration,
    shutdown: Shutdown,
) where
    S: SinkExt<tungstenite::Message, Error = tungstenite::Error> + Unpin,
{
    let mut failed = false;
    loop {
        tokio::select! {
            _ = shutdown.token().cancelled() => break,
            msg = write_rx.recv() => {
                let Some(m) = msg else { break };
                match tokio::time::timeout(write_timeout, write.send(m)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        error!("WebSocket write error: {e}");
                        shutdown.fail(CloseReason::Network(e.to_string()));
                        failed = true;
                        break;
                    }
                    Err(_) => {
                        error!("WebSocket write timed out");
                        shutdown.fail(CloseReason::Network("write timed out".into()));
                        failed = true;
                        break;
                    }
                }
            }
        }
    }

    if !failed {
        let _ = write.send(tungstenite::Message::Close(None)).await;
    }
}
