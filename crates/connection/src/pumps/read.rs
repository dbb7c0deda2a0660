//! Read pump: the single inbound delivery path of a session.

use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use tracing::{debug, trace, warn};

use shutterlink_protocol::envelope::Message;

use super::Shutdown;
use crate::types::{CloseReason, SessionId, TransportEvent};

/// Limits applied by the read pump.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ReadLimits {
    pub(crate) pong_wait: Duration,
    pub(crate) max_message_size: usize,
}

/// Reads frames, parses text frames into [`Message`]s and forwards them
/// in arrival order. Emits exactly one [`TransportEvent::Closed`] on exit.
///
/// Any incoming frame resets the read deadline; if nothing arrives within
/// `pong_wait` the connection is considered dead.
pub(crate) async fn read_pump<S>(
    mut read: S,
    session: SessionId,
    events_tx: mpsc::Sender<TransportEvent>,
    write_tx: mpsc::Sender<tungstenite::Message>,
    limits: ReadLimits,
    shutdown: Shutdown,
) where
    S: StreamExt<Item = Result<tungstenite::Message, tungstenite::Error>> + Unpin,
{
    let deadline = tokio::time::sleep(limits.pong_wait);
    tokio::pin!(deadline);

    let reason = loop {
        tokio::select! {
            _ = shutdown.token().cancelled() => {
                break shutdown.take_failure().unwrap_or(CloseReason::Local);
            }

            () = &mut deadline => {
                warn!(%session, "pong timeout, closing dead connection");
                break CloseReason::KeepaliveTimeout;
            }

            frame = read.next() => {
                let frame = match frame {
                    Some(Ok(frame)) => frame,
                    Some(Err(e)) => {
                        warn!(%session, "WebSocket read error: {e}");
                        break CloseReason::Network(e.to_string());
                    }
                    None => {
                        debug!(%session, "WebSocket stream ended");
                        break CloseReason::Peer { code: None, reason: String::new() };
                    }
                };

                deadline.as_mut().reset(tokio::time::Instant::now() + limits.pong_wait);

                match frame {
                    tungstenite::Message::Text(text) => {
                        if let Some(message) = parse_text(&text, limits.max_message_size) {
                            let event = TransportEvent::Message { session, message };
                            if events_tx.send(event).await.is_err() {
                                debug!(%session, "event receiver gone, stopping read pump");
                                break CloseReason::Local;
                            }
                        }
                    }
                    tungstenite::Message::Ping(data) => {
                        trace!("received ping, sending pong");
                        let _ = write_tx.send(tungstenite::Message::Pong(data)).await;
                    }
                    tungstenite::Message::Pong(_) => {
                        trace!("received pong");
                    }
                    tungstenite::Message::Close(frame) => {
                        debug!(%session, "received close frame");
                        break match frame {
                            Some(f) => CloseReason::Peer {
                                code: Some(u16::from(f.code)),
                                reason: f.reason.as_str().to_owned(),
                            },
                            None => CloseReason::Peer { code: None, reason: String::new() },
                        };
                    }
                    tungstenite::Message::Binary(data) => {
                        debug!(len = data.len(), "ignoring binary frame");
                    }
                    tungstenite::Message::Frame(_) => {}
                }
            }
        }
    };

    shutdown.close();
    debug!(%session, %reason, "connection closed");
    let _ = events_tx
        .send(TransportEvent::Closed { session, reason })
        .await;
}

/// Parses a text frame. Oversized or malformed frames are logged and dropped;
/// the connection stays up.
fn parse_text(text: &str, max_message_size: usize) -> Option<Message> {
    if text.len() > max_message_size {
        warn!("message too large ({} bytes), dropping", text.len());
        return None;
    }

    match Message::from_text(text) {
        Ok(message) => {
            trace!(msg_type = %message.msg_type(), "received message");
            Some(message)
        }
        Err(e) => {
            warn!("failed to parse message: {e}");
            None
        }
    }
}
