//! In-process stand-in for the relay, speaking for the capture device.

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;

use shutterlink_protocol::Message;

/// Something the fake relay observed.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayEvent {
    Connected(usize),
    Message(Message),
    Disconnected(usize),
}

enum Control {
    Send(Message),
    Drop,
}

/// Accepts operator connections one at a time on a local port.
///
/// Messages queued with [`send`](Self::send) while no operator is
/// connected go to the next connection.
pub struct FakeRelay {
    pub url: String,
    events: mpsc::UnboundedReceiver<RelayEvent>,
    control: mpsc::UnboundedSender<Control>,
}

impl FakeRelay {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}/laptop", listener.local_addr().unwrap());
        let (events_tx, events) = mpsc::unbounded_channel();
        let (control, mut control_rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            let mut id = 0;
            while let Ok((stream, _)) = listener.accept().await {
                let Ok(ws) = tokio_tungstenite::accept_async(stream).await else {
                    continue;
                };
                id += 1;
                let _ = events_tx.send(RelayEvent::Connected(id));
                let (mut write, mut read) = ws.split();

                loop {
                    tokio::select! {
                        frame = read.next() => match frame {
                            Some(Ok(WsMessage::Text(text))) => {
                                if let Ok(msg) = Message::from_text(text.as_str()) {
                                    let _ = events_tx.send(RelayEvent::Message(msg));
                                }
                            }
                            Some(Ok(WsMessage::Close(_))) | Some(Err(_)) | None => break,
                            Some(Ok(_)) => {}
                        },
                        ctl = control_rx.recv() => match ctl {
                            Some(Control::Send(msg)) => {
                                let text = msg.to_text().unwrap();
                                if write.send(WsMessage::Text(text.into())).await.is_err() {
                                    break;
                                }
                            }
                            // Drop both halves without a close handshake.
                            Some(Control::Drop) | None => break,
                        },
                    }
                }
                let _ = events_tx.send(RelayEvent::Disconnected(id));
            }
        });

        Self {
            url,
            events,
            control,
        }
    }

    /// Delivers a device message to the operator.
    pub fn send(&self, message: Message) {
        let _ = self.control.send(Control::Send(message));
    }

    /// Cuts the current connection as a network failure would.
    pub fn drop_connection(&self) {
        let _ = self.control.send(Control::Drop);
    }

    pub async fn next_event(&mut self) -> RelayEvent {
        tokio::time::timeout(std::time::Duration::from_secs(5), self.events.recv())
            .await
            .expect("relay event timed out")
            .expect("relay stopped")
    }

    /// Next message the operator sent, skipping connection events.
    pub async fn expect_message(&mut self) -> Message {
        loop {
            if let RelayEvent::Message(msg) = self.next_event().await {
                return msg;
            }
        }
    }

    /// Waits for a new operator connection and returns its number.
    pub async fn expect_connection(&mut self) -> usize {
        loop {
            if let RelayEvent::Connected(id) = self.next_event().await {
                return id;
            }
        }
    }

    /// Returns `true` if nothing arrives within `wait`.
    pub async fn is_quiet(&mut self, wait: std::time::Duration) -> bool {
        tokio::time::timeout(wait, self.events.recv()).await.is_err()
    }
}
