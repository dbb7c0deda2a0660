//! Minimal in-process relay for connection tests.

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;

/// Accepts a single WebSocket connection.
///
/// Text frames received from the client appear on `received`; frames
/// pushed into `outbound` are sent to the client. Dropping `outbound`
/// closes the connection from the relay side.
pub(crate) struct TestRelay {
    pub(crate) url: String,
    pub(crate) received: mpsc::Receiver<String>,
    pub(crate) outbound: mpsc::Sender<tungstenite::Message>,
}

impl TestRelay {
    pub(crate) async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        let (received_tx, received) = mpsc::channel(64);
        let (outbound, mut outbound_rx) = mpsc::channel::<tungstenite::Message>(64);

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            let (mut write, mut read) = ws.split();
            loop {
                tokio::select! {
                    frame = read.next() => match frame {
                        Some(Ok(tungstenite::Message::Text(text))) => {
                            let _ = received_tx.send(text.as_str().to_owned()).await;
                        }
                        Some(Ok(_)) => {}
                        _ => break,
                    },
                    out = outbound_rx.recv() => match out {
                        Some(msg) => {
                            if write.send(msg).await.is_err() {
                                break;
                            }
                        }
                        None => {
                            let _ = write.close().await;
                            break;
                        }
                    },
                }
            }
        });

        Self {
            url,
            received,
            outbound,
        }
    }
}
