//! Ping pump: periodic keepalive pings.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;

use super::Shutdown;

/// Sends a ping every `period` until the connection shuts down.
///
/// The matching read deadline lives in the read pump.
pub(crate) async fn ping_pump(
    write_tx: mpsc::Sender<tungstenite::Message>,
    period: Duration,
    shutdown: Shutdown,
) {
    let mut interval = tokio::time::interval(period);
    interval.tick().await; // Skip immediate first tick.

    loop {
        tokio::select! {
            _ = shutdown.token().cancelled() => break,
            _ = interval.tick() => {
                let ping = tungstenite::Message::Ping(vec![].into());
                if write_tx.send(ping).await.is_err() {
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ping_pump_stops_on_cancel() {
        let (tx, _rx) = mpsc::channel(16);
        let shutdown = Shutdown::new();

        let s = shutdown.clone();
        let handle = tokio::spawn(async move {
            ping_pump(tx, Duration::from_secs(5), s).await;
        });

        shutdown.close();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("should stop")
            .expect("no panic");
    }

    #[tokio::test(start_paused = true)]
    async fn ping_pump_sends_on_interval() {
        let (tx, mut rx) = mpsc::channel(16);
        let shutdown = Shutdown::new();
        let handle = tokio::spawn(ping_pump(tx, Duration::from_secs(5), shutdown.clone()));

        let first = rx.recv().await.expect("ping after one period");
        assert!(matches!(first, tungstenite::Message::Ping(_)));

        shutdown.close();
        handle.await.unwrap();
    }
}
