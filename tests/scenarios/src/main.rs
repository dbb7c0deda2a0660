//! End-to-end scenarios: the operator core against an in-process relay
//! that plays the capture device.

#[cfg(test)]
mod relay;

fn main() {
    println!("ShutterLink scenario tests");
    println!("Run `cargo test -p shutterlink-scenarios` to run them.");
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Write};
    use std::path::Path;
    use std::time::Duration;

    use tempfile::TempDir;
    use tokio::sync::mpsc;
    use zip::write::SimpleFileOptions;

    use shutterlink_core::{
        CaptureStatus, ConnectionState, CoreConfig, CoreError, CoreEvent, OperatorCore,
        OperatorHandle, ReconnectConfig, TransferOutcome,
    };
    use shutterlink_protocol::envelope::Message;
    use shutterlink_protocol::messages::{
        CaptureStartedEvent, FileChunk, FileTransferComplete, FileTransferStart,
    };

    use crate::relay::FakeRelay;

    const WAIT: Duration = Duration::from_secs(5);

    // =======================================================================
    // Fixtures
    // =======================================================================

    fn zip_fixture(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in files {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    /// Every event the core emitted so far, plus the live stream.
    struct Observer {
        rx: mpsc::Receiver<CoreEvent>,
        seen: Vec<CoreEvent>,
    }

    impl Observer {
        async fn wait_for(&mut self, mut pred: impl FnMut(&CoreEvent) -> bool) -> CoreEvent {
            let found = tokio::time::timeout(WAIT, async {
                loop {
                    let event = self.rx.recv().await.expect("core stopped");
                    self.seen.push(event.clone());
                    if pred(&event) {
                        return event;
                    }
                }
            })
            .await;
            found.unwrap_or_else(|_| panic!("timed out; events so far: {:#?}", self.seen))
        }

        async fn wait_registered(&mut self) {
            self.wait_for(|e| *e == CoreEvent::Connection(ConnectionState::Registered))
                .await;
        }

        async fn wait_capture(&mut self, status: CaptureStatus) {
            self.wait_for(|e| *e == CoreEvent::Capture(status.clone()))
                .await;
        }

        async fn wait_outcome(&mut self) -> TransferOutcome {
            match self
                .wait_for(|e| matches!(e, CoreEvent::TransferFinished(_)))
                .await
            {
                CoreEvent::TransferFinished(outcome) => outcome,
                _ => unreachable!(),
            }
        }

        fn progress(&self) -> Vec<f64> {
            self.seen
                .iter()
                .filter_map(|e| match e {
                    CoreEvent::Progress(p) => Some(*p),
                    _ => None,
                })
                .collect()
        }
    }

    struct Harness {
        relay: FakeRelay,
        handle: OperatorHandle,
        events: Observer,
        save_dir: TempDir,
    }

    /// Starts a core against a fresh relay and waits until it registered.
    async fn connected() -> Harness {
        let mut relay = FakeRelay::start().await;
        let save_dir = TempDir::new().unwrap();

        let mut config = CoreConfig::new(relay.url.clone(), save_dir.path());
        config.reconnect = ReconnectConfig {
            initial_delay: Duration::from_millis(300),
            max_delay: Duration::from_secs(1),
            backoff_factor: 1.0,
        };
        let (core, handle, rx) = OperatorCore::new(config);
        tokio::spawn(core.run());

        let mut events = Observer {
            rx,
            seen: Vec::new(),
        };
        assert_eq!(relay.expect_message().await, Message::register("laptop"));
        events.wait_registered().await;

        Harness {
            relay,
            handle,
            events,
            save_dir,
        }
    }

    /// Drives the handshake up to `Capturing`.
    async fn capturing(h: &mut Harness, folder: &str) {
        assert_eq!(h.handle.start_capture(folder).await.unwrap(), folder);
        assert_eq!(h.relay.expect_message().await, Message::start_capture(folder));
        h.relay
            .send(Message::CaptureStarted(CaptureStartedEvent {
                folder_name: folder.into(),
            }));
        h.events
            .wait_capture(CaptureStatus::Capturing {
                folder: folder.into(),
            })
            .await;
    }

    /// Stops the capture and announces a transfer of `size` bytes.
    async fn stopped(h: &mut Harness, folder: &str, size: usize) {
        h.handle.stop_capture().await.unwrap();
        assert_eq!(h.relay.expect_message().await, Message::StopCapture);
        h.relay.send(Message::FileTransferStart(FileTransferStart {
            folder_name: folder.into(),
            file_size: size as i64,
        }));
    }

    fn send_chunks(relay: &FakeRelay, chunks: &[&[u8]], last_id: Option<usize>) {
        for (id, bytes) in chunks.iter().enumerate() {
            relay.send(Message::FileChunk(FileChunk::new(
                id as i64,
                bytes,
                Some(id) == last_id,
            )));
        }
    }

    fn complete(relay: &FakeRelay, folder: &str) {
        relay.send(Message::FileTransferComplete(FileTransferComplete {
            folder_name: folder.into(),
        }));
    }

    fn entries(dir: &Path) -> usize {
        std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
    }

    // =======================================================================
    // Scenarios
    // =======================================================================

    #[tokio::test]
    async fn full_capture_is_downloaded_and_extracted() {
        let mut h = connected().await;
        let folder = "20240101_0000";
        let archive = zip_fixture(&[
            ("img_0001.jpg", b"first frame"),
            ("img_0002.jpg", b"second frame"),
            ("img_0003.jpg", b"third frame"),
        ]);

        capturing(&mut h, folder).await;
        stopped(&mut h, folder, archive.len()).await;

        let third = archive.len() / 3;
        let chunks = [
            &archive[..third],
            &archive[third..2 * third],
            &archive[2 * third..],
        ];
        send_chunks(&h.relay, &chunks, Some(2));
        complete(&h.relay, folder);

        let TransferOutcome::Saved(summary) = h.events.wait_outcome().await else {
            panic!("download failed: {:#?}", h.events.seen);
        };
        assert_eq!(summary.folder_name, folder);
        assert_eq!(summary.entry_count, 3);
        assert!(summary.warning.is_none());
        assert_eq!(summary.archive_path, h.save_dir.path().join("20240101_0000.zip"));
        assert_eq!(std::fs::read(&summary.archive_path).unwrap(), archive);
        assert_eq!(
            std::fs::read(summary.extract_dir.join("img_0002.jpg")).unwrap(),
            b"second frame"
        );

        let progress = h.events.progress();
        assert!(progress.windows(2).all(|w| w[0] <= w[1]), "{progress:?}");
        assert_eq!(progress.last().copied(), Some(100.0));

        let snap = h.handle.snapshot().await.unwrap();
        assert!(snap.capture.is_idle());
        assert!(snap.transfer.is_none());
        assert_eq!(snap.progress, 100.0);
        assert!(snap.capture.can_start());
    }

    #[tokio::test]
    async fn dropped_connection_abandons_transfer_and_reconnects() {
        let mut h = connected().await;
        let folder = "field_run";
        let archive = zip_fixture(&[("a.jpg", b"aaaa"), ("b.jpg", b"bbbb")]);

        capturing(&mut h, folder).await;
        stopped(&mut h, folder, archive.len()).await;

        let half = archive.len() / 3;
        send_chunks(&h.relay, &[&archive[..half], &archive[half..2 * half]], None);
        h.events
            .wait_for(|e| matches!(e, CoreEvent::Progress(p) if *p > 60.0))
            .await;

        h.relay.drop_connection();
        h.events.wait_capture(CaptureStatus::Idle).await;
        h.events
            .wait_for(|e| *e == CoreEvent::Connection(ConnectionState::Disconnected))
            .await;

        let snap = h.handle.snapshot().await.unwrap();
        assert!(!snap.registered);
        assert!(snap.transfer.is_none());
        assert!(snap.capture.is_idle());
        assert!(matches!(
            h.handle.start_capture("again").await,
            Err(CoreError::Capture(_))
        ));

        // A fresh connection registers again before anything else.
        assert_eq!(h.relay.expect_connection().await, 2);
        assert_eq!(h.relay.expect_message().await, Message::register("laptop"));
        h.events.wait_registered().await;

        assert_eq!(entries(h.save_dir.path()), 0);
        assert!(
            !h.events
                .seen
                .iter()
                .any(|e| matches!(e, CoreEvent::TransferFinished(_)))
        );
    }

    #[tokio::test]
    async fn blank_folder_name_is_generated_on_the_wire() {
        let mut h = connected().await;

        let name = h.handle.start_capture("").await.unwrap();
        let Message::StartCapture(req) = h.relay.expect_message().await else {
            panic!("expected start_capture");
        };

        assert_eq!(req.folder_name, name);
        assert_eq!(name.len(), 15);
        assert_eq!(&name[8..9], "_");
        assert!(
            name.chars()
                .enumerate()
                .all(|(i, c)| i == 8 || c.is_ascii_digit())
        );
    }

    #[tokio::test]
    async fn second_start_is_refused_without_sending() {
        let mut h = connected().await;
        capturing(&mut h, "run").await;

        assert!(matches!(
            h.handle.start_capture("other").await,
            Err(CoreError::Capture(_))
        ));
        // The next frame on the wire is the stop, not a second start.
        h.handle.stop_capture().await.unwrap();
        assert_eq!(h.relay.expect_message().await, Message::StopCapture);
    }

    #[tokio::test]
    async fn transfer_without_chunks_fails_and_keeps_archive() {
        let mut h = connected().await;
        capturing(&mut h, "empty").await;
        stopped(&mut h, "empty", 0).await;
        complete(&h.relay, "empty");

        let TransferOutcome::Failed {
            folder_name,
            archive_path,
            ..
        } = h.events.wait_outcome().await
        else {
            panic!("an empty payload cannot be a valid archive");
        };
        assert_eq!(folder_name, "empty");
        let kept = archive_path.unwrap();
        assert!(kept.exists());
        assert_eq!(std::fs::metadata(&kept).unwrap().len(), 0);

        let snap = h.handle.snapshot().await.unwrap();
        assert!(snap.capture.is_idle());
    }

    #[tokio::test]
    async fn device_error_returns_capture_to_idle() {
        let mut h = connected().await;
        capturing(&mut h, "run").await;

        h.relay
            .send(Message::Error(shutterlink_protocol::messages::ErrorEvent {
                message: "camera busy".into(),
            }));
        h.events.wait_capture(CaptureStatus::Idle).await;

        assert!(h.handle.start_capture("retry").await.is_ok());
        assert_eq!(
            h.relay.expect_message().await,
            Message::start_capture("retry")
        );
    }

    #[tokio::test]
    async fn manual_reconnect_replaces_the_session() {
        let mut h = connected().await;
        capturing(&mut h, "run").await;

        h.handle.reconnect().await.unwrap();
        h.events.wait_capture(CaptureStatus::Idle).await;

        assert_eq!(h.relay.expect_connection().await, 2);
        assert_eq!(h.relay.expect_message().await, Message::register("laptop"));
        h.events.wait_registered().await;

        assert_eq!(h.handle.start_capture("next").await.unwrap(), "next");
        assert_eq!(h.relay.expect_message().await, Message::start_capture("next"));
    }

    #[tokio::test]
    async fn shutdown_closes_the_connection() {
        let mut h = connected().await;
        h.handle.shutdown().await.unwrap();
        loop {
            if let crate::relay::RelayEvent::Disconnected(id) = h.relay.next_event().await {
                assert_eq!(id, 1);
                break;
            }
        }
        assert!(h.relay.is_quiet(Duration::from_millis(500)).await);
    }
}
