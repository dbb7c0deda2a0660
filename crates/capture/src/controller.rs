//! Capture handshake state machine.

use tracing::{debug, info, warn};

use shutterlink_protocol::constants::UNKNOWN_FOLDER;
use shutterlink_protocol::envelope::Message;
use shutterlink_transfer::{TransferError, validate_folder_name};

use crate::error::CaptureError;
use crate::naming::generate_folder_name;
use crate::types::{CaptureJob, CaptureStatus, JobStatus, LinkState};

/// Tracks the capture handshake with the device.
///
/// ```text
/// Idle --start--> AwaitingStart --capture_started--> Capturing
///   ^                  |                                 |
///   |                  +--------------stop---------------+
///   |                                  v
///   +------transfer complete------ AwaitingStop
/// ```
///
/// Remote errors and disconnects return to `Idle` from any state.
#[derive(Debug, Default)]
pub struct CaptureController {
    status: CaptureStatus,
    job: Option<CaptureJob>,
    /// Status before the last command, restored if sending it failed.
    before_send: Option<CaptureStatus>,
}

impl CaptureController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> &CaptureStatus {
        &self.status
    }

    /// Most recent job, including a finished one.
    pub fn job(&self) -> Option<&CaptureJob> {
        self.job.as_ref()
    }

    /// Validates a start request and returns the command to send.
    ///
    /// A blank `folder_name` is replaced by a timestamp-derived name.
    pub fn request_start(
        &mut self,
        folder_name: &str,
        link: LinkState,
        transfer_active: Option<&str>,
    ) -> Result<Message, CaptureError> {
        check_link(link)?;
        if let Some(folder) = self.status.folder() {
            return Err(CaptureError::AlreadyActive(folder.to_string()));
        }
        if let Some(folder) = transfer_active {
            return Err(CaptureError::TransferInProgress(folder.to_string()));
        }

        let trimmed = folder_name.trim();
        let folder = if trimmed.is_empty() {
            let generated = generate_folder_name();
            debug!(folder = %generated, "generated folder name");
            generated
        } else {
            validate_folder_name(trimmed).map_err(|e| match e {
                TransferError::InvalidName(reason) => CaptureError::InvalidName(reason),
                other => CaptureError::InvalidName(other.to_string()),
            })?;
            trimmed.to_string()
        };

        self.before_send = Some(self.status.clone());
        self.status = CaptureStatus::AwaitingStart {
            folder: folder.clone(),
        };
        self.job = Some(CaptureJob {
            folder_name: folder.clone(),
            status: JobStatus::Requested,
        });
        Ok(Message::start_capture(folder))
    }

    /// Validates a stop request and returns the command to send.
    pub fn request_stop(&mut self, link: LinkState) -> Result<Message, CaptureError> {
        check_link(link)?;
        let folder = match &self.status {
            CaptureStatus::AwaitingStart { folder } | CaptureStatus::Capturing { folder } => {
                folder.clone()
            }
            _ => return Err(CaptureError::NotCapturing),
        };

        self.before_send = Some(self.status.clone());
        self.status = CaptureStatus::AwaitingStop { folder };
        Ok(Message::StopCapture)
    }

    /// Undoes the last request after its message could not be sent.
    pub fn on_send_failed(&mut self) -> bool {
        let Some(previous) = self.before_send.take() else {
            return false;
        };
        if previous.is_idle() {
            self.job = None;
        }
        self.set(previous)
    }

    /// Device acknowledged a start. Returns `true` if the status changed.
    pub fn on_capture_started(&mut self, folder_name: &str) -> bool {
        self.before_send = None;
        match &self.status {
            CaptureStatus::AwaitingStart { folder }
                if folder_name.is_empty() || folder_name == folder.as_str() =>
            {
                let folder = folder.clone();
                info!(folder = %folder, "capture started on device");
                self.mark_job(JobStatus::Running);
                self.set(CaptureStatus::Capturing { folder })
            }
            CaptureStatus::AwaitingStart { folder } => {
                warn!(
                    requested = %folder,
                    acknowledged = %folder_name,
                    "capture started for a different folder, still waiting"
                );
                false
            }
            CaptureStatus::Idle => {
                // Started elsewhere, or before a reconnect.
                let folder = if folder_name.is_empty() {
                    UNKNOWN_FOLDER.to_string()
                } else {
                    folder_name.to_string()
                };
                info!(folder = %folder, "device reports a capture in progress");
                self.job = Some(CaptureJob {
                    folder_name: folder.clone(),
                    status: JobStatus::Running,
                });
                self.set(CaptureStatus::Capturing { folder })
            }
            CaptureStatus::Capturing { .. } | CaptureStatus::AwaitingStop { .. } => {
                warn!(folder = %folder_name, "duplicate capture started ignored");
                false
            }
        }
    }

    /// Archive delivered; the job is over.
    pub fn on_transfer_complete(&mut self) -> bool {
        self.mark_job(JobStatus::Completed);
        self.reset()
    }

    /// Device reported an error; any active job has failed.
    pub fn on_remote_error(&mut self) -> bool {
        self.mark_job(JobStatus::Failed);
        self.reset()
    }

    /// Channel lost; nothing the device acknowledged can be relied on.
    pub fn on_disconnect(&mut self) -> bool {
        self.mark_job(JobStatus::Failed);
        self.reset()
    }

    fn reset(&mut self) -> bool {
        self.before_send = None;
        self.set(CaptureStatus::Idle)
    }

    fn mark_job(&mut self, status: JobStatus) {
        if self.status.is_idle() {
            return;
        }
        if let Some(job) = self.job.as_mut() {
            job.status = status;
        }
    }

    fn set(&mut self, status: CaptureStatus) -> bool {
        if self.status == status {
            return false;
        }
        debug!(from = %self.status, to = %status, "capture status changed");
        self.status = status;
        true
    }
}

fn check_link(link: LinkState) -> Result<(), CaptureError> {
    if !link.connected {
        return Err(CaptureError::NotConnected);
    }
    if !link.registered {
        return Err(CaptureError::NotRegistered);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started(ctrl: &mut CaptureController, name: &str) {
        ctrl.request_start(name, LinkState::ready(), None).unwrap();
        assert!(ctrl.on_capture_started(name));
    }

    #[test]
    fn start_sends_named_command() {
        let mut ctrl = CaptureController::new();
        let msg = ctrl
            .request_start("20240101_0000", LinkState::ready(), None)
            .unwrap();
        assert_eq!(msg, Message::start_capture("20240101_0000"));
        assert_eq!(
            ctrl.status(),
            &CaptureStatus::AwaitingStart {
                folder: "20240101_0000".into()
            }
        );
        assert_eq!(ctrl.job().unwrap().status, JobStatus::Requested);
    }

    #[test]
    fn blank_name_is_generated() {
        let mut ctrl = CaptureController::new();
        let msg = ctrl.request_start("  ", LinkState::ready(), None).unwrap();
        let Message::StartCapture(req) = msg else {
            panic!("expected start_capture");
        };
        assert_eq!(req.folder_name.len(), 15);
        assert_eq!(ctrl.status().folder(), Some(req.folder_name.as_str()));
    }

    #[test]
    fn start_requires_connection_and_registration() {
        let mut ctrl = CaptureController::new();
        assert_eq!(
            ctrl.request_start("run", LinkState::default(), None),
            Err(CaptureError::NotConnected)
        );
        let unregistered = LinkState {
            connected: true,
            registered: false,
        };
        assert_eq!(
            ctrl.request_start("run", unregistered, None),
            Err(CaptureError::NotRegistered)
        );
        assert!(ctrl.status().is_idle());
    }

    #[test]
    fn start_is_never_sent_twice() {
        let mut ctrl = CaptureController::new();
        ctrl.request_start("run", LinkState::ready(), None).unwrap();
        assert_eq!(
            ctrl.request_start("other", LinkState::ready(), None),
            Err(CaptureError::AlreadyActive("run".into()))
        );
        ctrl.on_capture_started("run");
        assert!(ctrl.request_start("other", LinkState::ready(), None).is_err());
        ctrl.request_stop(LinkState::ready()).unwrap();
        assert!(ctrl.request_start("other", LinkState::ready(), None).is_err());

        ctrl.on_transfer_complete();
        assert!(ctrl.request_start("other", LinkState::ready(), None).is_ok());
    }

    #[test]
    fn unsafe_folder_names_are_refused_before_sending() {
        let mut ctrl = CaptureController::new();
        for name in ["a/b", "..", "..\\up", "/abs"] {
            assert!(matches!(
                ctrl.request_start(name, LinkState::ready(), None),
                Err(CaptureError::InvalidName(_))
            ));
        }
        assert!(ctrl.status().is_idle());
        assert!(ctrl.job().is_none());
        assert!(ctrl.request_start("field run 3", LinkState::ready(), None).is_ok());
    }

    #[test]
    fn start_rejected_while_transfer_in_progress() {
        let mut ctrl = CaptureController::new();
        assert_eq!(
            ctrl.request_start("next", LinkState::ready(), Some("prev")),
            Err(CaptureError::TransferInProgress("prev".into()))
        );
    }

    #[test]
    fn full_cycle() {
        let mut ctrl = CaptureController::new();
        started(&mut ctrl, "run");
        assert_eq!(ctrl.job().unwrap().status, JobStatus::Running);

        assert_eq!(ctrl.request_stop(LinkState::ready()), Ok(Message::StopCapture));
        assert_eq!(
            ctrl.status(),
            &CaptureStatus::AwaitingStop {
                folder: "run".into()
            }
        );

        assert!(ctrl.on_transfer_complete());
        assert!(ctrl.status().is_idle());
        assert_eq!(ctrl.job().unwrap().status, JobStatus::Completed);
    }

    #[test]
    fn stop_allowed_while_awaiting_start() {
        let mut ctrl = CaptureController::new();
        ctrl.request_start("run", LinkState::ready(), None).unwrap();
        assert!(ctrl.request_stop(LinkState::ready()).is_ok());
    }

    #[test]
    fn stop_when_idle_is_rejected() {
        let mut ctrl = CaptureController::new();
        assert_eq!(
            ctrl.request_stop(LinkState::ready()),
            Err(CaptureError::NotCapturing)
        );
    }

    #[test]
    fn stop_requires_connection() {
        let mut ctrl = CaptureController::new();
        started(&mut ctrl, "run");
        assert_eq!(
            ctrl.request_stop(LinkState::default()),
            Err(CaptureError::NotConnected)
        );
    }

    #[test]
    fn mismatched_ack_keeps_waiting() {
        let mut ctrl = CaptureController::new();
        ctrl.request_start("run", LinkState::ready(), None).unwrap();
        assert!(!ctrl.on_capture_started("other"));
        assert!(matches!(ctrl.status(), CaptureStatus::AwaitingStart { .. }));
    }

    #[test]
    fn empty_ack_matches_pending_start() {
        let mut ctrl = CaptureController::new();
        ctrl.request_start("run", LinkState::ready(), None).unwrap();
        assert!(ctrl.on_capture_started(""));
        assert_eq!(ctrl.status().folder(), Some("run"));
    }

    #[test]
    fn unsolicited_ack_is_adopted() {
        let mut ctrl = CaptureController::new();
        assert!(ctrl.on_capture_started("remote"));
        assert_eq!(
            ctrl.status(),
            &CaptureStatus::Capturing {
                folder: "remote".into()
            }
        );
        assert!(!ctrl.on_capture_started("remote"));
    }

    #[test]
    fn remote_error_returns_to_idle() {
        let mut ctrl = CaptureController::new();
        started(&mut ctrl, "run");
        assert!(ctrl.on_remote_error());
        assert!(ctrl.status().is_idle());
        assert_eq!(ctrl.job().unwrap().status, JobStatus::Failed);
        assert!(!ctrl.on_remote_error());
    }

    #[test]
    fn disconnect_returns_to_idle() {
        let mut ctrl = CaptureController::new();
        started(&mut ctrl, "run");
        ctrl.request_stop(LinkState::ready()).unwrap();
        assert!(ctrl.on_disconnect());
        assert!(ctrl.status().is_idle());
    }

    #[test]
    fn failed_send_restores_previous_status() {
        let mut ctrl = CaptureController::new();
        ctrl.request_start("run", LinkState::ready(), None).unwrap();
        assert!(ctrl.on_send_failed());
        assert!(ctrl.status().is_idle());
        assert!(ctrl.job().is_none());

        started(&mut ctrl, "run");
        ctrl.request_stop(LinkState::ready()).unwrap();
        assert!(ctrl.on_send_failed());
        assert_eq!(
            ctrl.status(),
            &CaptureStatus::Capturing {
                folder: "run".into()
            }
        );
        assert!(!ctrl.on_send_failed());
    }
}
