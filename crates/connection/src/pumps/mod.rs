//! Background tasks driving one WebSocket connection.

pub(crate) mod ping;
pub(crate) mod read;
pub(crate) mod write;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio_util::sync::CancellationToken;

use crate::types::CloseReason;

/// State shared by the pumps of one connection.
///
/// Whichever pump fails first records the reason and cancels the others;
/// the read pump then reports the close exactly once.
#[derive(Clone)]
pub(crate) struct Shutdown {
    cancel: CancellationToken,
    failure: Arc<std::sync::Mutex<Option<CloseReason>>>,
    closed: Arc<AtomicBool>,
}

impl Shutdown {
    pub(crate) fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
            failure: Arc::new(std::sync::Mutex::new(None)),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Records a failure (first one wins) and stops all pumps.
    pub(crate) fn fail(&self, reason: CloseReason) {
        if let Ok(mut slot) = self.failure.lock() {
            if slot.is_none() {
                *slot = Some(reason);
            }
        }
        self.close();
    }

    /// Stops all pumps without recording a failure.
    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::Relaxed);
        self.cancel.cancel();
    }

    /// Takes the recorded failure, if any.
    pub(crate) fn take_failure(&self) -> Option<CloseReason> {
        self.failure.lock().ok().and_then(|mut slot| slot.take())
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }
}
