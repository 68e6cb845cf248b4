//! Cancellation signal shared by a streamed body and its producer task.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// Signal shared between a response body and the task feeding it, fired
/// when the caller stops reading before the completion finished.
#[derive(Clone)]
pub struct CancelSignal {
    sender: Arc<watch::Sender<bool>>,
    receiver: watch::Receiver<bool>,
    completed: Arc<AtomicBool>,
}

impl CancelSignal {
    pub fn new() -> Self {
        let (sender, receiver) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
            receiver,
            completed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Record that the stream reached its natural end. A later
    /// [`fire`](Self::fire) is then a no-op.
    pub fn mark_completed(&self) {
        self.completed.store(true, Ordering::SeqCst);
    }

    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::SeqCst)
    }

    /// Fire the signal unless the stream already completed.
    ///
    /// Returns true when this call counts as a caller disconnect.
    pub fn fire(&self) -> bool {
        if self.is_completed() {
            return false;
        }
        !self.sender.send_replace(true)
    }

    pub fn is_fired(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolve once the signal fires.
    pub async fn fired(&self) {
        let mut rx = self.receiver.clone();
        if rx.wait_for(|fired| *fired).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::new()
    }
}
