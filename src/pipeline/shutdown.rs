//! Cooperative shutdown signal shared by every pipeline activity.

use std::sync::Arc;
use tokio::sync::watch;

/// A cloneable cancellation token.
///
/// Any clone can trigger it; every clone observes it. Usable from both the
/// blocking sampling thread (`is_triggered`) and async tasks (`triggered`).
#[derive(Debug, Clone)]
pub struct Shutdown {
    sender: Arc<watch::Sender<bool>>,
    receiver: watch::Receiver<bool>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (sender, receiver) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
            receiver,
        }
    }

    /// Request shutdown. Idempotent.
    pub fn trigger(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolve once shutdown has been requested.
    pub async fn triggered(&self) {
        let mut receiver = self.receiver.clone();
        // The sender lives in `self`, so `wait_for` cannot fail while we hold it.
        let _ = receiver.wait_for(|stopped| *stopped).await;
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
