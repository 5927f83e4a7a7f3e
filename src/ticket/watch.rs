//! One-shot change tokens for cache invalidation.
//!
//! A [`ChangeToken`] fires at most once and cannot be re-armed: firing drops
//! the underlying `tokio::sync::watch` sender, and channel closure is the
//! broadcast. Watchers observe the state at read time or await closure.

use std::sync::Mutex;
use tokio::sync::watch;

#[derive(Debug)]
pub struct ChangeToken {
    sender: Mutex<Option<watch::Sender<()>>>,
    receiver: watch::Receiver<()>,
}

impl ChangeToken {
    #[must_use]
    pub fn new() -> Self {
        let (sender, receiver) = watch::channel(());
        Self {
            sender: Mutex::new(Some(sender)),
            receiver,
        }
    }

    /// Fire the token. Subsequent calls are no-ops.
    pub fn fire(&self) {
        if let Ok(mut sender) = self.sender.lock() {
            sender.take();
        }
    }

    #[must_use]
    pub fn has_fired(&self) -> bool {
        self.sender.lock().map_or(true, |sender| sender.is_none())
    }

    #[must_use]
    pub fn watch(&self) -> ChangeWatcher {
        ChangeWatcher {
            receiver: self.receiver.clone(),
        }
    }
}

impl Default for ChangeToken {
    fn default() -> Self {
        Self::new()
    }
}

/// A handle observing one [`ChangeToken`].
#[derive(Debug, Clone)]
pub struct ChangeWatcher {
    receiver: watch::Receiver<()>,
}

impl ChangeWatcher {
    /// Whether the token has fired, checked without suspending.
    #[must_use]
    pub fn has_fired(&self) -> bool {
        self.receiver.has_changed().is_err()
    }

    /// Resolve once the token fires; returns immediately if it already has.
    pub async fn fired(mut self) {
        // `changed` errors exactly when the sender is gone, which is the fire.
        let _ = self.receiver.changed().await;
    }
}
