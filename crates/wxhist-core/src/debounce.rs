//! Quiet-period debouncing for rapidly changing input.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::{CancellationToken, DropGuard};

/// Delays propagation of a value until it has been stable for `delay`.
///
/// Each `push` cancels the pending update, if any. Dropping the debouncer (or
/// calling [`Debouncer::cancel`]) cancels the pending update, so nothing is
/// delivered once the owner is gone.
#[derive(Debug)]
pub struct Debouncer<T> {
    delay: Duration,
    tx: Arc<watch::Sender<T>>,
    pending: Mutex<Option<DropGuard>>,
}

impl<T> Debouncer<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    pub fn new(initial: T, delay: Duration) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self {
            delay,
            tx: Arc::new(tx),
            pending: Mutex::new(None),
        }
    }

    /// Feed a new raw value. Must be called from within a tokio runtime.
    pub fn push(&self, value: T) {
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let tx = Arc::clone(&self.tx);
        let delay = self.delay;

        // Replacing the guard cancels the previous pending update.
        *self.pending.lock() = Some(token.drop_guard());

        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = cancelled.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    tx.send_if_modified(|current| {
                        if *current == value {
                            false
                        } else {
                            *current = value;
                            true
                        }
                    });
                }
            }
        });
    }

    /// Drop any pending update without delivering it.
    pub fn cancel(&self) {
        self.pending.lock().take();
    }

    /// Latest debounced value.
    pub fn current(&self) -> T {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.tx.subscribe()
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}
