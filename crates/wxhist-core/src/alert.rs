//! Single-slot transient notification channel.
//!
//! At most one alert is live at a time. `show` replaces whatever is visible and
//! there is no queue, so an error followed immediately by a success only ever
//! shows the success.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::{CancellationToken, DropGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub kind: AlertKind,
    pub message: String,
}

/// Cloneable handle to the alert slot. Pass it explicitly to every component that
/// needs to notify the user.
#[derive(Debug, Clone)]
pub struct AlertChannel {
    inner: Arc<AlertInner>,
}

#[derive(Debug)]
struct AlertInner {
    tx: watch::Sender<Option<Alert>>,
    shown: AtomicU64,
}

impl Default for AlertChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl AlertChannel {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            inner: Arc::new(AlertInner {
                tx,
                shown: AtomicU64::new(0),
            }),
        }
    }

    /// Replace the current alert.
    pub fn show(&self, kind: AlertKind, message: impl Into<String>) {
        let alert = Alert {
            kind,
            message: message.into(),
        };
        match kind {
            AlertKind::Success => tracing::info!("Alert: {}", alert.message),
            AlertKind::Error => tracing::warn!("Alert: {}", alert.message),
        }
        self.inner.shown.fetch_add(1, Ordering::SeqCst);
        self.inner.tx.send_replace(Some(alert));
    }

    pub fn success(&self, message: impl Into<String>) {
        self.show(AlertKind::Success, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.show(AlertKind::Error, message);
    }

    pub fn clear(&self) {
        self.inner.tx.send_if_modified(|slot| slot.take().is_some());
    }

    pub fn current(&self) -> Option<Alert> {
        self.inner.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Alert>> {
        self.inner.tx.subscribe()
    }

    /// Total number of `show` calls over the channel's lifetime.
    pub fn shown_count(&self) -> u64 {
        self.inner.shown.load(Ordering::SeqCst)
    }

    /// Clear each alert once it has been visible for `after`, unless a newer alert
    /// replaced it in the meantime. The timer stops when the returned handle is dropped.
    pub fn spawn_auto_dismiss(&self, after: Duration) -> AutoDismiss {
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let channel = self.clone();

        tokio::spawn(async move {
            let mut rx = channel.subscribe();
            loop {
                let seq = channel.shown_count();
                let visible = rx.borrow_and_update().is_some();

                if visible {
                    tokio::select! {
                        biased;
                        _ = cancelled.cancelled() => return,
                        _ = tokio::time::sleep(after) => {
                            if channel.shown_count() == seq {
                                channel.clear();
                            }
                        }
                        changed = rx.changed() => {
                            if changed.is_err() {
                                return;
                            }
                        }
                    }
                } else {
                    tokio::select! {
                        biased;
                        _ = cancelled.cancelled() => return,
                        changed = rx.changed() => {
                            if changed.is_err() {
                                return;
                            }
                        }
                    }
                }
            }
        });

        AutoDismiss {
            _guard: token.drop_guard(),
        }
    }
}

/// Keeps the auto-dismiss timer alive.
#[derive(Debug)]
pub struct AutoDismiss {
    _guard: DropGuard,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn show_replaces_previous_alert() {
        let alerts = AlertChannel::new();
        alerts.error("first");
        alerts.success("second");

        let current = alerts.current().unwrap();
        assert_eq!(current.kind, AlertKind::Success);
        assert_eq!(current.message, "second");
        assert_eq!(alerts.shown_count(), 2);
    }

    #[test]
    fn clear_removes_alert() {
        let alerts = AlertChannel::new();
        alerts.error("oops");
        alerts.clear();
        assert!(alerts.current().is_none());
        // clearing an empty slot is a no-op
        alerts.clear();
        assert!(alerts.current().is_none());
    }

    #[test]
    fn clones_share_the_slot() {
        let alerts = AlertChannel::new();
        let other = alerts.clone();
        other.success("done");
        assert_eq!(alerts.current().unwrap().message, "done");
    }

    #[tokio::test(start_paused = true)]
    async fn auto_dismiss_clears_after_timeout() {
        let alerts = AlertChannel::new();
        let _timer = alerts.spawn_auto_dismiss(Duration::from_millis(6000));
        tokio::task::yield_now().await;

        alerts.error("boom");
        tokio::time::sleep(Duration::from_millis(5000)).await;
        assert!(alerts.current().is_some());

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(alerts.current().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_auto_dismiss_leaves_alert() {
        let alerts = AlertChannel::new();
        let timer = alerts.spawn_auto_dismiss(Duration::from_millis(100));
        tokio::task::yield_now().await;
        alerts.success("kept");
        drop(timer);

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(alerts.current().unwrap().message, "kept");
    }
}
