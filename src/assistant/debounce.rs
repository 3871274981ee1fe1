//! Inactivity debouncer for batching album photos.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, mpsc};
use tracing::warn;

/// Runs a callback once no trigger has arrived for the given duration.
///
/// Each `trigger()` arms or re-arms the timer.
pub struct Debouncer {
    reset_tx: mpsc::Sender<()>,
    cancel: Arc<Notify>,
}

impl Debouncer {
    pub fn new<F>(duration: Duration, callback: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let (reset_tx, mut reset_rx) = mpsc::channel::<()>(16);
        let cancel = Arc::new(Notify::new());
        let cancel_task = cancel.clone();

        tokio::spawn(async move {
            let mut deadline: Option<tokio::time::Instant> = None;
            loop {
                // The timer branch is disabled while no deadline is armed;
                // its placeholder instant is never polled.
                let timer_at = deadline
                    .unwrap_or_else(|| tokio::time::Instant::now() + Duration::from_secs(86400));

                tokio::select! {
                    biased;

                    _ = cancel_task.notified() => break,
                    reset = reset_rx.recv() => {
                        if reset.is_none() {
                            break;
                        }
                        deadline = Some(tokio::time::Instant::now() + duration);
                    }
                    _ = tokio::time::sleep_until(timer_at), if deadline.is_some() => {
                        deadline = None;
                        callback();
                    }
                }
            }
        });

        Self { reset_tx, cancel }
    }

    /// Arm or re-arm the timer.
    pub async fn trigger(&self) {
        if self.reset_tx.send(()).await.is_err() {
            warn!("Debounce channel closed");
        }
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel.notify_one();
    }
}
