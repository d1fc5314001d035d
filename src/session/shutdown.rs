//! Cancellable delayed shutdown.
//!
//! The race between cancellation and the timer firing is resolved
//! happens-before: a cancel that lands before the wake prevents the action
//! from ever running, and a cancel that lands after the wake is a no-op.
//! The action itself must tolerate running concurrently with a normal
//! close (room deletion is idempotent).

use std::future::Future;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::debug;

pub struct ShutdownTimer;

impl ShutdownTimer {
    /// Schedule `action` to run after `delay` unless cancelled first.
    pub fn arm<F>(delay: Duration, action: F) -> ShutdownHandle
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            tokio::select! {
                _ = sleep(delay) => action.await,
                _ = cancel_rx => debug!("delayed shutdown cancelled"),
            }
        });
        ShutdownHandle {
            cancel: Some(cancel_tx),
            task,
        }
    }
}

pub struct ShutdownHandle {
    cancel: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl ShutdownHandle {
    /// Cancel the pending action. Safe to call more than once and after
    /// the action has fired.
    pub fn cancel(&mut self) {
        if let Some(tx) = self.cancel.take() {
            // A send error means the timer already fired; the race was lost
            // and the duplicate shutdown downstream is benign.
            let _ = tx.send(());
        }
    }

    /// True while the action is still pending.
    pub fn is_armed(&self) -> bool {
        self.cancel.is_some() && !self.task.is_finished()
    }
}
