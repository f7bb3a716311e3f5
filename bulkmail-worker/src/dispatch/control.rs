//! Pause, resume and cancel signals for a running job.
//!
//! The dispatcher consults the control at its suspension points: before each
//! send and during the pacing wait. A send already in flight is never
//! interrupted.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::sleep;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    Run,
    Pause,
    Cancel,
}

/// Returned when a suspension point observes cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

/// Cloneable handle shared between the dispatcher and whoever steers the job.
///
/// Cancellation is terminal; pause and resume have no effect afterwards.
#[derive(Debug, Clone)]
pub struct JobControl {
    tx: Arc<watch::Sender<ControlSignal>>,
}

impl Default for JobControl {
    fn default() -> Self {
        Self::new()
    }
}

impl JobControl {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ControlSignal::Run);
        Self { tx: Arc::new(tx) }
    }

    pub fn signal(&self) -> ControlSignal {
        *self.tx.borrow()
    }

    pub fn is_cancelled(&self) -> bool {
        self.signal() == ControlSignal::Cancel
    }

    pub fn is_paused(&self) -> bool {
        self.signal() == ControlSignal::Pause
    }

    /// Returns `true` if the job was running and is now paused.
    pub fn pause(&self) -> bool {
        self.tx.send_if_modified(|signal| {
            if *signal == ControlSignal::Run {
                *signal = ControlSignal::Pause;
                true
            } else {
                false
            }
        })
    }

    /// Returns `true` if the job was paused and is now running.
    pub fn resume(&self) -> bool {
        self.tx.send_if_modified(|signal| {
            if *signal == ControlSignal::Pause {
                *signal = ControlSignal::Run;
                true
            } else {
                false
            }
        })
    }

    pub fn cancel(&self) {
        self.tx.send_replace(ControlSignal::Cancel);
    }

    /// Wait until the job may proceed to its next send.
    ///
    /// Returns immediately while running; blocks while paused.
    pub async fn checkpoint(&self) -> Result<(), Cancelled> {
        let mut rx = self.tx.subscribe();
        loop {
            let signal = *rx.borrow_and_update();
            match signal {
                ControlSignal::Run => return Ok(()),
                ControlSignal::Cancel => return Err(Cancelled),
                ControlSignal::Pause => {}
            }
            if rx.changed().await.is_err() {
                return Ok(());
            }
        }
    }

    /// Sleep for `duration` unless cancelled first.
    ///
    /// Pausing does not shorten or extend the wait; it takes effect at the
    /// next [`checkpoint`](Self::checkpoint).
    pub async fn sleep(&self, duration: Duration) -> Result<(), Cancelled> {
        let mut rx = self.tx.subscribe();
        let timer = sleep(duration);
        tokio::pin!(timer);

        loop {
            if *rx.borrow_and_update() == ControlSignal::Cancel {
                return Err(Cancelled);
            }
            tokio::select! {
                _ = &mut timer => return Ok(()),
                changed = rx.changed() => {
                    if changed.is_err() {
                        timer.as_mut().await;
                        return Ok(());
                    }
                }
            }
        }
    }
}
