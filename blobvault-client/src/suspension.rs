//! Suspension controller
//!
//! Server back-pressure is the only flow control in the transfer path. A
//! 429/503 carrying a wait time moves the controller from `Active` to
//! `Suspended(resume_at)`. While suspended, callers queue in
//! [`SuspensionController::wait_until_active`]; when the window elapses a
//! timer task reverts the state and releases the queue in arrival order.
//!
//! The handle is cheap to clone and meant to be shared by every transfer
//! in the process.

use blobvault_core::error::{Result, VaultError};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Default bound on suspension retries per operation
pub const DEFAULT_MAX_SUSPENSION_RETRIES: u32 = 10;

/// Longest window a single suspension signal can open
pub const MAX_SUSPENSION_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuspensionState {
    Active,
    Suspended { resume_at: Instant },
}

struct Inner {
    resume_at: Option<Instant>,
    /// Incremented on every activation so stale timers leave a newer window alone
    epoch: u64,
    waiters: VecDeque<oneshot::Sender<()>>,
}

#[derive(Clone)]
pub struct SuspensionController {
    inner: Arc<Mutex<Inner>>,
    max_retries: u32,
}

impl Default for SuspensionController {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SUSPENSION_RETRIES)
    }
}

impl SuspensionController {
    pub fn new(max_retries: u32) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                resume_at: None,
                epoch: 0,
                waiters: VecDeque::new(),
            })),
            max_retries,
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn state(&self) -> SuspensionState {
        let inner = self.inner.lock();
        match inner.resume_at {
            Some(resume_at) if resume_at > Instant::now() => SuspensionState::Suspended { resume_at },
            _ => SuspensionState::Active,
        }
    }

    pub fn is_suspended(&self) -> bool {
        matches!(self.state(), SuspensionState::Suspended { .. })
    }

    /// Number of callers waiting for the window to end
    pub fn queued(&self) -> usize {
        self.inner.lock().waiters.len()
    }

    /// Enter `Suspended(now + duration)` unless already suspended.
    ///
    /// `duration` is capped at [`MAX_SUSPENSION_WINDOW`]. Returns `true` if
    /// this call started a new window. Must be called from within a tokio
    /// runtime.
    pub fn activate_if_inactive(&self, duration: Duration) -> bool {
        let now = Instant::now();
        let duration = duration.min(MAX_SUSPENSION_WINDOW);
        let (resume_at, epoch) = {
            let mut inner = self.inner.lock();
            if matches!(inner.resume_at, Some(resume_at) if resume_at > now) {
                return false;
            }
            inner.epoch += 1;
            let resume_at = now + duration;
            inner.resume_at = Some(resume_at);
            (resume_at, inner.epoch)
        };

        info!(window_secs = duration.as_secs(), "Suspension activated");

        let inner = self.inner.clone();
        tokio::spawn(async move {
            tokio::time::sleep_until(resume_at).await;
            let waiters = {
                let mut inner = inner.lock();
                if inner.epoch != epoch {
                    return;
                }
                inner.resume_at = None;
                std::mem::take(&mut inner.waiters)
            };
            debug!(released = waiters.len(), "Suspension window elapsed");
            for waiter in waiters {
                // A dropped receiver is a cancelled caller
                let _ = waiter.send(());
            }
        });

        true
    }

    /// Return once the controller is `Active`, queueing behind earlier callers
    ///
    /// An elapsed window still holds back new callers while earlier waiters
    /// are queued, until the timer task releases them all.
    pub async fn wait_until_active(&self) {
        loop {
            let receiver = {
                let mut inner = self.inner.lock();
                let queue_occupied = !inner.waiters.is_empty();
                let resume_at = inner.resume_at;
                match resume_at {
                    Some(resume_at) if resume_at > Instant::now() || queue_occupied => {
                        let (tx, rx) = oneshot::channel();
                        inner.waiters.push_back(tx);
                        rx
                    }
                    _ => return,
                }
            };
            // Re-check on wake: a new window may have opened meanwhile
            let _ = receiver.await;
        }
    }

    /// Run `op` until it stops signalling suspension.
    ///
    /// Each attempt waits for `Active` first. A suspension signal activates
    /// the controller and loops; any other outcome is returned unchanged.
    /// After `max_retries` retries the operation fails with
    /// [`VaultError::SuspensionRetriesExhausted`].
    pub async fn execute<F, Fut, T>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempts: u32 = 0;
        loop {
            self.wait_until_active().await;
            attempts += 1;

            match op().await {
                Err(VaultError::Suspended { retry_after }) => {
                    // The window applies to every transfer, including after this one gives up
                    self.activate_if_inactive(retry_after);
                    if attempts > self.max_retries {
                        warn!(attempts, "Giving up after repeated suspension");
                        return Err(VaultError::SuspensionRetriesExhausted { attempts });
                    }
                    debug!(attempts, retry_after_secs = retry_after.as_secs(), "Request suspended");
                }
                other => return other,
            }
        }
    }
}
