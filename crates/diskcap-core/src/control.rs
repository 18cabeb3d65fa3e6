//! Cancellation for in-flight batches and poll loops.
//!
//! A `CancelToken` is cloned into every unit of work. Units check it before
//! each attempt and race it against every suspension point (transport call,
//! backoff sleep, poll interval), then finalize with a Canceled result.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Inner {
    canceled: AtomicBool,
    notify: Notify,
}

/// Shared abort flag with an awaitable wakeup.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent; wakes every task waiting in `canceled()`.
    pub fn cancel(&self) {
        self.inner.canceled.store(true, Ordering::Release);
        self.inner.notify.notify_waiters();
    }

    pub fn is_canceled(&self) -> bool {
        self.inner.canceled.load(Ordering::Acquire)
    }

    /// Completes once `cancel()` has been called.
    pub async fn canceled(&self) {
        loop {
            // Registered before the flag check so a concurrent cancel() is not missed.
            let notified = self.inner.notify.notified();
            if self.is_canceled() {
                return;
            }
            notified.await;
        }
    }
}
