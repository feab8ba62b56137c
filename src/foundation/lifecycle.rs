use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use tokio::sync::Notify;

use crate::foundation::error::{LoomError, LoomResult};

/// Cancellation handle shared by a request, its chains and its worker jobs.
///
/// Clones observe the same state. Cancellation is one-way.
#[derive(Clone, Debug, Default)]
pub struct Lifecycle {
    inner: Arc<LifecycleInner>,
}

#[derive(Debug, Default)]
struct LifecycleInner {
    cancelled: AtomicBool,
    notify: Notify,
}

impl Lifecycle {
    /// Fresh, active lifecycle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal cancellation and wake every waiter.
    pub fn cancel(&self) {
        if !self.inner.cancelled.swap(true, Ordering::AcqRel) {
            self.inner.notify.notify_waiters();
        }
    }

    /// Whether [`cancel`](Self::cancel) was called.
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// `Err(Cancelled)` once cancelled. Called at every suspension boundary.
    pub fn check(&self) -> LoomResult<()> {
        if self.is_cancelled() {
            Err(LoomError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Resolve when the lifecycle is cancelled.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }

    /// `true` when both handles share state.
    pub fn same_as(&self, other: &Lifecycle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}
