use std::panic::{AssertUnwindSafe, catch_unwind};

use tokio::sync::oneshot;

use crate::foundation::error::{LoomError, LoomResult};
use crate::foundation::lifecycle::Lifecycle;

/// Decode workers. Jobs are blocking; callers await them through a one-shot hand-off.
#[derive(Debug)]
pub struct WorkerPool {
    pool: rayon::ThreadPool,
}

impl WorkerPool {
    /// Build a pool with `threads` workers, or rayon's default count when `None`.
    pub fn new(threads: Option<usize>) -> LoomResult<Self> {
        let mut builder =
            rayon::ThreadPoolBuilder::new().thread_name(|i| format!("imageloom-decode-{i}"));
        if let Some(n) = threads {
            builder = builder.num_threads(n);
        }
        let pool = builder
            .build()
            .map_err(|e| LoomError::validation(format!("failed to build decode worker pool: {e}")))?;
        Ok(Self { pool })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Run `job` on a worker and await its result.
    ///
    /// A job whose lifecycle is already cancelled when a worker picks it up never runs. When the
    /// awaiting side has gone away, a successful value is handed to `reclaim` instead of being
    /// dropped, so pooled buffers go back to their pool.
    pub async fn run<T, J, R>(&self, lifecycle: &Lifecycle, job: J, reclaim: R) -> LoomResult<T>
    where
        T: Send + 'static,
        J: FnOnce() -> LoomResult<T> + Send + 'static,
        R: FnOnce(T) + Send + 'static,
    {
        lifecycle.check()?;
        let (tx, rx) = oneshot::channel();
        let job_lifecycle = lifecycle.clone();
        self.pool.spawn(move || {
            let out = if job_lifecycle.is_cancelled() {
                Err(LoomError::Cancelled)
            } else {
                catch_unwind(AssertUnwindSafe(job)).unwrap_or_else(|panic| {
                    Err(LoomError::decode_failed(format!(
                        "decode worker panicked: {}",
                        panic_message(panic.as_ref())
                    )))
                })
            };
            if let Err(Ok(value)) = tx.send(out) {
                tracing::debug!("decode result abandoned, reclaiming");
                reclaim(value);
            }
        });
        rx.await
            .map_err(|_| LoomError::decode_failed("decode worker dropped its result"))?
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/loader/worker.rs"]
mod tests;
