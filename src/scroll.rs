//! Single-slot trailing debounce for scroll bursts.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// At most one settle callback is outstanding. Scrolls arriving while one
/// is pending are absorbed into it.
#[derive(Debug, Clone)]
pub struct ScrollDebouncer {
    pending: Arc<AtomicBool>,
    delay: Duration,
}

impl ScrollDebouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            pending: Arc::new(AtomicBool::new(false)),
            delay,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Run `fire` once `delay` has passed, unless a run is already pending.
    ///
    /// Returns `false` when the scroll was absorbed by a pending run. The
    /// slot is released before `fire` starts, so scrolls during the fetch
    /// schedule a fresh run.
    pub fn schedule<F, Fut>(&self, fire: F) -> bool
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if self.pending.swap(true, Ordering::AcqRel) {
            return false;
        }
        let pending = Arc::clone(&self.pending);
        let delay = self.delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            pending.store(false, Ordering::Release);
            fire().await;
        });
        true
    }
}
