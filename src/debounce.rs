//! Single-slot trailing debounce.
//!
//! At most one task is pending. Scheduling again before the quiet period
//! elapses cancels the pending task and restarts the clock.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;

#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    pending: Option<JoinHandle<()>>,
}

impl Debouncer {
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Run `task` once `delay` has passed without another call to `schedule`.
    pub fn schedule<F>(&mut self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        let delay = self.delay;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        }));
    }

    /// Whether a scheduled task has not run yet.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Drop the pending task, if any, without waiting for it.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }

    /// Cancel the pending task and wait until it is gone.
    ///
    /// Returns `true` if the task was cancelled before it completed, `false`
    /// if nothing was pending or it had already completed. Blocking work the
    /// task handed off may still be running after a cancel.
    pub async fn cancel_and_wait(&mut self) -> bool {
        let Some(handle) = self.pending.take() else {
            return false;
        };
        handle.abort();
        match handle.await {
            Ok(()) => false,
            Err(e) => e.is_cancelled(),
        }
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn counter_task(counter: &Arc<AtomicUsize>) -> impl Future<Output = ()> + Send + 'static {
        let counter = Arc::clone(counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_runs_once_after_quiet_period() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut debouncer = Debouncer::new(Duration::from_millis(5000));

        for _ in 0..3 {
            debouncer.schedule(counter_task(&counter));
            tokio::time::sleep(Duration::from_millis(2000)).await;
        }
        // 2s since last schedule: still quiet period
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert!(debouncer.is_pending());

        tokio::time::sleep(Duration::from_millis(3100)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(!debouncer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_run() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut debouncer = Debouncer::new(Duration::from_millis(5000));

        debouncer.schedule(counter_task(&counter));
        debouncer.cancel();

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_and_wait_reports_pending() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut debouncer = Debouncer::new(Duration::from_millis(5000));

        assert!(!debouncer.cancel_and_wait().await);

        debouncer.schedule(counter_task(&counter));
        assert!(debouncer.cancel_and_wait().await);

        debouncer.schedule(counter_task(&counter));
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(!debouncer.cancel_and_wait().await);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
