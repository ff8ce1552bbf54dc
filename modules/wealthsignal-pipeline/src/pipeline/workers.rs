use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use futures::FutureExt;
use tracing::warn;

/// How one work item ended.
#[derive(Debug)]
pub enum TaskOutcome<T> {
    Done(T),
    Failed(String),
    /// Never started because the run was cancelled.
    Skipped,
}

impl<T> TaskOutcome<T> {
    pub fn done(self) -> Option<T> {
        match self {
            TaskOutcome::Done(v) => Some(v),
            _ => None,
        }
    }
}

/// Run-wide worker cap with settle-all semantics.
///
/// Every item runs to completion (or is skipped after cancellation); one
/// item failing or panicking never affects its siblings. Outcomes come back
/// in input order.
#[derive(Clone)]
pub struct WorkerPool {
    concurrency: usize,
    cancelled: Arc<AtomicBool>,
}

impl WorkerPool {
    pub fn new(concurrency: usize, cancelled: Arc<AtomicBool>) -> Self {
        Self {
            concurrency: concurrency.max(1),
            cancelled,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub async fn settle_all<I, T, F, Fut>(&self, label: &str, items: Vec<I>, f: F) -> Vec<TaskOutcome<T>>
    where
        F: Fn(I) -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let f = &f;
        stream::iter(items)
            .map(|item| async move {
                if self.is_cancelled() {
                    return TaskOutcome::Skipped;
                }
                match AssertUnwindSafe(f(item)).catch_unwind().await {
                    Ok(Ok(value)) => TaskOutcome::Done(value),
                    Ok(Err(e)) => {
                        warn!(task = label, error = %e, "Task failed");
                        TaskOutcome::Failed(e.to_string())
                    }
                    Err(_) => {
                        warn!(task = label, "Task panicked");
                        TaskOutcome::Failed("task panicked".to_string())
                    }
                }
            })
            .buffered(self.concurrency)
            .collect()
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn one_failure_does_not_cancel_siblings() {
        let pool = WorkerPool::new(2, Arc::new(AtomicBool::new(false)));
        let outcomes = pool
            .settle_all("test", vec![1, 2, 3], |n| async move {
                if n == 2 {
                    anyhow::bail!("boom");
                }
                Ok(n * 10)
            })
            .await;
        assert!(matches!(outcomes[0], TaskOutcome::Done(10)));
        assert!(matches!(outcomes[1], TaskOutcome::Failed(_)));
        assert!(matches!(outcomes[2], TaskOutcome::Done(30)));
    }

    #[tokio::test]
    async fn panics_are_contained() {
        let pool = WorkerPool::new(4, Arc::new(AtomicBool::new(false)));
        let outcomes = pool
            .settle_all("test", vec![true, false], |explode| async move {
                if explode {
                    panic!("kaboom");
                }
                Ok(())
            })
            .await;
        assert!(matches!(outcomes[0], TaskOutcome::Failed(_)));
        assert!(matches!(outcomes[1], TaskOutcome::Done(())));
    }

    #[tokio::test]
    async fn cancelled_pool_starts_nothing() {
        let started = AtomicUsize::new(0);
        let pool = WorkerPool::new(4, Arc::new(AtomicBool::new(true)));
        let outcomes = pool
            .settle_all("test", vec![1, 2], |_| async {
                started.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;
        assert!(outcomes.iter().all(|o| matches!(o, TaskOutcome::Skipped)));
        assert_eq!(started.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn cancelling_mid_run_skips_unstarted_items() {
        let cancelled = Arc::new(AtomicBool::new(false));
        let pool = WorkerPool::new(1, cancelled.clone());
        let outcomes = pool
            .settle_all("test", vec![1, 2, 3], |n| {
                let cancelled = cancelled.clone();
                async move {
                    cancelled.store(true, Ordering::SeqCst);
                    Ok(n)
                }
            })
            .await;
        assert!(pool.is_cancelled());
        assert!(matches!(outcomes[0], TaskOutcome::Done(1)));
        assert!(matches!(outcomes[1], TaskOutcome::Skipped));
        assert!(matches!(outcomes[2], TaskOutcome::Skipped));
    }

    #[tokio::test]
    async fn concurrency_is_capped() {
        let in_flight = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);
        let pool = WorkerPool::new(2, Arc::new(AtomicBool::new(false)));
        pool.settle_all("test", (0..8).collect::<Vec<_>>(), |_| async {
            let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        })
        .await;
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }
}
