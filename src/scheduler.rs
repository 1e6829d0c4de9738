//! Bounded-concurrency job runner used for every per-site fan-out.
//!
//! Jobs run interleaved on the calling task with at most `concurrency` in
//! flight. Every job settles on its own: an error or a panic in one job is
//! captured in its [`Settled`] entry and never disturbs the others.

use std::future::Future;
use std::panic::AssertUnwindSafe;

use anyhow::anyhow;
use futures::{FutureExt, StreamExt, stream};
use tracing::{debug, warn};

/// Default ceiling on simultaneously running jobs.
pub const DEFAULT_CONCURRENCY: usize = 7;

/// The settled outcome of one job, paired with the input it ran on.
#[derive(Debug)]
pub struct Settled<T, R> {
    pub item: T,
    pub result: anyhow::Result<R>,
}

/// Runs `job` over `items` with at most `concurrency` jobs in flight and waits
/// for all of them. Results come back in completion order.
pub async fn run_bounded<T, R, F, Fut>(
    items: Vec<T>,
    concurrency: usize,
    job: F,
) -> Vec<Settled<T, R>>
where
    T: Clone,
    F: Fn(T) -> Fut,
    Fut: Future<Output = anyhow::Result<R>>,
{
    let total = items.len();
    let concurrency = concurrency.max(1);
    debug!("Scheduling {} jobs with concurrency {}", total, concurrency);

    let settled: Vec<Settled<T, R>> = stream::iter(items)
        .map(|item| {
            let fut = AssertUnwindSafe(job(item.clone())).catch_unwind();
            async move {
                let result = match fut.await {
                    Ok(result) => result,
                    Err(panic) => {
                        let message = panic
                            .downcast_ref::<&str>()
                            .map(|s| (*s).to_string())
                            .or_else(|| panic.downcast_ref::<String>().cloned())
                            .unwrap_or_else(|| "job panicked".to_string());
                        warn!("Job panicked: {}", message);
                        Err(anyhow!("job panicked: {message}"))
                    }
                };
                Settled { item, result }
            }
        })
        .buffer_unordered(concurrency)
        .collect()
        .await;

    let failed = settled.iter().filter(|s| s.result.is_err()).count();
    debug!("All {} jobs settled, {} failed", total, failed);
    settled
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn never_exceeds_the_concurrency_ceiling() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let items: Vec<u64> = (0..25).collect();
        let settled = run_bounded(items, 3, |n| {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(n % 4)).await;
                running.fetch_sub(1, Ordering::SeqCst);
                Ok(n)
            }
        })
        .await;

        assert_eq!(settled.len(), 25);
        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert!(peak.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn failures_do_not_stop_other_jobs() {
        let items: Vec<u32> = (1..=10).collect();
        let settled = run_bounded(items, 4, |n| async move {
            if n % 3 == 0 {
                anyhow::bail!("site {n} unreachable");
            }
            Ok(n * 10)
        })
        .await;

        let ok = settled.iter().filter(|s| s.result.is_ok()).count();
        let failed = settled.iter().filter(|s| s.result.is_err()).count();
        assert_eq!(ok + failed, 10);
        assert_eq!(failed, 3);
        for s in &settled {
            if let Ok(v) = &s.result {
                assert_eq!(*v, s.item * 10);
            }
        }
    }

    #[tokio::test]
    async fn panics_are_captured_as_failures() {
        let settled = run_bounded(vec![1, 2, 3], 2, |n: i32| async move {
            if n == 2 {
                panic!("boom");
            }
            Ok(n)
        })
        .await;

        assert_eq!(settled.len(), 3);
        let failure = settled.iter().find(|s| s.item == 2).unwrap();
        let message = failure.result.as_ref().unwrap_err().to_string();
        assert!(message.contains("boom"));
    }

    #[tokio::test]
    async fn zero_concurrency_still_runs_everything() {
        let settled = run_bounded(vec!["a", "b"], 0, |s| async move { Ok(s.len()) }).await;
        assert_eq!(settled.len(), 2);
    }
}
