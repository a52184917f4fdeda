//! Join policies for groups of concurrent branches.
//!
//! Two policies:
//!
//! - [`all_or_nothing`]: every branch must succeed. The first error wins and
//!   the remaining in-flight branches are dropped, which cancels them.
//! - [`independent`]: every branch runs to completion; outcomes are returned
//!   in input order regardless of completion order.
//!
//! Both cap the number of branches polled at once.

use futures::stream::{self, StreamExt, TryStreamExt};
use std::future::Future;

/// Run `branches` with at most `limit` in flight; succeed only if all do.
///
/// Successful outputs are returned in input order.
pub async fn all_or_nothing<I, F, T, E>(branches: I, limit: usize) -> Result<Vec<T>, E>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = Result<T, E>>,
{
    let mut indexed: Vec<(usize, T)> = stream::iter(
        branches
            .into_iter()
            .enumerate()
            .map(|(i, branch)| async move { branch.await.map(|out| (i, out)) }),
    )
    .buffer_unordered(limit.max(1))
    .try_collect()
    .await?;

    indexed.sort_unstable_by_key(|(i, _)| *i);
    Ok(indexed.into_iter().map(|(_, out)| out).collect())
}

/// Run `branches` with at most `limit` in flight; collect every outcome in
/// input order. One branch's failure never affects another.
pub async fn independent<I, F>(branches: I, limit: usize) -> Vec<F::Output>
where
    I: IntoIterator<Item = F>,
    F: Future,
{
    stream::iter(branches)
        .buffered(limit.max(1))
        .collect()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::time::{Instant, sleep};

    async fn after(ms: u64, out: Result<u32, &'static str>, done: Arc<AtomicUsize>) -> Result<u32, &'static str> {
        sleep(Duration::from_millis(ms)).await;
        done.fetch_add(1, Ordering::SeqCst);
        out
    }

    #[tokio::test(start_paused = true)]
    async fn all_or_nothing_keeps_input_order() {
        let done = Arc::new(AtomicUsize::new(0));
        let out = all_or_nothing(
            vec![
                after(30, Ok(1), done.clone()),
                after(10, Ok(2), done.clone()),
                after(20, Ok(3), done.clone()),
            ],
            3,
        )
        .await;
        assert_eq!(out, Ok(vec![1, 2, 3]));
    }

    #[tokio::test(start_paused = true)]
    async fn first_failure_cancels_peers() {
        let done = Arc::new(AtomicUsize::new(0));
        let start = Instant::now();
        let out = all_or_nothing(
            vec![
                after(1_000, Ok(1), done.clone()),
                after(5, Err("boom"), done.clone()),
                after(1_000, Ok(3), done.clone()),
            ],
            3,
        )
        .await;

        assert_eq!(out, Err("boom"));
        // Only the failing branch ran to completion.
        assert_eq!(done.load(Ordering::SeqCst), 1);
        assert!(start.elapsed() < Duration::from_millis(1_000));
    }

    #[tokio::test(start_paused = true)]
    async fn independent_collects_every_outcome_in_order() {
        let done = Arc::new(AtomicUsize::new(0));
        let out = independent(
            vec![
                after(30, Ok(1), done.clone()),
                after(5, Err("task 2"), done.clone()),
                after(10, Ok(3), done.clone()),
            ],
            2,
        )
        .await;
        assert_eq!(out, vec![Ok(1), Err("task 2"), Ok(3)]);
        assert_eq!(done.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn limit_caps_parallelism() {
        let done = Arc::new(AtomicUsize::new(0));
        let start = Instant::now();
        let branches = (0..4).map(|i| after(100, Ok(i), done.clone()));
        let out = independent(branches, 2).await;
        assert_eq!(out.len(), 4);
        // Two waves of two.
        assert!(start.elapsed() >= Duration::from_millis(200));
    }
}
