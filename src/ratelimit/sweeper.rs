//! Background expiry sweeper.
//!
//! Optional companion to the opportunistic sweep in [`RateLimiter::check_limit`]:
//! long-running hosts can prune expired counters on a fixed interval instead
//! of waiting for the store to grow past its threshold.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

use super::clock::Clock;
use super::limiter::RateLimiter;

/// Handle to a running sweeper task. Dropping it aborts the task.
pub struct SweeperHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

/// Spawn a task that sweeps expired counters every `interval`.
///
/// Must be called from within a Tokio runtime.
pub fn spawn_sweeper<C>(limiter: Arc<RateLimiter<C>>, interval: Duration) -> SweeperHandle
where
    C: Clock + 'static,
{
    let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

    info!(interval = ?interval, "Starting rate limit sweeper");

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = limiter.sweep_expired();
                    trace!(removed = removed, "Sweeper tick");
                }
                _ = &mut shutdown_rx => {
                    debug!("Rate limit sweeper stopping");
                    break;
                }
            }
        }
    });

    SweeperHandle {
        shutdown: Some(shutdown_tx),
        task: Some(task),
    }
}

impl SweeperHandle {
    /// Stop the sweeper and wait for the task to finish.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "Rate limit sweeper task failed");
            }
        }
    }

    /// Whether the task has finished.
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |task| task.is_finished())
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::clock::MockClock;
    use crate::ratelimit::policy::{Policy, PolicyRegistry};

    fn test_limiter() -> (Arc<RateLimiter<MockClock>>, MockClock) {
        let clock = MockClock::default();
        let limiter = Arc::new(RateLimiter::with_clock(PolicyRegistry::new(), clock.clone()));
        (limiter, clock)
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_removes_expired_entries() {
        let (limiter, clock) = test_limiter();
        let policy = Policy::new(Duration::from_secs(60), 5).unwrap();

        limiter.check_limit("a", &policy);
        limiter.check_limit("b", &policy);
        clock.advance(Duration::from_secs(61));

        let handle = spawn_sweeper(limiter.clone(), Duration::from_secs(10));
        // Paused time auto-advances past the first sweep tick
        tokio::time::sleep(Duration::from_secs(15)).await;

        assert_eq!(limiter.counter_count(), 0);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_keeps_live_entries() {
        let (limiter, _clock) = test_limiter();
        let policy = Policy::new(Duration::from_secs(60), 5).unwrap();

        limiter.check_limit("a", &policy);

        let handle = spawn_sweeper(limiter.clone(), Duration::from_secs(10));
        tokio::time::sleep(Duration::from_secs(35)).await;

        assert_eq!(limiter.counter_count(), 1);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_sweeps_on_every_tick() {
        let (limiter, clock) = test_limiter();
        let policy = Policy::new(Duration::from_secs(60), 5).unwrap();

        let handle = spawn_sweeper(limiter.clone(), Duration::from_secs(10));
        tokio::time::sleep(Duration::from_secs(15)).await;

        // Entries that expire after the first tick are picked up by a later one
        limiter.check_limit("late", &policy);
        clock.advance(Duration::from_secs(60));
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(limiter.counter_count(), 0);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_shutdown_releases_limiter() {
        let (limiter, _clock) = test_limiter();

        let handle = spawn_sweeper(limiter.clone(), Duration::from_secs(10));
        assert!(!handle.is_finished());
        assert_eq!(Arc::strong_count(&limiter), 2);

        handle.shutdown().await;
        assert_eq!(Arc::strong_count(&limiter), 1);
    }
}
