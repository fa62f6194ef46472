//! Cancellable repeating tasks on the tokio scheduler
//!
//! Used for the BLE reconnect timer, the heartbeat, and the cloud periodic
//! pushes. Dropping the handle cancels the task.

use core::future::Future;
use core::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Shortest period a task will run at; `interval_at` rejects zero
pub const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Handle to a task that runs `tick` every `period`
#[derive(Debug)]
pub struct RepeatingTask {
    handle: JoinHandle<()>,
}

impl RepeatingTask {
    /// Spawn onto the current runtime
    ///
    /// With `fire_immediately` the first tick runs right away, otherwise after
    /// one full period. A tick that overruns delays the next one instead of
    /// bursting. Periods below [`MIN_PERIOD`] are raised to it.
    pub fn spawn<F, Fut>(period: Duration, fire_immediately: bool, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let period = period.max(MIN_PERIOD);
        let start = if fire_immediately {
            Instant::now()
        } else {
            Instant::now() + period
        };

        let handle = tokio::spawn(async move {
            let mut interval = interval_at(start, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                tick().await;
            }
        });

        Self { handle }
    }

    pub fn cancel(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for RepeatingTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting_task(period: Duration, fire_immediately: bool) -> (RepeatingTask, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let task = RepeatingTask::spawn(period, fire_immediately, move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        (task, count)
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_first_fire() {
        let (_task, count) = counting_task(Duration::from_secs(5), true);
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delayed_first_fire() {
        let (_task, count) = counting_task(Duration::from_secs(5), false);
        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_period_still_ticks() {
        let (task, count) = counting_task(Duration::ZERO, false);
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(!task.is_finished());
        assert!(count.load(Ordering::SeqCst) >= 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels() {
        let (task, count) = counting_task(Duration::from_secs(1), true);
        tokio::time::sleep(Duration::from_millis(1)).await;
        drop(task);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
