//! Cancelable periodic timer driving auto-mode re-evaluation

use log::debug;
use std::time::Duration;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

/// Repeating timer that can be stopped and re-armed.
///
/// While stopped, [`Poller::tick`] never resolves, so it can sit in a
/// `select!` next to other event sources.
#[derive(Debug)]
pub struct Poller {
    period: Duration,
    interval: Option<Interval>,
}

impl Poller {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            interval: None,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn is_running(&self) -> bool {
        self.interval.is_some()
    }

    /// Arm the timer. The first tick fires one full period from now.
    /// Already running timers keep their cadence.
    pub fn start(&mut self) {
        if self.interval.is_some() {
            return;
        }

        let mut interval = interval_at(Instant::now() + self.period, self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.interval = Some(interval);
        debug!("Poller armed at {:?}", self.period);
    }

    /// Cancel the timer. Returns whether it was running.
    pub fn stop(&mut self) -> bool {
        let was_running = self.interval.take().is_some();
        if was_running {
            debug!("Poller stopped");
        }
        was_running
    }

    /// Wait for the next tick
    pub async fn tick(&mut self) {
        match self.interval.as_mut() {
            Some(interval) => {
                interval.tick().await;
            }
            None => std::future::pending::<()>().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_elapsed(started: Instant, expected: Duration) {
        let elapsed = started.elapsed();
        assert!(
            elapsed >= expected && elapsed < expected + Duration::from_millis(5),
            "elapsed {:?}, expected {:?}",
            elapsed,
            expected
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_after_one_period() {
        let mut poller = Poller::new(Duration::from_secs(1));
        poller.start();

        let started = Instant::now();
        poller.tick().await;
        assert_elapsed(started, Duration::from_secs(1));

        poller.tick().await;
        assert_elapsed(started, Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopped_poller_never_ticks() {
        let mut poller = Poller::new(Duration::from_secs(1));
        poller.start();
        assert!(poller.stop());
        assert!(!poller.stop());
        assert!(!poller.is_running());

        let ticked = tokio::time::timeout(Duration::from_secs(10), poller.tick()).await;
        assert!(ticked.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_is_idempotent() {
        let mut poller = Poller::new(Duration::from_millis(500));
        poller.start();

        let started = Instant::now();
        tokio::time::sleep(Duration::from_millis(300)).await;
        poller.start();

        poller.tick().await;
        assert_elapsed(started, Duration::from_millis(500));
    }
}
