use std::time::Duration;

use tokio::time::{Instant, Interval, MissedTickBehavior};

/// Fixed-interval dispatch gate for a target request rate.
///
/// The `i`-th call to [`ArrivalPacer::wait`] returns no earlier than `start + i * period`. When the
/// dispatcher falls behind, later ticks are pushed back rather than fired in a burst.
#[derive(Debug)]
pub struct ArrivalPacer {
    period: Duration,
    interval: Interval,
}

/// Dispatch period for `rate` requests per second, or `None` when it is not a usable nonzero
/// [`Duration`].
pub fn rate_period(rate: f64) -> Option<Duration> {
    if !(rate.is_finite() && rate > 0.0) {
        return None;
    }
    Duration::try_from_secs_f64(1.0 / rate)
        .ok()
        .filter(|period| !period.is_zero())
}

impl ArrivalPacer {
    /// `None` when `rate` has no usable period (see [`rate_period`]).
    pub fn new(rate: f64, start: Instant) -> Option<Self> {
        let period = rate_period(rate)?;
        let mut interval = tokio::time::interval_at(start, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Some(Self { period, interval })
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub async fn wait(&mut self) -> Instant {
        self.interval.tick().await
    }
}
