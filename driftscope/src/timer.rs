//! # Fixed period ticks

use std::time::{Duration, Instant};

/// Paces a loop to a fixed period.
///
/// The first tick is immediate. When an iteration overruns the period, the schedule restarts from
/// the late tick instead of firing a burst of catch-up ticks.
pub struct Ticker {
    start: Instant,
    target: Duration,
    period: Duration,
}

impl Ticker {
    pub fn new(period: Duration) -> Self {
        Self {
            start: Instant::now(),
            target: Default::default(),
            period,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Sleep until the next tick is due.
    pub fn wait(&mut self) {
        let elapsed = self.start.elapsed();

        match self.target.checked_sub(elapsed) {
            Some(duration) => std::thread::sleep(duration),
            None => self.target = elapsed,
        }

        self.target += self.period;
    }
}
