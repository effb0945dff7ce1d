//! Cooperative drain scheduling with bounded backoff.

use std::time::{Duration, Instant};

/// Exponential backoff between failed passes.
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Delay after the first failure.
    pub initial_delay: Duration,
    /// Cap on the computed delay.
    pub max_delay: Duration,
    /// Multiplier applied per consecutive failure.
    pub multiplier: f64,
}

impl BackoffConfig {
    /// Creates a backoff configuration.
    #[must_use]
    pub fn new(initial_delay: Duration, max_delay: Duration, multiplier: f64) -> Self {
        Self {
            initial_delay,
            max_delay,
            multiplier,
        }
    }

    /// Returns the extra delay after `failures` consecutive failures.
    #[must_use]
    pub fn delay_for(&self, failures: u32) -> Duration {
        if failures == 0 {
            return Duration::ZERO;
        }
        let base = self.initial_delay.as_secs_f64()
            * self.multiplier.powi(failures.saturating_sub(1) as i32);
        Duration::from_secs_f64(base.min(self.max_delay.as_secs_f64()))
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self::new(Duration::from_secs(30), Duration::from_secs(600), 2.0)
    }
}

/// Decides when scheduled drains fire.
///
/// The host execution model is single-threaded cooperative, so the
/// scheduler never sleeps or spawns: the host calls `tick` on its own
/// cadence and the scheduler answers "is a drain due now". Consecutive
/// failed passes push the next scheduled drain out by the backoff
/// delay; a restored connection fires the next tick immediately.
#[derive(Debug)]
pub struct Scheduler {
    interval: Option<Duration>,
    backoff: BackoffConfig,
    last_finished: Option<Instant>,
    kick: bool,
    consecutive_failures: u32,
}

impl Scheduler {
    /// Creates a scheduler. `interval: None` disables scheduled drains
    /// entirely; manual drains are unaffected.
    #[must_use]
    pub fn new(interval: Option<Duration>, backoff: BackoffConfig) -> Self {
        Self {
            interval,
            backoff,
            last_finished: None,
            kick: false,
            consecutive_failures: 0,
        }
    }

    /// Returns true if a scheduled drain is due at `now`.
    #[must_use]
    pub fn is_due(&self, now: Instant) -> bool {
        if self.interval.is_none() {
            return false;
        }
        if self.kick {
            return true;
        }
        match self.last_finished {
            None => true,
            Some(finished) => {
                let wait = self.interval.unwrap_or_default()
                    + self.backoff.delay_for(self.consecutive_failures);
                now.duration_since(finished) >= wait
            }
        }
    }

    /// Records the outcome of a drain, resetting or growing backoff.
    pub fn record_outcome(&mut self, now: Instant, success: bool) {
        self.last_finished = Some(now);
        self.kick = false;
        self.consecutive_failures = if success {
            0
        } else {
            self.consecutive_failures + 1
        };
    }

    /// Makes the next tick fire regardless of the interval.
    ///
    /// Called when connectivity is restored so queued work drains
    /// without waiting out the interval.
    pub fn connectivity_restored(&mut self) {
        self.kick = true;
    }

    /// Consecutive failed passes since the last success.
    #[must_use]
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }
}
