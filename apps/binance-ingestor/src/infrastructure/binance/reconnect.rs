//! Reconnect Backoff
//!
//! The n-th consecutive failure waits `initial_delay * 2^n`, capped at
//! `max_delay`. With the defaults that is 1s, 2s, 4s ... 32s, then 60s for
//! every later attempt. A successful connect resets the failure count.
//!
//! An optional jitter factor spreads each delay by up to `±factor` so that
//! many clients dropped at once do not reconnect in lockstep.

use std::time::Duration;

use rand::Rng;

/// Backoff parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectConfig {
    /// Delay after the first failure.
    pub initial_delay: Duration,
    /// Ceiling for any single delay.
    pub max_delay: Duration,
    /// Fraction of each delay to randomize, 0 disables.
    pub jitter_factor: f64,
    /// Consecutive failures tolerated before giving up (0 = never give up).
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            jitter_factor: 0.0,
            max_attempts: 0,
        }
    }
}

impl ReconnectConfig {
    /// Build from the ingestor's reconnect settings.
    #[must_use]
    pub const fn from_settings(settings: &crate::ReconnectSettings) -> Self {
        Self {
            initial_delay: settings.delay_initial,
            max_delay: settings.delay_max,
            jitter_factor: settings.jitter_factor,
            max_attempts: settings.max_attempts,
        }
    }

    /// Un-jittered delay after `failures` previous consecutive failures.
    #[must_use]
    pub fn delay_for(&self, failures: u32) -> Duration {
        let factor = 1u32.checked_shl(failures).unwrap_or(u32::MAX);
        self.initial_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |d| d.min(self.max_delay))
    }
}

/// Stateful backoff for one connection.
///
/// ```rust
/// use std::time::Duration;
/// use binance_ingestor::{ReconnectConfig, ReconnectPolicy};
///
/// let mut backoff = ReconnectPolicy::new(ReconnectConfig::default());
/// assert_eq!(backoff.next_delay(), Some(Duration::from_secs(1)));
/// assert_eq!(backoff.next_delay(), Some(Duration::from_secs(2)));
///
/// backoff.reset();
/// assert_eq!(backoff.next_delay(), Some(Duration::from_secs(1)));
/// ```
#[derive(Debug)]
pub struct ReconnectPolicy {
    config: ReconnectConfig,
    failures: u32,
}

impl ReconnectPolicy {
    /// Start with no recorded failures.
    #[must_use]
    pub const fn new(config: ReconnectConfig) -> Self {
        Self {
            config,
            failures: 0,
        }
    }

    /// Record a failure and return how long to wait before the next attempt.
    ///
    /// `None` once `max_attempts` consecutive failures have been recorded.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.is_exhausted() {
            return None;
        }
        let delay = jitter(self.config.delay_for(self.failures), self.config.jitter_factor);
        self.failures = self.failures.saturating_add(1);
        Some(delay)
    }

    /// Forget recorded failures.
    pub const fn reset(&mut self) {
        self.failures = 0;
    }

    /// Consecutive failures since the last reset.
    #[must_use]
    pub const fn failures(&self) -> u32 {
        self.failures
    }

    /// Whether the failure ceiling has been reached.
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.config.max_attempts != 0 && self.failures >= self.config.max_attempts
    }

    /// Backoff parameters.
    #[must_use]
    pub const fn config(&self) -> &ReconnectConfig {
        &self.config
    }
}

fn jitter(delay: Duration, factor: f64) -> Duration {
    if factor <= 0.0 || delay.is_zero() {
        return delay;
    }
    let spread = rand::rng().random_range(-factor..=factor);
    delay.mul_f64((1.0 + spread).max(0.0)).max(Duration::from_millis(1))
}
