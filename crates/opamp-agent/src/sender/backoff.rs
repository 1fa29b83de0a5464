//! Retry delays for one round trip.
//!
//! Exponential growth with jitter and no elapsed-time limit: a round trip is
//! retried until it succeeds, fails fatally, or the client is stopped. The
//! returned delay never decreases between consecutive calls, and a server
//! `Retry-After` hint can only raise it.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;

/// Exponential backoff policy plus the state of the current retry sequence.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    /// First computed delay.
    pub initial_interval: Duration,
    /// Growth per attempt.
    pub multiplier: f64,
    /// Jitter spread (0.5 = +/-50%). 0 disables jitter.
    pub randomization_factor: f64,
    /// Cap on the un-jittered interval.
    pub max_interval: Duration,
    current: Duration,
    last: Duration,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(500),
            multiplier: 1.5,
            randomization_factor: 0.5,
            max_interval: Duration::from_secs(60),
            current: Duration::from_millis(500),
            last: Duration::ZERO,
        }
    }
}

impl ExponentialBackoff {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_initial_interval(mut self, interval: Duration) -> Self {
        self.initial_interval = interval;
        self.current = interval;
        self
    }

    #[must_use]
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier.max(1.0);
        self
    }

    #[must_use]
    pub fn with_randomization_factor(mut self, factor: f64) -> Self {
        self.randomization_factor = factor.clamp(0.0, 1.0);
        self
    }

    #[must_use]
    pub fn with_max_interval(mut self, max: Duration) -> Self {
        self.max_interval = max;
        self
    }

    /// Start a new retry sequence.
    pub fn reset(&mut self) {
        self.current = self.initial_interval;
        self.last = Duration::ZERO;
    }

    /// Delay before the next attempt.
    pub fn next_backoff(&mut self) -> Duration {
        let jittered = randomize(self.current, self.randomization_factor);
        let next = jittered.max(self.last);
        self.last = next;
        self.current = self.current.mul_f64(self.multiplier).min(self.max_interval);
        next
    }
}

fn randomize(interval: Duration, factor: f64) -> Duration {
    if factor <= 0.0 || interval.is_zero() {
        return interval;
    }
    let base = interval.as_secs_f64();
    let delta = base * factor;
    let secs = rand::thread_rng().gen_range((base - delta)..=(base + delta));
    Duration::from_secs_f64(secs.max(0.0))
}

/// Wait actually applied after a backpressure reply: `max(computed, hint)`.
pub fn apply_retry_hint(computed: Duration, hint: Option<Duration>) -> Duration {
    match hint {
        Some(hint) if hint > computed => hint,
        _ => computed,
    }
}

/// Parse a `Retry-After` value: delta-seconds or an HTTP-date.
///
/// A date in the past yields zero. Anything else unparseable yields `None`.
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    let at = DateTime::parse_from_rfc2822(value).ok()?;
    Some((at.with_timezone(&Utc) - now).to_std().unwrap_or(Duration::ZERO))
}
