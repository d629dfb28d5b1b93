//! Backoff policies for the acquisition retry loop.

use std::time::Duration;

use rand::Rng;

/// Produces successive wait intervals between acquisition attempts.
///
/// Each call to [`next`](RetryStrategy::next) advances an internal counter.
/// `Some(interval)` means the caller may wait `interval` and try again; `None`
/// means the retry budget is spent. Strategies are stateful and must not be
/// shared between unrelated acquisitions.
pub trait RetryStrategy: Send {
    /// Returns the wait before the next attempt, or `None` once exhausted.
    fn next(&mut self) -> Option<Duration>;
}

impl<R: RetryStrategy + ?Sized> RetryStrategy for Box<R> {
    fn next(&mut self) -> Option<Duration> {
        (**self).next()
    }
}

/// Waits the same interval before each of at most `max_retries` retries.
#[derive(Debug, Clone)]
pub struct FixedIntervalRetry {
    interval: Duration,
    max_retries: u32,
    count: u32,
}

impl FixedIntervalRetry {
    pub fn new(interval: Duration, max_retries: u32) -> Self {
        Self {
            interval,
            max_retries,
            count: 0,
        }
    }

    /// Number of times `next` has been called.
    pub fn count(&self) -> u32 {
        self.count
    }
}

impl RetryStrategy for FixedIntervalRetry {
    fn next(&mut self) -> Option<Duration> {
        self.count = self.count.saturating_add(1);
        (self.count <= self.max_retries).then_some(self.interval)
    }
}

/// Doubles the interval after every retry, capped at `max_interval`.
///
/// With jitter enabled each interval is drawn uniformly from `[base / 2, base]`
/// so that competing clients spread out.
#[derive(Debug, Clone)]
pub struct ExponentialBackoffRetry {
    initial_interval: Duration,
    max_interval: Duration,
    max_retries: u32,
    jitter: bool,
    count: u32,
}

impl ExponentialBackoffRetry {
    pub fn new(initial_interval: Duration, max_interval: Duration, max_retries: u32) -> Self {
        Self {
            initial_interval,
            max_interval,
            max_retries,
            jitter: false,
            count: 0,
        }
    }

    /// Enables or disables jitter.
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    fn base_interval(&self) -> Duration {
        let shift = self.count.saturating_sub(1);
        2u32.checked_pow(shift)
            .and_then(|factor| self.initial_interval.checked_mul(factor))
            .map_or(self.max_interval, |interval| interval.min(self.max_interval))
    }
}

impl RetryStrategy for ExponentialBackoffRetry {
    fn next(&mut self) -> Option<Duration> {
        self.count = self.count.saturating_add(1);
        if self.count > self.max_retries {
            return None;
        }

        let base = self.base_interval();
        if self.jitter {
            Some(rand::thread_rng().gen_range(base / 2..=base))
        } else {
            Some(base)
        }
    }
}

/// Retry configuration that builds a fresh [`RetryStrategy`] per acquisition.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
pub enum RetryPolicy {
    /// See [`FixedIntervalRetry`].
    Fixed { interval: Duration, max_retries: u32 },
    /// See [`ExponentialBackoffRetry`].
    Exponential {
        initial_interval: Duration,
        max_interval: Duration,
        max_retries: u32,
        jitter: bool,
    },
}

impl RetryPolicy {
    /// Builds a new strategy with its counter at zero.
    pub fn strategy(&self) -> Box<dyn RetryStrategy> {
        match *self {
            Self::Fixed {
                interval,
                max_retries,
            } => Box::new(FixedIntervalRetry::new(interval, max_retries)),
            Self::Exponential {
                initial_interval,
                max_interval,
                max_retries,
                jitter,
            } => Box::new(
                ExponentialBackoffRetry::new(initial_interval, max_interval, max_retries)
                    .with_jitter(jitter),
            ),
        }
    }

    /// Maximum number of retries after the initial attempt.
    pub fn max_retries(&self) -> u32 {
        match *self {
            Self::Fixed { max_retries, .. } | Self::Exponential { max_retries, .. } => max_retries,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::Fixed {
            interval: Duration::from_millis(100),
            max_retries: 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_interval_allows_exactly_max_retries() {
        let mut retry = FixedIntervalRetry::new(Duration::from_secs(1), 3);

        assert_eq!(retry.next(), Some(Duration::from_secs(1)));
        assert_eq!(retry.next(), Some(Duration::from_secs(1)));
        assert_eq!(retry.next(), Some(Duration::from_secs(1)));
        assert_eq!(retry.next(), None);
        assert_eq!(retry.next(), None);
        assert_eq!(retry.count(), 5);
    }

    #[test]
    fn test_zero_retries() {
        let mut retry = FixedIntervalRetry::new(Duration::from_millis(10), 0);
        assert_eq!(retry.next(), None);
    }

    #[test]
    fn test_exponential_doubles_and_caps() {
        let mut retry =
            ExponentialBackoffRetry::new(Duration::from_millis(100), Duration::from_millis(500), 5);

        let intervals: Vec<_> = std::iter::from_fn(|| retry.next()).collect();
        assert_eq!(
            intervals,
            vec![
                Duration::from_millis(100),
                Duration::from_millis(200),
                Duration::from_millis(400),
                Duration::from_millis(500),
                Duration::from_millis(500),
            ]
        );
    }

    #[test]
    fn test_exponential_jitter_stays_in_range() {
        let mut retry = ExponentialBackoffRetry::new(Duration::from_millis(80), Duration::from_secs(1), 4)
            .with_jitter(true);

        let mut base = Duration::from_millis(80);
        while let Some(interval) = retry.next() {
            assert!(interval >= base / 2 && interval <= base, "{interval:?} outside {base:?}");
            base *= 2;
        }
    }

    #[test]
    fn test_policy_builds_fresh_strategies() {
        let policy = RetryPolicy::Fixed {
            interval: Duration::from_millis(5),
            max_retries: 1,
        };

        let mut first = policy.strategy();
        assert!(first.next().is_some());
        assert!(first.next().is_none());

        let mut second = policy.strategy();
        assert!(second.next().is_some());
        assert_eq!(policy.max_retries(), 1);
    }
}
