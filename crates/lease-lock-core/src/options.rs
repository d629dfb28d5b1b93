//! Lock configuration.

use std::time::Duration;

use crate::error::{LockError, LockResult};
use crate::renewal::RenewalConfig;
use crate::retry::RetryPolicy;

/// Configuration shared by every lock a client acquires.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct LockOptions {
    /// TTL set on the key at acquisition and on every renewal.
    pub lease_duration: Duration,
    /// Bound on a single store round-trip during acquisition.
    pub per_attempt_timeout: Duration,
    /// Acquisition retry budget and pacing.
    pub retry: RetryPolicy,
    /// Period of the background renewal loop.
    pub renewal_interval: Duration,
    /// Total renewal attempts (ticks and prompt retries) before the loop gives up.
    pub renewal_max_attempts: u32,
    /// Bound on a single renewal round-trip.
    pub renewal_per_attempt_timeout: Duration,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            lease_duration: Duration::from_secs(30),
            per_attempt_timeout: Duration::from_secs(1),
            retry: RetryPolicy::default(),
            renewal_interval: Duration::from_secs(10),
            renewal_max_attempts: 360,
            renewal_per_attempt_timeout: Duration::from_secs(1),
        }
    }
}

impl LockOptions {
    /// Returns a builder starting from the defaults.
    pub fn builder() -> LockOptionsBuilder {
        LockOptionsBuilder::new()
    }

    /// Renewal loop settings derived from these options.
    pub fn renewal_config(&self) -> RenewalConfig {
        RenewalConfig {
            interval: self.renewal_interval,
            max_attempts: self.renewal_max_attempts,
            per_attempt_timeout: self.renewal_per_attempt_timeout,
        }
    }

    /// Checks that the options describe a usable lock.
    pub fn validate(&self) -> LockResult<()> {
        if self.lease_duration < Duration::from_millis(1) {
            return Err(LockError::InvalidOptions(
                "lease_duration must be at least 1ms".to_string(),
            ));
        }
        if self.per_attempt_timeout.is_zero() {
            return Err(LockError::InvalidOptions(
                "per_attempt_timeout must be non-zero".to_string(),
            ));
        }
        if self.renewal_interval.is_zero() || self.renewal_interval >= self.lease_duration {
            return Err(LockError::InvalidOptions(format!(
                "renewal_interval ({:?}) must be non-zero and shorter than lease_duration ({:?})",
                self.renewal_interval, self.lease_duration
            )));
        }
        if self.renewal_per_attempt_timeout.is_zero() {
            return Err(LockError::InvalidOptions(
                "renewal_per_attempt_timeout must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`LockOptions`].
pub struct LockOptionsBuilder {
    options: LockOptions,
}

impl LockOptionsBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            options: LockOptions::default(),
        }
    }

    /// Sets the lease (TTL) granted at acquisition and renewal.
    pub fn lease_duration(mut self, lease: Duration) -> Self {
        self.options.lease_duration = lease;
        self
    }

    /// Sets the bound on each acquisition round-trip.
    pub fn per_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.options.per_attempt_timeout = timeout;
        self
    }

    /// Retries up to `max_retries` times, waiting `interval` between attempts.
    pub fn retry(mut self, max_retries: u32, interval: Duration) -> Self {
        self.options.retry = RetryPolicy::Fixed {
            interval,
            max_retries,
        };
        self
    }

    /// Sets an arbitrary retry policy.
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.options.retry = policy;
        self
    }

    /// Sets the renewal loop period.
    pub fn renewal_interval(mut self, interval: Duration) -> Self {
        self.options.renewal_interval = interval;
        self
    }

    /// Sets the renewal loop attempt budget.
    pub fn renewal_max_attempts(mut self, attempts: u32) -> Self {
        self.options.renewal_max_attempts = attempts;
        self
    }

    /// Sets the bound on each renewal round-trip.
    pub fn renewal_per_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.options.renewal_per_attempt_timeout = timeout;
        self
    }

    /// Validates and returns the options.
    pub fn build(self) -> LockResult<LockOptions> {
        self.options.validate()?;
        Ok(self.options)
    }
}

impl Default for LockOptionsBuilder {
    fn default() -> Self {
        Self::new()
    }
}
