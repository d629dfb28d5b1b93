//! Redis lock client construction.

use std::time::Duration;

use fred::prelude::*;
use lease_lock_core::client::LeaseLockClient;
use lease_lock_core::error::{LockError, LockResult};
use lease_lock_core::options::LockOptions;
use lease_lock_core::retry::RetryPolicy;

use crate::store::RedisStore;

/// Lock client bound to a Redis store.
pub type RedisLockClient = LeaseLockClient<RedisStore>;

/// Builder for a [`RedisLockClient`].
pub struct RedisLockClientBuilder {
    url: Option<String>,
    client: Option<RedisClient>,
    options: LockOptions,
}

impl RedisLockClientBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            url: None,
            client: None,
            options: LockOptions::default(),
        }
    }

    /// Sets the Redis server URL to connect to.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Uses an existing Redis client instead of connecting from a URL.
    pub fn client(mut self, client: RedisClient) -> Self {
        self.client = Some(client);
        self
    }

    /// Replaces all lock options at once.
    pub fn options(mut self, options: LockOptions) -> Self {
        self.options = options;
        self
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

    /// Connects (if needed) and builds the client.
    pub async fn build(self) -> LockResult<RedisLockClient> {
        self.options.validate()?;

        let store = match (self.client, self.url) {
            (Some(client), _) => RedisStore::new(client),
            (None, Some(url)) => RedisStore::connect(&url).await?,
            (None, None) => {
                return Err(LockError::InvalidOptions(
                    "no Redis client or URL provided".to_string(),
                ));
            }
        };

        LeaseLockClient::new(store, self.options)
    }
}

impl Default for RedisLockClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Connects to `url` and builds a client with default options.
pub async fn connect(url: impl Into<String>) -> LockResult<RedisLockClient> {
    RedisLockClientBuilder::new().url(url).build().await
}
