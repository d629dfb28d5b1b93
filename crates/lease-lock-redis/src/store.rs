//! Redis implementation of the lease store.

use std::time::Duration;

use fred::prelude::*;
use fred::types::CustomCommand;
use lease_lock_core::error::{LockError, LockResult};
use lease_lock_core::traits::{LeaseStore, LockScript};
use tracing::{instrument, trace};

/// A [`LeaseStore`] backed by a single Redis endpoint.
///
/// Conditional set is `SET key token NX PX ttl`, one atomic command. The lock
/// scripts run through `EVAL`, so ownership check and mutation happen in one
/// server-side step.
#[derive(Clone)]
pub struct RedisStore {
    client: RedisClient,
}

impl RedisStore {
    /// Wraps an already connected client.
    pub fn new(client: RedisClient) -> Self {
        Self { client }
    }

    /// Connects to `url` and waits for the connection to be established.
    pub async fn connect(url: &str) -> LockResult<Self> {
        let config = RedisConfig::from_url(url).map_err(|e| {
            LockError::Communication(Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("invalid Redis URL: {}", e),
            )))
        })?;

        let client = RedisClient::new(config, None, None, None);
        client.connect();
        client.wait_for_connect().await.map_err(|e| {
            LockError::Communication(Box::new(std::io::Error::other(format!(
                "failed to connect to Redis: {}",
                e
            ))))
        })?;

        Ok(Self::new(client))
    }

    /// The underlying client.
    pub fn client(&self) -> &RedisClient {
        &self.client
    }
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("client", &self.client.id())
            .finish()
    }
}

fn communication(op: &'static str) -> impl FnOnce(RedisError) -> LockError {
    move |e| {
        LockError::Communication(Box::new(std::io::Error::other(format!(
            "Redis {} failed: {}",
            op, e
        ))))
    }
}

impl LeaseStore for RedisStore {
    fn backend(&self) -> &'static str {
        "redis"
    }

    #[instrument(level = "debug", skip_all, fields(lock.key = %key, ttl = ?ttl, backend = "redis"))]
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> LockResult<bool> {
        let ttl_millis = ttl.as_millis() as i64;

        // SET NX returns OK if the key was set, nil if it already exists
        let result: Option<String> = self
            .client
            .set(
                key,
                value,
                Some(Expiration::PX(ttl_millis)),
                Some(SetOptions::NX),
                false,
            )
            .await
            .map_err(communication("SET NX PX"))?;

        trace!(acquired = result.is_some(), "SET NX PX answered");
        Ok(result.is_some())
    }

    #[instrument(level = "debug", skip_all, fields(lock.key = %key, backend = "redis"))]
    async fn delete(&self, key: &str) -> LockResult<u64> {
        let removed: i64 = self.client.del(key).await.map_err(communication("DEL"))?;
        Ok(removed.max(0) as u64)
    }

    #[instrument(level = "debug", skip_all, fields(lock.key = %key, backend = "redis"))]
    async fn get(&self, key: &str) -> LockResult<Option<String>> {
        self.client.get(key).await.map_err(communication("GET"))
    }

    #[instrument(
        level = "debug",
        skip_all,
        fields(script = script.name(), lock.key = ?keys.first(), backend = "redis")
    )]
    async fn run_script(&self, script: LockScript, keys: &[&str], args: &[&str]) -> LockResult<i64> {
        let mut values: Vec<RedisValue> = Vec::with_capacity(2 + keys.len() + args.len());
        values.push(script.source().into());
        values.push((keys.len() as i64).into());
        values.extend(keys.iter().map(|&key| RedisValue::from(key)));
        values.extend(args.iter().map(|&arg| RedisValue::from(arg)));

        let cmd = CustomCommand::new_static("EVAL", None, false);

        // A missing key makes both scripts return 0, so nil never comes back.
        self.client
            .custom(cmd, values)
            .await
            .map_err(communication(match script {
                LockScript::Release => "EVAL (release)",
                LockScript::Renew => "EVAL (renew)",
            }))
    }
}
