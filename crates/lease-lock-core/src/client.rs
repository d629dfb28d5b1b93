//! Lock client bound to one store.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::acquire::{acquire, attempt};
use crate::context::LockContext;
use crate::error::LockResult;
use crate::handle::LeaseLockHandle;
use crate::options::LockOptions;
use crate::renewal::RenewalTask;
use crate::retry::RetryStrategy;
use crate::token::LockToken;
use crate::traits::LeaseStore;

/// Entry point for acquiring lease locks on a store.
///
/// The store is constructed by the caller and shared through an `Arc`; the
/// client never owns connection setup or teardown. Cloning the client is cheap.
///
/// # Example
///
/// ```rust,ignore
/// let client = LeaseLockClient::new(MemoryStore::new(), LockOptions::default())?;
///
/// let ctx = LockContext::with_timeout(Duration::from_secs(5));
/// let handle = client.acquire(&ctx, "res-1").await?;
/// // Critical section
/// handle.release(&ctx).await?;
/// ```
#[derive(Debug)]
pub struct LeaseLockClient<S: LeaseStore> {
    store: Arc<S>,
    options: LockOptions,
}

impl<S: LeaseStore> Clone for LeaseLockClient<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            options: self.options.clone(),
        }
    }
}

impl<S: LeaseStore> LeaseLockClient<S> {
    /// Creates a client owning `store`.
    pub fn new(store: S, options: LockOptions) -> LockResult<Self> {
        Self::from_shared(Arc::new(store), options)
    }

    /// Creates a client sharing an existing store.
    pub fn from_shared(store: Arc<S>, options: LockOptions) -> LockResult<Self> {
        options.validate()?;
        Ok(Self { store, options })
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn options(&self) -> &LockOptions {
        &self.options
    }

    /// Acquires `key` with a fresh token, retrying per the configured policy.
    ///
    /// See [`acquire`](crate::acquire::acquire) for the outcomes.
    pub async fn acquire(&self, ctx: &LockContext, key: &str) -> LockResult<LeaseLockHandle<S>> {
        self.acquire_with_retry(ctx, key, self.options.retry.strategy())
            .await
    }

    /// Acquires `key` with a fresh token and a caller-supplied retry strategy.
    pub async fn acquire_with_retry<R: RetryStrategy>(
        &self,
        ctx: &LockContext,
        key: &str,
        retry: R,
    ) -> LockResult<LeaseLockHandle<S>> {
        acquire(
            ctx,
            self.store.clone(),
            key,
            LockToken::generate(),
            self.options.lease_duration,
            self.options.per_attempt_timeout,
            retry,
        )
        .await
    }

    /// Makes a single acquisition attempt.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(handle))` - Lock acquired
    /// * `Ok(None)` - Lock is held by another owner
    /// * `Err(LockError::Timeout)` - The store did not answer in time
    /// * `Err(...)` - The store failed
    #[instrument(skip(self), fields(lock.key = %key, backend = self.store.backend()))]
    pub async fn try_acquire(&self, key: &str) -> LockResult<Option<LeaseLockHandle<S>>> {
        let token = LockToken::generate();
        let acquired = attempt(
            &LockContext::background(),
            &*self.store,
            key,
            &token,
            self.options.lease_duration,
            self.options.per_attempt_timeout,
        )
        .await?;

        Ok(acquired.then(|| {
            LeaseLockHandle::new(
                self.store.clone(),
                key.to_string(),
                token,
                self.options.lease_duration,
            )
        }))
    }

    /// Acquires `key` and immediately starts its renewal loop.
    pub async fn acquire_and_renew(
        &self,
        ctx: &LockContext,
        key: &str,
    ) -> LockResult<(LeaseLockHandle<S>, RenewalTask)> {
        let handle = self.acquire(ctx, key).await?;
        let renewal = handle.start_renewal(self.options.renewal_config())?;
        Ok((handle, renewal))
    }

    /// Token currently stored under `key`, if any.
    pub async fn current_holder(&self, key: &str) -> LockResult<Option<LockToken>> {
        Ok(self.store.get(key).await?.map(LockToken::from))
    }

    /// Deletes `key` regardless of who holds it.
    ///
    /// Administrative escape hatch for stuck locks; it breaks mutual exclusion
    /// for the current holder. Returns the number of keys removed.
    #[instrument(skip(self), fields(lock.key = %key, backend = self.store.backend()))]
    pub async fn force_release(&self, key: &str) -> LockResult<u64> {
        let removed = self.store.delete(key).await?;
        info!(removed, "lock forcibly released");
        Ok(removed)
    }
}
