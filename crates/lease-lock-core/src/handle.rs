//! Handle to an acquired lease lock.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{Span, instrument};

use crate::context::LockContext;
use crate::error::{LockError, LockResult};
use crate::renewal::{RenewalConfig, RenewalControl, RenewalLoop, RenewalTask, renew_once};
use crate::token::LockToken;
use crate::traits::{LeaseStore, LockScript};

/// What the release script found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// The key still held our token and was deleted.
    Released,
    /// The key was absent or held another token; nothing was deleted.
    NotOwned,
}

impl ReleaseOutcome {
    /// Number of keys the release script removed.
    pub fn removed_count(self) -> u64 {
        match self {
            Self::Released => 1,
            Self::NotOwned => 0,
        }
    }

    pub fn is_released(self) -> bool {
        self == Self::Released
    }
}

/// Handle for a held lease lock.
///
/// Only produced by a successful acquisition. The lease lasts
/// [`lease_duration`](Self::lease_duration) unless renewed; if it expires the
/// handle becomes stale without notice, which is why release reports
/// [`ReleaseOutcome::NotOwned`] rather than failing.
///
/// Dropping the handle stops a running renewal loop but does not delete the
/// key; the lease then expires on its own. Call [`release`](Self::release) to
/// free the lock immediately.
///
/// # Example
///
/// ```rust,ignore
/// let handle = client.acquire(&ctx, "res-1").await?;
/// let renewal = handle.start_renewal(client.options().renewal_config())?;
///
/// tokio::select! {
///     _ = handle.lost_token().clone().changed() => eprintln!("lock lost"),
///     _ = do_work() => {}
/// }
///
/// handle.release(&LockContext::background()).await?;
/// renewal.wait().await?;
/// ```
#[derive(Debug)]
pub struct LeaseLockHandle<S: LeaseStore> {
    key: String,
    token: LockToken,
    lease_duration: Duration,
    store: Arc<S>,
    control: RenewalControl,
    lost_sender: Arc<watch::Sender<bool>>,
    lost_receiver: watch::Receiver<bool>,
}

/// Delivers the renewal stop signal when the release future completes or is
/// dropped mid-flight.
struct StopOnDrop<'a>(&'a RenewalControl);

impl Drop for StopOnDrop<'_> {
    fn drop(&mut self) {
        self.0.signal_stop();
    }
}

impl<S: LeaseStore> LeaseLockHandle<S> {
    pub(crate) fn new(store: Arc<S>, key: String, token: LockToken, lease_duration: Duration) -> Self {
        let (lost_sender, lost_receiver) = watch::channel(false);
        Self {
            key,
            token,
            lease_duration,
            store,
            control: RenewalControl::new(),
            lost_sender: Arc::new(lost_sender),
            lost_receiver,
        }
    }

    /// The locked resource key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The token stored under the key by this acquisition.
    pub fn token(&self) -> &LockToken {
        &self.token
    }

    /// TTL applied at acquisition and by each renewal.
    pub fn lease_duration(&self) -> Duration {
        self.lease_duration
    }

    /// Returns a receiver that flips to `true` when the renewal loop stops
    /// because the lock was lost or could not be renewed.
    ///
    /// Never changes if no renewal loop was started.
    pub fn lost_token(&self) -> &watch::Receiver<bool> {
        &self.lost_receiver
    }

    /// Returns `true` once release has been invoked (or the handle is being dropped).
    pub fn is_released(&self) -> bool {
        self.control.is_released()
    }

    /// Releases the lock if this handle still owns it.
    ///
    /// Runs the release script atomically at the store: the key is deleted
    /// only if it still holds this handle's token. Whatever the result, the
    /// renewal loop (if any) is told to stop, exactly once across all calls.
    ///
    /// # Returns
    ///
    /// * `Ok(ReleaseOutcome::Released)` - the key was ours and is gone
    /// * `Ok(ReleaseOutcome::NotOwned)` - the lease had already expired or been taken over
    /// * `Err(LockError::Ambiguous)` - `ctx` fired before the store answered
    /// * `Err(LockError::Communication)` - the store could not be reached
    #[instrument(
        skip(self, ctx),
        fields(lock.key = %self.key, backend = self.store.backend(), removed = tracing::field::Empty)
    )]
    pub async fn release(&self, ctx: &LockContext) -> LockResult<ReleaseOutcome> {
        let _stop = StopOnDrop(&self.control);
        let keys = [self.key.as_str()];
        let args = [self.token.as_str()];

        let removed = tokio::select! {
            biased;
            result = self.store.run_script(LockScript::Release, &keys, &args) => result?,
            done = ctx.done() => {
                return Err(LockError::Ambiguous {
                    key: self.key.clone(),
                    reason: format!("{done} during release"),
                });
            }
        };

        Span::current().record("removed", removed);
        Ok(if removed == 1 {
            ReleaseOutcome::Released
        } else {
            ReleaseOutcome::NotOwned
        })
    }

    /// Resets the lease to its full duration once, if this handle still owns it.
    ///
    /// Fails with [`LockError::NotOwner`] if the key is gone or held by
    /// someone else, and with [`LockError::Timeout`] if the store did not
    /// answer within `timeout` (the TTL may or may not have been reset).
    #[instrument(skip(self), fields(lock.key = %self.key, backend = self.store.backend()))]
    pub async fn renew(&self, timeout: Duration) -> LockResult<()> {
        if self.is_released() {
            return Err(LockError::InvalidState(format!(
                "lock '{}' was already released",
                self.key
            )));
        }
        renew_once(&*self.store, &self.key, &self.token, self.lease_duration, timeout).await
    }

    /// Reads the key and reports whether it still holds this handle's token.
    pub async fn is_held(&self) -> LockResult<bool> {
        let current = self.store.get(&self.key).await?;
        Ok(current.as_deref() == Some(self.token.as_str()))
    }

    /// Spawns the background renewal loop for this handle.
    ///
    /// At most one loop runs per handle. The loop stops cleanly when the
    /// handle is released or dropped.
    pub fn start_renewal(&self, config: RenewalConfig) -> LockResult<RenewalTask> {
        if self.is_released() {
            return Err(LockError::InvalidState(format!(
                "lock '{}' was already released",
                self.key
            )));
        }
        if !self.control.claim_start() {
            return Err(LockError::InvalidState(format!(
                "renewal already started for lock '{}'",
                self.key
            )));
        }

        Ok(RenewalLoop {
            store: self.store.clone(),
            key: self.key.clone(),
            token: self.token.clone(),
            lease: self.lease_duration,
            config,
            stop: self.control.subscribe(),
            lost: self.lost_sender.clone(),
        }
        .spawn())
    }
}

impl<S: LeaseStore> Drop for LeaseLockHandle<S> {
    fn drop(&mut self) {
        // The key is left to expire; only the renewal loop is stopped here.
        self.control.signal_stop();
    }
}
