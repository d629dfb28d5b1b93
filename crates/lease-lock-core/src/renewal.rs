//! Background lease renewal.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, instrument, warn};

use crate::error::{LockError, LockResult};
use crate::token::LockToken;
use crate::traits::{LeaseStore, LockScript};

/// Pacing and budget of a renewal loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenewalConfig {
    /// Time between scheduled renewals. Must be shorter than the lease.
    pub interval: Duration,
    /// Total attempts, scheduled or prompt, before the loop gives up.
    pub max_attempts: u32,
    /// Bound on one renewal round-trip.
    pub per_attempt_timeout: Duration,
}

/// Held-to-released transition shared by a handle and its renewal loop.
///
/// The stop signal lives in a `watch` channel so a loop that subscribes after
/// the handle was released still sees it, and sending with no loop listening
/// is harmless. The flag makes the transition happen exactly once.
#[derive(Debug)]
pub(crate) struct RenewalControl {
    released: AtomicBool,
    started: AtomicBool,
    stop: watch::Sender<bool>,
}

impl RenewalControl {
    pub(crate) fn new() -> Self {
        let (stop, _) = watch::channel(false);
        Self {
            released: AtomicBool::new(false),
            started: AtomicBool::new(false),
            stop,
        }
    }

    /// Delivers the stop signal. Returns `true` only for the call that did so.
    pub(crate) fn signal_stop(&self) -> bool {
        if self
            .released
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        self.stop.send_replace(true);
        true
    }

    pub(crate) fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    /// Claims the single renewal slot. Returns `false` if already claimed.
    pub(crate) fn claim_start(&self) -> bool {
        self.started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<bool> {
        self.stop.subscribe()
    }
}

/// Runs the renew script once, bounded by `timeout`.
///
/// `Ok(())` means the TTL was reset to `lease`. A stored value that does not
/// match `token`, or a missing key, is [`LockError::NotOwner`].
pub(crate) async fn renew_once<S: LeaseStore>(
    store: &S,
    key: &str,
    token: &LockToken,
    lease: Duration,
    timeout: Duration,
) -> LockResult<()> {
    let ttl_millis = lease.as_millis().to_string();
    let args = [token.as_str(), ttl_millis.as_str()];

    match tokio::time::timeout(timeout, store.run_script(LockScript::Renew, &[key], &args)).await {
        Err(_) => Err(LockError::Timeout(timeout)),
        Ok(Err(e)) => Err(e),
        Ok(Ok(1)) => Ok(()),
        Ok(Ok(_)) => Err(LockError::NotOwner {
            key: key.to_string(),
        }),
    }
}

pub(crate) struct RenewalLoop<S: LeaseStore> {
    pub(crate) store: Arc<S>,
    pub(crate) key: String,
    pub(crate) token: LockToken,
    pub(crate) lease: Duration,
    pub(crate) config: RenewalConfig,
    pub(crate) stop: watch::Receiver<bool>,
    pub(crate) lost: Arc<watch::Sender<bool>>,
}

impl<S: LeaseStore> RenewalLoop<S> {
    pub(crate) fn spawn(self) -> RenewalTask {
        let key = self.key.clone();
        let join = tokio::spawn(async move {
            let lost = self.lost.clone();
            let result = self.run().await;
            if result.is_err() {
                lost.send_replace(true);
            }
            result
        });
        RenewalTask { key, join }
    }

    #[instrument(
        name = "renewal_loop",
        skip(self),
        fields(
            lock.key = %self.key,
            backend = self.store.backend(),
            interval = ?self.config.interval,
            max_attempts = self.config.max_attempts,
        )
    )]
    async fn run(mut self) -> LockResult<()> {
        let interval = self.config.interval;
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // Ticks and timed-out attempts can both ask for a prompt retry; one
        // pending request is enough.
        let (retry_now_tx, mut retry_now_rx) = mpsc::channel::<()>(1);
        let mut attempts: u32 = 0;

        loop {
            tokio::select! {
                biased;
                _ = self.stop.wait_for(|stopped| *stopped) => {
                    debug!(attempts, "renewal stopped by release");
                    return Ok(());
                }
                _ = ticker.tick() => {}
                Some(()) = retry_now_rx.recv() => {
                    debug!(attempts, "retrying renewal after timeout");
                }
            }

            attempts += 1;
            if attempts > self.config.max_attempts {
                warn!(attempts, "renewal attempt budget exhausted");
                return Err(LockError::RenewalExhausted {
                    key: self.key,
                    max_attempts: self.config.max_attempts,
                });
            }

            let result = renew_once(
                &*self.store,
                &self.key,
                &self.token,
                self.lease,
                self.config.per_attempt_timeout,
            )
            .await;

            // A release that raced the attempt may have deleted the key; its
            // answer says nothing about a lost lock.
            if *self.stop.borrow() {
                debug!(attempts, "renewal stopped by release");
                return Ok(());
            }

            match result {
                Ok(()) => debug!(attempts, "lease renewed"),
                Err(LockError::Timeout(timeout)) => {
                    warn!(attempts, ?timeout, "renewal timed out, outcome unknown");
                    let _ = retry_now_tx.try_send(());
                }
                Err(e) => {
                    warn!(attempts, error = %e, "renewal failed, stopping");
                    return Err(e);
                }
            }
        }
    }
}

/// A running renewal loop.
///
/// Resolves to `Ok(())` when stopped by [`release`](crate::LeaseLockHandle::release)
/// or by dropping the handle, and to the terminal error otherwise:
/// [`LockError::NotOwner`] when the lock was lost,
/// [`LockError::RenewalExhausted`] when the attempt budget ran out, or the
/// store error that ended it.
#[derive(Debug)]
pub struct RenewalTask {
    key: String,
    join: JoinHandle<LockResult<()>>,
}

impl RenewalTask {
    /// Key of the lock being renewed.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns `true` once the loop has exited.
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Waits for the loop to exit and returns how it ended.
    pub async fn wait(self) -> LockResult<()> {
        self.join
            .await
            .map_err(|e| LockError::Backend(Box::new(e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_is_signalled_once() {
        let control = RenewalControl::new();
        let rx = control.subscribe();

        assert!(control.signal_stop());
        assert!(!control.signal_stop());
        assert!(control.is_released());
        assert!(*rx.borrow());
    }

    #[test]
    fn test_stop_without_listeners_does_not_fault() {
        let control = RenewalControl::new();
        drop(control.subscribe());
        assert!(control.signal_stop());

        // A late subscriber still observes the stop.
        assert!(*control.subscribe().borrow());
    }

    #[test]
    fn test_start_claimed_once() {
        let control = RenewalControl::new();
        assert!(control.claim_start());
        assert!(!control.claim_start());
    }
}
