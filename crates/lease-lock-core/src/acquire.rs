//! Acquisition engine: conditional set with bounded retry.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{Span, debug, instrument};

use crate::context::LockContext;
use crate::error::{LockError, LockResult};
use crate::handle::LeaseLockHandle;
use crate::retry::RetryStrategy;
use crate::token::LockToken;
use crate::traits::LeaseStore;

/// Runs one store round-trip bounded by `per_attempt_timeout` and `ctx`.
///
/// A context that has already fired fails before the store is contacted.
async fn bounded<T>(
    ctx: &LockContext,
    key: &str,
    what: &str,
    per_attempt_timeout: Duration,
    op: impl Future<Output = LockResult<T>>,
) -> LockResult<T> {
    if let Some(done) = ctx.err() {
        return Err(LockError::Ambiguous {
            key: key.to_string(),
            reason: format!("{done} before {what}"),
        });
    }

    tokio::select! {
        biased;
        result = tokio::time::timeout(per_attempt_timeout, op) => {
            result.map_err(|_| LockError::Timeout(per_attempt_timeout))?
        }
        done = ctx.done() => Err(LockError::Ambiguous {
            key: key.to_string(),
            reason: format!("{done} during {what}"),
        }),
    }
}

/// Makes one conditional-set attempt, bounded by `per_attempt_timeout` and `ctx`.
///
/// Returns `Ok(true)` if the key was newly set to `token`, `Ok(false)` if it
/// was already held, [`LockError::Timeout`] if the store did not answer in
/// time, and [`LockError::Ambiguous`] if `ctx` fired first.
pub(crate) async fn attempt<S: LeaseStore>(
    ctx: &LockContext,
    store: &S,
    key: &str,
    token: &LockToken,
    lease_duration: Duration,
    per_attempt_timeout: Duration,
) -> LockResult<bool> {
    bounded(
        ctx,
        key,
        "acquisition attempt",
        per_attempt_timeout,
        store.set_if_absent(key, token.as_str(), lease_duration),
    )
    .await
}

/// Reads the key back and reports whether it holds `token`, bounded like an attempt.
async fn owns<S: LeaseStore>(
    ctx: &LockContext,
    store: &S,
    key: &str,
    token: &LockToken,
    per_attempt_timeout: Duration,
) -> LockResult<bool> {
    let current = bounded(ctx, key, "ownership check", per_attempt_timeout, store.get(key)).await?;
    Ok(current.as_deref() == Some(token.as_str()))
}

/// Acquires `key` for `token`, retrying while it is held or the store is slow.
///
/// Each attempt is a single atomic set-if-absent with expiry
/// `lease_duration`, bounded by `per_attempt_timeout`. Between attempts the
/// engine waits for the interval from `retry`, or until `ctx` fires.
///
/// # Returns
///
/// * `Ok(handle)` - the key now holds `token`
/// * `Err(LockError::RetriesExhausted)` - `retry` ran out; the source is
///   `LockError::LockHeld` or the last `LockError::Timeout`
/// * `Err(LockError::Ambiguous)` - `ctx` fired; whether a last attempt landed
///   is unknown
/// * `Err(LockError::Communication)` - the store failed; not retried
/// * `Err(LockError::InvalidOptions)` - `lease_duration` is under 1ms or
///   `per_attempt_timeout` is zero
///
/// After a timed-out attempt the engine checks, on the next "held" answer,
/// whether the held value is its own token, since the timed-out write may
/// have landed. That read is bounded the same way as an attempt, and a
/// timeout there counts as another timed-out attempt.
#[instrument(
    skip(ctx, store, token, retry),
    fields(
        lock.key = %key,
        backend = store.backend(),
        lease = ?lease_duration,
        attempts = tracing::field::Empty,
        acquired = tracing::field::Empty,
        elapsed_ms = tracing::field::Empty,
    )
)]
pub async fn acquire<S, R>(
    ctx: &LockContext,
    store: Arc<S>,
    key: &str,
    token: LockToken,
    lease_duration: Duration,
    per_attempt_timeout: Duration,
    mut retry: R,
) -> LockResult<LeaseLockHandle<S>>
where
    S: LeaseStore,
    R: RetryStrategy,
{
    if lease_duration < Duration::from_millis(1) {
        return Err(LockError::InvalidOptions(format!(
            "lease_duration must be at least 1ms, got {lease_duration:?}"
        )));
    }
    if per_attempt_timeout.is_zero() {
        return Err(LockError::InvalidOptions(
            "per_attempt_timeout must be non-zero".to_string(),
        ));
    }

    let start = Instant::now();
    let mut attempts: u32 = 0;
    let mut timed_out = false;

    let result = loop {
        attempts += 1;

        let last = match attempt(ctx, &*store, key, &token, lease_duration, per_attempt_timeout).await
        {
            Ok(true) => break Ok(()),
            Ok(false) if !timed_out => LockError::LockHeld {
                key: key.to_string(),
            },
            Ok(false) => match owns(ctx, &*store, key, &token, per_attempt_timeout).await {
                Ok(true) => {
                    debug!(attempts, "earlier timed-out attempt had set the key");
                    break Ok(());
                }
                Ok(false) => LockError::LockHeld {
                    key: key.to_string(),
                },
                Err(e @ LockError::Timeout(_)) => e,
                Err(e) => break Err(e),
            },
            Err(e @ LockError::Timeout(_)) => {
                timed_out = true;
                e
            }
            // Communication failures and cancellation are terminal.
            Err(e) => break Err(e),
        };

        let Some(interval) = retry.next() else {
            break Err(LockError::RetriesExhausted {
                key: key.to_string(),
                attempts,
                last: Box::new(last),
            });
        };
        debug!(attempts, ?interval, reason = %last, "lock not acquired, backing off");

        tokio::select! {
            biased;
            done = ctx.done() => {
                break Err(LockError::Ambiguous {
                    key: key.to_string(),
                    reason: format!("{done} while waiting to retry"),
                });
            }
            _ = tokio::time::sleep(interval) => {}
        }
    };

    let span = Span::current();
    span.record("attempts", attempts);
    span.record("elapsed_ms", start.elapsed().as_millis() as u64);
    span.record("acquired", result.is_ok());

    result.map(|()| LeaseLockHandle::new(store, key.to_string(), token, lease_duration))
}
