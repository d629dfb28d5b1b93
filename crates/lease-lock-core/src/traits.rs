//! Store capability seam consumed by the lock engine.

use std::future::Future;
use std::time::Duration;

use crate::error::LockResult;

// ============================================================================
// Atomic Scripts
// ============================================================================

/// The atomic check-then-act procedures a store must be able to run.
///
/// Both compare the value at `keys[0]` with the token in `args[0]` before
/// touching the key, and both return `1` on success or `0` when the value did
/// not match or the key was absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockScript {
    /// `keys = [lock_key]`, `args = [token]`. Deletes the key if owned.
    Release,
    /// `keys = [lock_key]`, `args = [token, ttl_millis]`. Resets the TTL if owned.
    Renew,
}

impl LockScript {
    const RELEASE_LUA: &'static str = r#"
        if redis.call('get', KEYS[1]) == ARGV[1] then
            return redis.call('del', KEYS[1])
        end
        return 0
    "#;

    const RENEW_LUA: &'static str = r#"
        if redis.call('get', KEYS[1]) == ARGV[1] then
            return redis.call('pexpire', KEYS[1], ARGV[2])
        end
        return 0
    "#;

    /// Short name used in logs.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Release => "release",
            Self::Renew => "renew",
        }
    }

    /// Lua source for stores that evaluate scripts server-side.
    pub const fn source(self) -> &'static str {
        match self {
            Self::Release => Self::RELEASE_LUA,
            Self::Renew => Self::RENEW_LUA,
        }
    }

    /// Number of `(keys, args)` the script expects.
    pub const fn arity(self) -> (usize, usize) {
        match self {
            Self::Release => (1, 1),
            Self::Renew => (1, 2),
        }
    }
}

// ============================================================================
// Lease Store Trait
// ============================================================================

/// Atomic key-value operations the lock engine needs from its backend.
///
/// Every operation must be atomic at the store. Correctness of the lock relies
/// entirely on these guarantees; the client side does no locking of its own.
///
/// Implementations report transport and server failures as
/// [`LockError::Communication`](crate::LockError::Communication). Timeouts are
/// applied by the caller, so implementations should not add their own unless
/// they surface them as [`LockError::Timeout`](crate::LockError::Timeout).
pub trait LeaseStore: Send + Sync + 'static {
    /// Backend name recorded on tracing spans.
    fn backend(&self) -> &'static str;

    /// Sets `key` to `value` with expiry `ttl` only if `key` is absent.
    ///
    /// Returns `true` if the key was newly set. The value and the expiry must
    /// be applied in one atomic step.
    fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> impl Future<Output = LockResult<bool>> + Send;

    /// Removes `key`, returning the number of keys removed (0 or 1).
    fn delete(&self, key: &str) -> impl Future<Output = LockResult<u64>> + Send;

    /// Reads the current value of `key`. Absence is `Ok(None)`, not an error.
    fn get(&self, key: &str) -> impl Future<Output = LockResult<Option<String>>> + Send;

    /// Runs one of the atomic lock scripts and returns its integer result.
    fn run_script(
        &self,
        script: LockScript,
        keys: &[&str],
        args: &[&str],
    ) -> impl Future<Output = LockResult<i64>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripts_check_ownership_before_mutating() {
        for (script, mutation) in [(LockScript::Release, "'del'"), (LockScript::Renew, "'pexpire'")] {
            let source = script.source();
            let guard = source.find("== ARGV[1]").unwrap();
            let mutation = source.find(mutation).unwrap();
            assert!(guard < mutation, "{} mutates before comparing", script.name());
        }
    }

    #[test]
    fn test_arity() {
        assert_eq!(LockScript::Release.arity(), (1, 1));
        assert_eq!(LockScript::Renew.arity(), (1, 2));
    }
}
