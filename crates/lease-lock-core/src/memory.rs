//! In-process lease store.
//!
//! Keeps keys in a mutex-protected map and expires them lazily against the
//! tokio clock, so tests running with paused time see leases expire exactly
//! when the clock is advanced past them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use crate::error::{LockError, LockResult};
use crate::traits::{LeaseStore, LockScript};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|expires_at| now < expires_at)
    }
}

/// A [`LeaseStore`] held entirely in memory.
///
/// Clones share the same underlying map. Only suitable for locking between
/// tasks of one process, and for tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the live entry for `key`, dropping it first if it has expired.
    fn live<'a>(entries: &'a mut HashMap<String, Entry>, key: &str) -> Option<&'a mut Entry> {
        let now = Instant::now();
        if entries.get(key).is_some_and(|entry| !entry.is_live(now)) {
            entries.remove(key);
        }
        entries.get_mut(key)
    }

    /// Unconditionally writes `key`, replacing any holder.
    pub fn set(&self, key: &str, value: &str, ttl: Option<Duration>) {
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        self.entries().insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at,
            },
        );
    }

    /// Remaining time to live of `key`. `None` if absent or without expiry.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let mut entries = self.entries();
        Self::live(&mut entries, key)
            .and_then(|entry| entry.expires_at)
            .map(|expires_at| expires_at.saturating_duration_since(Instant::now()))
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries().values().filter(|entry| entry.is_live(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_arity(script: LockScript, keys: &[&str], args: &[&str]) -> LockResult<()> {
        let (key_count, arg_count) = script.arity();
        if keys.len() != key_count || args.len() != arg_count {
            return Err(LockError::communication(format!(
                "script '{}' expects {} keys and {} args, got {} and {}",
                script.name(),
                key_count,
                arg_count,
                keys.len(),
                args.len()
            )));
        }
        Ok(())
    }
}

impl LeaseStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> LockResult<bool> {
        let mut entries = self.entries();
        if Self::live(&mut entries, key).is_some() {
            return Ok(false);
        }

        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(true)
    }

    async fn delete(&self, key: &str) -> LockResult<u64> {
        let mut entries = self.entries();
        Ok(match Self::live(&mut entries, key) {
            Some(_) => {
                entries.remove(key);
                1
            }
            None => 0,
        })
    }

    async fn get(&self, key: &str) -> LockResult<Option<String>> {
        let mut entries = self.entries();
        Ok(Self::live(&mut entries, key).map(|entry| entry.value.clone()))
    }

    async fn run_script(&self, script: LockScript, keys: &[&str], args: &[&str]) -> LockResult<i64> {
        Self::check_arity(script, keys, args)?;
        let (key, token) = (keys[0], args[0]);

        let ttl = match script {
            LockScript::Renew => {
                let millis: u64 = args[1].parse().map_err(|_| {
                    LockError::communication(format!("invalid TTL argument '{}'", args[1]))
                })?;
                Some(Duration::from_millis(millis))
            }
            LockScript::Release => None,
        };

        let mut entries = self.entries();
        let Some(entry) = Self::live(&mut entries, key) else {
            return Ok(0);
        };
        if entry.value != token {
            return Ok(0);
        }

        match ttl {
            Some(ttl) => entry.expires_at = Some(Instant::now() + ttl),
            None => {
                entries.remove(key);
            }
        }
        Ok(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_set_if_absent_respects_expiry() {
        let store = MemoryStore::new();

        assert!(store.set_if_absent("k", "a", Duration::from_secs(1)).await.unwrap());
        assert!(!store.set_if_absent("k", "b", Duration::from_secs(1)).await.unwrap());

        tokio::time::advance(Duration::from_secs(1)).await;

        assert_eq!(store.get("k").await.unwrap(), None);
        assert!(store.set_if_absent("k", "b", Duration::from_secs(1)).await.unwrap());
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn test_release_script_checks_owner() {
        let store = MemoryStore::new();
        store.set("k", "owner", None);

        assert_eq!(store.run_script(LockScript::Release, &["k"], &["other"]).await.unwrap(), 0);
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("owner"));

        assert_eq!(store.run_script(LockScript::Release, &["k"], &["owner"]).await.unwrap(), 1);
        assert!(store.is_empty());

        assert_eq!(store.run_script(LockScript::Release, &["k"], &["owner"]).await.unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_renew_script_resets_ttl() {
        let store = MemoryStore::new();
        store.set("k", "owner", Some(Duration::from_millis(100)));

        assert_eq!(
            store.run_script(LockScript::Renew, &["k"], &["owner", "5000"]).await.unwrap(),
            1
        );
        assert_eq!(store.ttl("k"), Some(Duration::from_secs(5)));

        assert_eq!(
            store.run_script(LockScript::Renew, &["k"], &["other", "9000"]).await.unwrap(),
            0
        );
        assert_eq!(store.ttl("k"), Some(Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn test_script_argument_errors() {
        let store = MemoryStore::new();

        let err = store.run_script(LockScript::Renew, &["k"], &["owner"]).await.unwrap_err();
        assert!(matches!(err, LockError::Communication(_)));

        let err = store
            .run_script(LockScript::Renew, &["k"], &["owner", "soon"])
            .await
            .unwrap_err();
        assert!(matches!(err, LockError::Communication(_)));
    }

    #[tokio::test]
    async fn test_delete_counts() {
        let store = MemoryStore::new();
        store.set("k", "v", None);

        assert_eq!(store.delete("k").await.unwrap(), 1);
        assert_eq!(store.delete("k").await.unwrap(), 0);
    }
}
