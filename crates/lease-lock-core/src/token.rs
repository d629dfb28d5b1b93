//! Ownership tokens.

use std::fmt;
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};

use rand::Rng;

/// Value stored under the lock key proving which acquisition owns it.
///
/// Format: `{process_id}_{counter}_{random}`. The counter makes tokens unique
/// within a process; the random component makes collisions across processes
/// vanishingly unlikely.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LockToken(String);

impl LockToken {
    /// Generates a fresh token.
    pub fn generate() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let counter = COUNTER.fetch_add(1, Ordering::Relaxed);

        let random: u64 = rand::thread_rng().r#gen();

        Self(format!("{}_{}_{:016x}", process::id(), counter, random))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for LockToken {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for LockToken {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl AsRef<str> for LockToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LockToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_generated_tokens_are_unique() {
        let tokens: HashSet<_> = (0..1000).map(|_| LockToken::generate()).collect();
        assert_eq!(tokens.len(), 1000);
    }

    #[test]
    fn test_token_format() {
        let token = LockToken::generate();
        let parts: Vec<_> = token.as_str().split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], process::id().to_string());
        assert_eq!(parts[2].len(), 16);
    }
}
