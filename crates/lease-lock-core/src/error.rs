//! Error types for lease lock operations.

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during lock operations.
#[derive(Error, Debug)]
pub enum LockError {
    /// Transport or server failure while talking to the store.
    ///
    /// Never retried by the acquisition loop; fatal for the renewal loop.
    #[error("store communication error: {0}")]
    Communication(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A single store round-trip did not complete within its bound.
    #[error("store round-trip timed out after {0:?}")]
    Timeout(Duration),

    /// The conditional set found the key already present.
    #[error("lock '{key}' is held by another owner")]
    LockHeld { key: String },

    /// The acquisition retry budget was spent without success.
    #[error("retries exhausted after {attempts} attempts on lock '{key}'")]
    RetriesExhausted {
        key: String,
        attempts: u32,
        /// The last observed condition: `LockHeld` or the last `Timeout`.
        #[source]
        last: Box<LockError>,
    },

    /// Cancellation or a timeout raced the store call; ownership is unknown.
    #[error("ambiguous outcome for lock '{key}': {reason}")]
    Ambiguous { key: String, reason: String },

    /// The stored value did not match this handle's token, or the key was gone.
    #[error("lock '{key}' is not owned by this handle")]
    NotOwner { key: String },

    /// The renewal loop ran out of attempts.
    #[error("too many renewal attempts on lock '{key}' (max {max_attempts})")]
    RenewalExhausted { key: String, max_attempts: u32 },

    /// Rejected configuration.
    #[error("invalid lock options: {0}")]
    InvalidOptions(String),

    /// The operation is not valid for the handle's current state.
    #[error("invalid handle state: {0}")]
    InvalidState(String),

    /// Backend-specific error outside the store protocol (e.g. task failure).
    #[error("backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl LockError {
    /// Wraps any backend error as a communication failure.
    pub fn communication(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Communication(err.into())
    }

    /// Returns `true` when the caller cannot know whether the lock is held.
    pub fn is_ambiguous(&self) -> bool {
        matches!(self, Self::Ambiguous { .. })
    }

    /// Returns `true` for conditions the acquisition loop retries.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::LockHeld { .. } | Self::Timeout(_))
    }

    /// Returns `true` when the lock is known to be held by someone else now.
    pub fn is_lock_lost(&self) -> bool {
        matches!(self, Self::NotOwner { .. })
    }
}

/// Result type for lock operations.
pub type LockResult<T> = Result<T, LockError>;
