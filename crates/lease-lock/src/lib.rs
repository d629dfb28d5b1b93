//! Lease-based distributed locks for Rust.
//!
//! A lock is a key in a shared store holding a fresh per-acquisition token
//! with an expiry. Acquisition retries a conditional set under a backoff
//! policy; release and renewal are atomic scripts that only touch the key while
//! it still holds the caller's token.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use lease_lock::*;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = RedisLockClientBuilder::new()
//!         .url("redis://localhost:6379")
//!         .lease_duration(Duration::from_secs(10))
//!         .retry(3, Duration::from_secs(1))
//!         .renewal_interval(Duration::from_secs(3))
//!         .build()
//!         .await?;
//!
//!     let ctx = LockContext::with_timeout(Duration::from_secs(5));
//!     let (handle, renewal) = client.acquire_and_renew(&ctx, "res-1").await?;
//!
//!     // Critical section - the lease is kept alive in the background
//!     println!("Doing critical work...");
//!
//!     handle.release(&LockContext::background()).await?;
//!     renewal.wait().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Outcomes
//!
//! - `LockError::RetriesExhausted`: the lock is definitely not yours
//! - `LockError::Ambiguous`: the caller's context fired mid-operation; treat
//!   ownership as unknown
//! - `LockError::Communication`: the store could not be reached
//!
//! # Crate Organization
//!
//! This is a meta-crate that re-exports types from:
//! - `lease-lock-core`: store trait, engine, handle, renewal, in-memory store
//! - `lease-lock-redis`: Redis backend (feature `redis`, on by default)

// Re-export core types and traits
pub use lease_lock_core::*;

// Re-export redis backend
#[cfg(feature = "redis")]
#[allow(ambiguous_glob_reexports)]
pub use lease_lock_redis::*;
