//! Core of lease-based distributed locks.
//!
//! A lock is a key in a shared store holding a per-acquisition token with an
//! expiry (the lease). This crate contains everything that does not depend on
//! a particular store: the [`LeaseStore`] capability trait, the acquisition
//! engine with pluggable [`RetryStrategy`], the ownership-checked release
//! protocol, and the background renewal loop. Backends only implement
//! [`LeaseStore`].

pub mod acquire;
pub mod client;
pub mod context;
pub mod error;
pub mod handle;
pub mod memory;
pub mod options;
pub mod prelude;
pub mod renewal;
pub mod retry;
pub mod token;
pub mod traits;

pub use error::{LockError, LockResult};
pub use prelude::*;
