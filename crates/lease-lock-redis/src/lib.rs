//! Redis backend for lease locks.
//!
//! Provides [`RedisStore`], a [`LeaseStore`](lease_lock_core::traits::LeaseStore)
//! over a single Redis endpoint, and [`RedisLockClientBuilder`] for wiring it
//! into a [`LeaseLockClient`](lease_lock_core::client::LeaseLockClient).

pub mod provider;
pub mod store;

pub use provider::{RedisLockClient, RedisLockClientBuilder, connect};
pub use store::RedisStore;
