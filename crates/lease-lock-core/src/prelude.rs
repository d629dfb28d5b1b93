//! Convenience prelude for lease lock types.

pub use crate::acquire::acquire;
pub use crate::client::LeaseLockClient;
pub use crate::context::{ContextDone, LockCanceller, LockContext};
pub use crate::error::{LockError, LockResult};
pub use crate::handle::{LeaseLockHandle, ReleaseOutcome};
pub use crate::memory::MemoryStore;
pub use crate::options::{LockOptions, LockOptionsBuilder};
pub use crate::renewal::{RenewalConfig, RenewalTask};
pub use crate::retry::{ExponentialBackoffRetry, FixedIntervalRetry, RetryPolicy, RetryStrategy};
pub use crate::token::LockToken;
pub use crate::traits::{LeaseStore, LockScript};
