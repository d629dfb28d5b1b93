//! Caller cancellation context for lock operations.

use std::fmt;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

/// Bounds how long a caller is willing to wait on a lock operation.
///
/// A context fires either when its deadline passes or when the paired
/// [`LockCanceller`] is triggered. The background context never fires.
///
/// # Example
///
/// ```rust,ignore
/// let ctx = LockContext::with_timeout(Duration::from_secs(5));
/// let handle = client.acquire(&ctx, "res-1").await?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct LockContext {
    deadline: Option<Instant>,
    cancelled: Option<watch::Receiver<bool>>,
}

/// Why a [`LockContext`] fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextDone {
    Cancelled,
    DeadlineExceeded,
}

impl fmt::Display for ContextDone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled => f.write_str("context cancelled"),
            Self::DeadlineExceeded => f.write_str("context deadline exceeded"),
        }
    }
}

/// Triggers cancellation of the contexts created alongside it.
#[derive(Debug)]
pub struct LockCanceller {
    sender: watch::Sender<bool>,
}

impl LockCanceller {
    /// Cancels every context sharing this canceller. Repeated calls are no-ops.
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }
}

impl LockContext {
    /// A context that never fires.
    pub fn background() -> Self {
        Self::default()
    }

    /// A context that fires `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    /// A context that fires at `deadline`.
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            cancelled: None,
        }
    }

    /// A context that fires only when the returned canceller is triggered.
    pub fn cancellable() -> (Self, LockCanceller) {
        Self::background().with_cancel()
    }

    /// Adds manual cancellation to this context, keeping any deadline.
    pub fn with_cancel(self) -> (Self, LockCanceller) {
        let (sender, receiver) = watch::channel(false);
        let ctx = Self {
            deadline: self.deadline,
            cancelled: Some(receiver),
        };
        (ctx, LockCanceller { sender })
    }

    /// The deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left until the deadline. `None` means unbounded.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Returns why the context has fired, or `None` if it is still live.
    pub fn err(&self) -> Option<ContextDone> {
        if self.cancelled.as_ref().is_some_and(|rx| *rx.borrow()) {
            return Some(ContextDone::Cancelled);
        }
        if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Some(ContextDone::DeadlineExceeded);
        }
        None
    }

    /// Returns `true` once the context has fired.
    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// Resolves when the context fires.
    pub async fn done(&self) -> ContextDone {
        let cancelled = async {
            if let Some(rx) = &self.cancelled {
                let mut rx = rx.clone();
                if rx.wait_for(|cancelled| *cancelled).await.is_ok() {
                    return;
                }
            }
            // Canceller dropped without firing: only the deadline remains.
            std::future::pending::<()>().await
        };
        let expired = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = cancelled => ContextDone::Cancelled,
            _ = expired => ContextDone::DeadlineExceeded,
        }
    }
}
