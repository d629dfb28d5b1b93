//! Store wrapper for exercising failure paths.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use lease_lock_core::error::{LockError, LockResult};
use lease_lock_core::memory::MemoryStore;
use lease_lock_core::traits::{LeaseStore, LockScript};

/// How a single store call misbehaves.
#[derive(Debug, Clone, Copy)]
pub enum Fault {
    /// Stall before reaching the store; the call has no effect if abandoned.
    Stall(Duration),
    /// Apply the call, then stall before answering.
    SlowAck(Duration),
    /// Fail with a communication error without touching the store.
    Fail,
}

#[derive(Debug, Default)]
struct FaultPlan {
    queued: VecDeque<Fault>,
    always: Option<Fault>,
}

impl FaultPlan {
    fn take(&mut self) -> Option<Fault> {
        self.queued.pop_front().or(self.always)
    }
}

/// Wraps a [`MemoryStore`], counting calls and injecting faults.
#[derive(Debug, Default)]
pub struct InstrumentedStore {
    inner: MemoryStore,
    set_calls: AtomicU32,
    get_calls: AtomicU32,
    delete_calls: AtomicU32,
    release_calls: AtomicU32,
    renew_calls: AtomicU32,
    set_faults: Mutex<FaultPlan>,
    script_faults: Mutex<FaultPlan>,
    get_faults: Mutex<FaultPlan>,
}

impl InstrumentedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Direct access to the underlying store, bypassing counters and faults.
    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    pub fn set_calls(&self) -> u32 {
        self.set_calls.load(Ordering::SeqCst)
    }

    pub fn get_calls(&self) -> u32 {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> u32 {
        self.delete_calls.load(Ordering::SeqCst)
    }

    pub fn release_calls(&self) -> u32 {
        self.release_calls.load(Ordering::SeqCst)
    }

    pub fn renew_calls(&self) -> u32 {
        self.renew_calls.load(Ordering::SeqCst)
    }

    /// Queues a fault for the next conditional set.
    pub fn fault_next_set(&self, fault: Fault) {
        self.set_faults.lock().unwrap().queued.push_back(fault);
    }

    /// Applies `fault` to every conditional set with no queued fault.
    pub fn fault_all_sets(&self, fault: Fault) {
        self.set_faults.lock().unwrap().always = Some(fault);
    }

    /// Queues a fault for the next script run.
    pub fn fault_next_script(&self, fault: Fault) {
        self.script_faults.lock().unwrap().queued.push_back(fault);
    }

    /// Applies `fault` to every script run with no queued fault.
    pub fn fault_all_scripts(&self, fault: Fault) {
        self.script_faults.lock().unwrap().always = Some(fault);
    }

    /// Applies `fault` to every read with no queued fault.
    pub fn fault_all_gets(&self, fault: Fault) {
        self.get_faults.lock().unwrap().always = Some(fault);
    }

    /// Stops injecting faults.
    pub fn heal(&self) {
        *self.set_faults.lock().unwrap() = FaultPlan::default();
        *self.script_faults.lock().unwrap() = FaultPlan::default();
        *self.get_faults.lock().unwrap() = FaultPlan::default();
    }

    fn next_set_fault(&self) -> Option<Fault> {
        self.set_faults.lock().unwrap().take()
    }

    fn next_script_fault(&self) -> Option<Fault> {
        self.script_faults.lock().unwrap().take()
    }

    fn next_get_fault(&self) -> Option<Fault> {
        self.get_faults.lock().unwrap().take()
    }
}

async fn with_fault<T, F>(fault: Option<Fault>, op: F) -> LockResult<T>
where
    F: Future<Output = LockResult<T>>,
{
    match fault {
        None => op.await,
        Some(Fault::Fail) => Err(LockError::communication("injected connection reset")),
        Some(Fault::Stall(delay)) => {
            tokio::time::sleep(delay).await;
            op.await
        }
        Some(Fault::SlowAck(delay)) => {
            let result = op.await;
            tokio::time::sleep(delay).await;
            result
        }
    }
}

impl LeaseStore for InstrumentedStore {
    fn backend(&self) -> &'static str {
        "instrumented-memory"
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> LockResult<bool> {
        self.set_calls.fetch_add(1, Ordering::SeqCst);
        let fault = self.next_set_fault();
        with_fault(fault, self.inner.set_if_absent(key, value, ttl)).await
    }

    async fn delete(&self, key: &str) -> LockResult<u64> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.delete(key).await
    }

    async fn get(&self, key: &str) -> LockResult<Option<String>> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        let fault = self.next_get_fault();
        with_fault(fault, self.inner.get(key)).await
    }

    async fn run_script(&self, script: LockScript, keys: &[&str], args: &[&str]) -> LockResult<i64> {
        match script {
            LockScript::Release => self.release_calls.fetch_add(1, Ordering::SeqCst),
            LockScript::Renew => self.renew_calls.fetch_add(1, Ordering::SeqCst),
        };
        let fault = self.next_script_fault();
        with_fault(fault, self.inner.run_script(script, keys, args)).await
    }
}
