use super::{DevInspectResults, Ledger};
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Default)]
struct State {
    objects: HashMap<String, Value>,
    balances: HashMap<(String, String), u128>,
    shared_versions: HashMap<String, u64>,
    inspections: HashMap<String, DevInspectResults>,
    object_failures: u32,
    inspect_failures: u32,
    latency: Option<Duration>,
}

/// Scriptable ledger held in memory, for simulations and tests.
///
/// Failures are injected as transport errors and consumed one per call.
#[derive(Default)]
pub struct InMemoryLedger {
    state: Mutex<State>,
    object_calls: AtomicUsize,
    inspect_calls: AtomicUsize,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert_object(&self, id: impl Into<String>, content: Value) {
        self.state().objects.insert(id.into(), content);
    }

    pub fn remove_object(&self, id: &str) {
        self.state().objects.remove(id);
    }

    pub fn set_shared_version(&self, id: &str, version: u64) {
        self.state().shared_versions.insert(id.to_string(), version);
    }

    pub fn set_balance(&self, owner: &str, coin_type: &str, amount: u128) {
        self.state()
            .balances
            .insert((owner.to_string(), coin_type.to_string()), amount);
    }

    /// Answer for `dev_inspect` calls carrying exactly `tx_bytes`.
    pub fn insert_inspection(&self, tx_bytes: impl Into<String>, results: DevInspectResults) {
        self.state().inspections.insert(tx_bytes.into(), results);
    }

    /// The next `n` object reads fail with a network error.
    pub fn fail_object_reads(&self, n: u32) {
        self.state().object_failures = n;
    }

    /// The next `n` dev-inspect calls fail with a network error.
    pub fn fail_inspections(&self, n: u32) {
        self.state().inspect_failures = n;
    }

    /// Delay applied to every object read.
    pub fn set_latency(&self, latency: Duration) {
        self.state().latency = Some(latency);
    }

    pub fn object_calls(&self) -> usize {
        self.object_calls.load(Ordering::SeqCst)
    }

    pub fn inspect_calls(&self) -> usize {
        self.inspect_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    async fn get_object(&self, id: &str) -> Result<Option<Value>> {
        self.object_calls.fetch_add(1, Ordering::SeqCst);
        let latency = self.state().latency;
        if let Some(delay) = latency {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.state();
        if state.object_failures > 0 {
            state.object_failures -= 1;
            return Err(AppError::Network(format!("simulated failure reading {id}")));
        }
        Ok(state.objects.get(id).cloned())
    }

    async fn shared_version(&self, id: &str) -> Result<Option<u64>> {
        Ok(self.state().shared_versions.get(id).copied())
    }

    async fn get_balance(&self, owner: &str, coin_type: &str) -> Result<u128> {
        Ok(self
            .state()
            .balances
            .get(&(owner.to_string(), coin_type.to_string()))
            .copied()
            .unwrap_or(0))
    }

    async fn dev_inspect(&self, tx_bytes: &str, _sender: &str) -> Result<DevInspectResults> {
        self.inspect_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state();
        if state.inspect_failures > 0 {
            state.inspect_failures -= 1;
            return Err(AppError::Network("simulated dev-inspect failure".into()));
        }
        state.inspections.get(tx_bytes).cloned().ok_or_else(|| {
            AppError::Network(format!("no dev-inspect result scripted for {tx_bytes}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn injected_failures_are_consumed_in_order() {
        let ledger = InMemoryLedger::new();
        ledger.insert_object("0x1", json!({"ok": true}));
        ledger.fail_object_reads(2);
        assert!(ledger.get_object("0x1").await.is_err());
        assert!(ledger.get_object("0x1").await.is_err());
        assert!(ledger.get_object("0x1").await.unwrap().is_some());
        assert_eq!(ledger.object_calls(), 3);
    }

    #[tokio::test]
    async fn missing_objects_and_balances_default() {
        let ledger = InMemoryLedger::new();
        assert!(ledger.get_object("0xdead").await.unwrap().is_none());
        assert_eq!(ledger.get_balance("0xme", "0x2::sui::SUI").await.unwrap(), 0);
        ledger.set_balance("0xme", "0x2::sui::SUI", 42);
        assert_eq!(ledger.get_balance("0xme", "0x2::sui::SUI").await.unwrap(), 42);
    }
}
