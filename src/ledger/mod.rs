//! Read-only ledger boundary.
//!
//! The core only depends on the shape of a few queries: object content and
//! ownership, coin balances and dev-inspect return values.

use crate::errors::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod client;
pub mod memory;

pub use client::SuiRpcClient;
pub use memory::InMemoryLedger;

#[async_trait]
pub trait Ledger: Send + Sync {
    /// Parsed `content` of an object, `None` if the object does not exist.
    async fn get_object(&self, id: &str) -> Result<Option<Value>>;

    /// Version at which a shared object became shared, `None` if the object
    /// is missing or not shared.
    async fn shared_version(&self, id: &str) -> Result<Option<u64>>;

    /// Total balance of `coin_type` owned by `owner`, in base units.
    async fn get_balance(&self, owner: &str, coin_type: &str) -> Result<u128>;

    /// Executes a transaction kind without committing it.
    async fn dev_inspect(&self, tx_bytes: &str, sender: &str) -> Result<DevInspectResults>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStatus {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InspectEffects {
    pub status: ExecutionStatus,
}

/// One return value: BCS bytes plus the Move type.
pub type ReturnValue = (Vec<u8>, String);

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    #[serde(default)]
    pub return_values: Vec<ReturnValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DevInspectResults {
    pub effects: InspectEffects,
    #[serde(default)]
    pub results: Option<Vec<ExecutionResult>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DevInspectResults {
    pub fn success(return_values: Vec<ReturnValue>) -> Self {
        Self {
            effects: InspectEffects {
                status: ExecutionStatus {
                    status: "success".into(),
                    error: None,
                },
            },
            results: Some(vec![ExecutionResult { return_values }]),
            error: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.effects.status.status == "success" && self.error.is_none()
    }

    /// First return value of the first command.
    pub fn first_return_value(&self) -> Option<&ReturnValue> {
        self.results.as_ref()?.first()?.return_values.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dev_inspect_payload() {
        let raw = r#"{
            "effects": {"status": {"status": "success"}},
            "results": [{"returnValues": [[[1, 2, 3], "0x2::object::ID"]]}]
        }"#;
        let parsed: DevInspectResults = serde_json::from_str(raw).unwrap();
        assert!(parsed.is_success());
        let (bytes, ty) = parsed.first_return_value().unwrap();
        assert_eq!(bytes, &vec![1, 2, 3]);
        assert_eq!(ty, "0x2::object::ID");
    }

    #[test]
    fn failed_status_is_not_success() {
        let raw = r#"{"effects": {"status": {"status": "failure", "error": "MoveAbort"}}}"#;
        let parsed: DevInspectResults = serde_json::from_str(raw).unwrap();
        assert!(!parsed.is_success());
        assert!(parsed.first_return_value().is_none());
    }
}
