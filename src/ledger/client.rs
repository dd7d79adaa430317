use super::{DevInspectResults, Ledger};
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use ethers::providers::{Http, Provider, ProviderError};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;
use url::Url;

/// JSON-RPC handle on a Sui fullnode.
#[derive(Clone, Debug)]
pub struct SuiRpcClient {
    provider: Provider<Http>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ObjectData {
    #[serde(rename = "objectId")]
    object_id: String,
    #[serde(default)]
    content: Option<Value>,
    #[serde(default)]
    owner: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ObjectResponse {
    #[serde(default)]
    data: Option<ObjectData>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BalanceResponse {
    coin_type: String,
    total_balance: String,
}

impl SuiRpcClient {
    pub fn new(rpc_url: &Url) -> Result<Self> {
        let provider = Provider::<Http>::try_from(rpc_url.as_str())?;
        Ok(Self { provider })
    }

    async fn call<P, R>(&self, method: &str, params: P) -> Result<R>
    where
        P: std::fmt::Debug + Serialize + Send + Sync,
        R: std::fmt::Debug + Serialize + serde::de::DeserializeOwned + Send,
    {
        self.provider
            .request(method, params)
            .await
            .map_err(|e| network_error(method, e))
    }
}

#[async_trait]
impl Ledger for SuiRpcClient {
    async fn get_object(&self, id: &str) -> Result<Option<Value>> {
        let resp: ObjectResponse = self
            .call("sui_getObject", (id, json!({ "showContent": true })))
            .await?;
        match resp.data {
            Some(data) => {
                debug!(object_id = %data.object_id, "[LEDGER] object fetched");
                Ok(data.content)
            }
            None => {
                debug!(id, error = ?resp.error, "[LEDGER] object not found");
                Ok(None)
            }
        }
    }

    async fn shared_version(&self, id: &str) -> Result<Option<u64>> {
        let resp: ObjectResponse = self
            .call("sui_getObject", (id, json!({ "showOwner": true })))
            .await?;
        Ok(resp
            .data
            .and_then(|data| data.owner)
            .as_ref()
            .and_then(initial_shared_version))
    }

    async fn get_balance(&self, owner: &str, coin_type: &str) -> Result<u128> {
        let resp: BalanceResponse = self.call("suix_getBalance", (owner, coin_type)).await?;
        resp.total_balance.parse().map_err(|_| {
            AppError::Network(format!(
                "suix_getBalance returned non-integer balance {:?} for {}",
                resp.total_balance, resp.coin_type
            ))
        })
    }

    async fn dev_inspect(&self, tx_bytes: &str, sender: &str) -> Result<DevInspectResults> {
        self.call("sui_devInspectTransactionBlock", (sender, tx_bytes))
            .await
    }
}

/// `{"Shared": {"initial_shared_version": 8}}`; the version may arrive as a
/// number or a string.
fn initial_shared_version(owner: &Value) -> Option<u64> {
    let version = owner.get("Shared")?.get("initial_shared_version")?;
    version
        .as_u64()
        .or_else(|| version.as_str().and_then(|s| s.parse().ok()))
}

fn network_error(method: &str, err: ProviderError) -> AppError {
    AppError::Network(format!("{method}: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_response_without_data_means_missing() {
        let raw = r#"{"error": {"code": "notExists", "object_id": "0x1"}}"#;
        let parsed: ObjectResponse = serde_json::from_str(raw).unwrap();
        assert!(parsed.data.and_then(|d| d.content).is_none());
    }

    #[test]
    fn balance_response_shape() {
        let raw = r#"{"coinType":"0x2::sui::SUI","coinObjectCount":3,"totalBalance":"1500000000","lockedBalance":{}}"#;
        let parsed: BalanceResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.total_balance.parse::<u128>().unwrap(), 1_500_000_000);
    }

    #[test]
    fn shared_owner_yields_initial_version() {
        let raw = r#"{"data": {"objectId": "0xc43d", "owner": {"Shared": {"initial_shared_version": 1574190}}}}"#;
        let parsed: ObjectResponse = serde_json::from_str(raw).unwrap();
        let owner = parsed.data.and_then(|d| d.owner).unwrap();
        assert_eq!(initial_shared_version(&owner), Some(1_574_190));

        assert_eq!(
            initial_shared_version(&json!({"Shared": {"initial_shared_version": "42"}})),
            Some(42)
        );
        assert_eq!(initial_shared_version(&json!({"AddressOwner": "0x1"})), None);
    }

    #[test]
    fn client_accepts_fullnode_url() {
        let url = Url::parse("https://fullnode.testnet.sui.io:443").unwrap();
        assert!(SuiRpcClient::new(&url).is_ok());
    }
}
