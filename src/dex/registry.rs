//! Pool id lookup for an ordered (base, quote) pair.

use crate::errors::{AppError, Result};
use crate::ledger::Ledger;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

/// Dev-inspect needs a sender; the zero address owns nothing and signs nothing.
pub const INSPECT_SENDER: &str =
    "0x0000000000000000000000000000000000000000000000000000000000000000";

#[async_trait]
pub trait PoolRegistry: Send + Sync {
    /// `Ok(None)` when the registry has no pool for this direction.
    async fn lookup(&self, base: &str, quote: &str) -> Result<Option<String>>;
}

/// The `get_pool_id_by_asset<Base, Quote>(registry)` call to inspect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryCall {
    pub package: String,
    pub registry: String,
    /// Version at which the registry became shared.
    pub registry_version: u64,
    pub base: String,
    pub quote: String,
}

impl RegistryCall {
    pub fn target(&self) -> String {
        format!("{}::pool::get_pool_id_by_asset", self.package)
    }
}

/// Serializes a [`RegistryCall`] into base64 transaction-kind bytes.
/// See [`BcsCallEncoder`](super::tx::BcsCallEncoder).
pub trait RegistryCallEncoder: Send + Sync {
    fn encode(&self, call: &RegistryCall) -> Result<String>;
}

impl<F> RegistryCallEncoder for F
where
    F: Fn(&RegistryCall) -> Result<String> + Send + Sync,
{
    fn encode(&self, call: &RegistryCall) -> Result<String> {
        self(call)
    }
}

/// Looks pools up by dev-inspecting the on-chain registry.
pub struct DevInspectRegistry {
    ledger: Arc<dyn Ledger>,
    encoder: Arc<dyn RegistryCallEncoder>,
    package: String,
    registry: String,
    registry_version: OnceCell<u64>,
}

impl DevInspectRegistry {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        encoder: Arc<dyn RegistryCallEncoder>,
        package: impl Into<String>,
        registry: impl Into<String>,
    ) -> Self {
        Self {
            ledger,
            encoder,
            package: package.into(),
            registry: registry.into(),
            registry_version: OnceCell::new(),
        }
    }

    /// Shared version of the registry object, read once.
    async fn registry_version(&self) -> Result<u64> {
        self.registry_version
            .get_or_try_init(|| async {
                let version = self
                    .ledger
                    .shared_version(&self.registry)
                    .await?
                    .ok_or_else(|| {
                        AppError::Config(format!(
                            "registry {} is missing or not a shared object",
                            self.registry
                        ))
                    })?;
                debug!(registry = %self.registry, version, "[REGISTRY] shared version resolved");
                Ok::<_, AppError>(version)
            })
            .await
            .copied()
    }
}

#[async_trait]
impl PoolRegistry for DevInspectRegistry {
    async fn lookup(&self, base: &str, quote: &str) -> Result<Option<String>> {
        let call = RegistryCall {
            package: self.package.clone(),
            registry: self.registry.clone(),
            registry_version: self.registry_version().await?,
            base: base.to_string(),
            quote: quote.to_string(),
        };
        let tx_bytes = self.encoder.encode(&call)?;
        let results = self.ledger.dev_inspect(&tx_bytes, INSPECT_SENDER).await?;
        if !results.is_success() {
            return Ok(None);
        }
        match results.first_return_value() {
            Some((bytes, _type_tag)) => decode_object_id(base, quote, bytes).map(Some),
            None => Ok(None),
        }
    }
}

/// BCS `ID` is 32 raw bytes; render as `0x`-prefixed hex.
fn decode_object_id(base: &str, quote: &str, bytes: &[u8]) -> Result<String> {
    if bytes.len() != 32 {
        return Err(AppError::MalformedPoolData {
            pool_id: format!("{base}/{quote}"),
            reason: format!(
                "registry returned {} bytes, expected a 32-byte object id",
                bytes.len()
            ),
        });
    }
    Ok(format!("0x{}", hex::encode(bytes)))
}

/// Serves pool ids known ahead of time.
#[derive(Debug, Clone, Default)]
pub struct StaticRegistry {
    pools: HashMap<(String, String), String>,
}

impl StaticRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pool(
        mut self,
        base: impl Into<String>,
        quote: impl Into<String>,
        pool_id: impl Into<String>,
    ) -> Self {
        self.pools.insert((base.into(), quote.into()), pool_id.into());
        self
    }
}

#[async_trait]
impl PoolRegistry for StaticRegistry {
    async fn lookup(&self, base: &str, quote: &str) -> Result<Option<String>> {
        Ok(self
            .pools
            .get(&(base.to_string(), quote.to_string()))
            .cloned())
    }
}

/// Asks `primary` first and `fallback` when it has no answer.
///
/// A primary error is returned only if the fallback has no entry either.
pub struct FallbackRegistry {
    primary: Arc<dyn PoolRegistry>,
    fallback: Arc<dyn PoolRegistry>,
}

impl FallbackRegistry {
    pub fn new(primary: Arc<dyn PoolRegistry>, fallback: Arc<dyn PoolRegistry>) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl PoolRegistry for FallbackRegistry {
    async fn lookup(&self, base: &str, quote: &str) -> Result<Option<String>> {
        let primary = self.primary.lookup(base, quote).await;
        if let Ok(Some(pool_id)) = primary {
            return Ok(Some(pool_id));
        }
        if let Err(e) = &primary {
            warn!(base, quote, error = %e, "[REGISTRY] primary lookup failed, trying fallback");
        }
        match self.fallback.lookup(base, quote).await? {
            Some(pool_id) => Ok(Some(pool_id)),
            None => primary,
        }
    }
}
