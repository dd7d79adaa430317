//! Persisted "available pairs" snapshot.

use crate::errors::Result;
use crate::models::PoolPair;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::warn;

pub const PAIRS_KEY: &str = "deepbook_pairs";
pub const LAST_UPDATED_KEY: &str = "deepbook_last_updated";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPairs {
    pub pairs: Vec<PoolPair>,
    pub last_updated: Option<u64>,
}

#[async_trait]
pub trait PairStore: Send + Sync {
    /// `Ok(None)` when nothing has been persisted yet.
    async fn load(&self) -> Result<Option<StoredPairs>>;

    /// Replaces the stored snapshot as a whole.
    async fn save(&self, pairs: &[PoolPair], last_updated: u64) -> Result<()>;
}

/// JSON files in a directory: `deepbook_pairs.json` holds the pair array,
/// `deepbook_last_updated` the unix-ms stamp of the last save.
#[derive(Debug, Clone)]
pub struct FilePairStore {
    dir: PathBuf,
}

impl FilePairStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn pairs_path(&self) -> PathBuf {
        self.dir.join(format!("{PAIRS_KEY}.json"))
    }

    fn stamp_path(&self) -> PathBuf {
        self.dir.join(LAST_UPDATED_KEY)
    }
}

/// Write-then-rename so a reader sees the old file or the new one, never a mix.
async fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, contents).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

#[async_trait]
impl PairStore for FilePairStore {
    async fn load(&self) -> Result<Option<StoredPairs>> {
        let raw = match tokio::fs::read(self.pairs_path()).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let pairs: Vec<PoolPair> = serde_json::from_slice(&raw)?;
        let last_updated = match tokio::fs::read_to_string(self.stamp_path()).await {
            Ok(stamp) => stamp.trim().parse().ok(),
            Err(_) => None,
        };
        Ok(Some(StoredPairs {
            pairs,
            last_updated,
        }))
    }

    async fn save(&self, pairs: &[PoolPair], last_updated: u64) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let json = serde_json::to_vec(pairs)?;
        write_atomic(&self.pairs_path(), &json).await?;
        if let Err(e) = write_atomic(&self.stamp_path(), last_updated.to_string().as_bytes()).await
        {
            warn!(error = %e, "[STORE] failed to write last-updated stamp");
        }
        Ok(())
    }
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct MemoryPairStore {
    inner: Mutex<Option<StoredPairs>>,
}

impl MemoryPairStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PairStore for MemoryPairStore {
    async fn load(&self) -> Result<Option<StoredPairs>> {
        Ok(self
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    async fn save(&self, pairs: &[PoolPair], last_updated: u64) -> Result<()> {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner) = Some(StoredPairs {
            pairs: pairs.to_vec(),
            last_updated: Some(last_updated),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PairLiquidity;

    fn scratch_dir(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "deepbook-quoter-{tag}-{}-{}",
            std::process::id(),
            crate::utils::now_millis()
        ))
    }

    fn pair(symbol: &str, pool_id: &str) -> PoolPair {
        PoolPair {
            base_token: format!("{symbol}::base"),
            quote_token: format!("{symbol}::quote"),
            pool_id: pool_id.into(),
            symbol: symbol.into(),
            base_decimals: 9,
            quote_decimals: 6,
            last_updated: Some(1),
            liquidity: Some(PairLiquidity { base: 10, quote: 20 }),
        }
    }

    #[tokio::test]
    async fn file_store_round_trips_and_replaces() {
        let dir = scratch_dir("roundtrip");
        let store = FilePairStore::new(&dir);
        assert_eq!(store.load().await.unwrap(), None);

        let first = vec![pair("SUI/USDC", "0x1"), pair("SUI/USDT", "0x2")];
        store.save(&first, 100).await.unwrap();
        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.pairs, first);
        assert_eq!(loaded.last_updated, Some(100));

        let second = vec![pair("USDC/SUI", "0x3")];
        store.save(&second, 200).await.unwrap();
        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.pairs, second);
        assert!(!dir.join("deepbook_pairs.tmp").exists());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn corrupt_file_is_a_serialization_error() {
        let dir = scratch_dir("corrupt");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("deepbook_pairs.json"), b"{not json").unwrap();
        let store = FilePairStore::new(&dir);
        assert!(matches!(
            store.load().await,
            Err(crate::errors::AppError::SerdeJson(_))
        ));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn memory_store_keeps_last_save() {
        let store = MemoryPairStore::new();
        store.save(&[pair("A/B", "0x9")], 5).await.unwrap();
        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.pairs.len(), 1);
        assert_eq!(loaded.last_updated, Some(5));
    }
}
