//! Pool id discovery and the process-wide pair cache.

use super::registry::PoolRegistry;
use super::state::PoolStateReader;
use super::store::PairStore;
use crate::config::EngineConfig;
use crate::errors::{AppError, Result};
use crate::models::{PairLiquidity, PoolIdentity, PoolPair, PoolSnapshot, TokenInfo};
use crate::utils::now_millis;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tracing::{debug, info, warn};

type PairKey = (String, String);

/// Pair-to-pool cache and the discovered-pairs list, published together.
#[derive(Debug, Clone, Default)]
struct Published {
    cache: HashMap<PairKey, PoolIdentity>,
    pairs: Arc<Vec<PoolPair>>,
}

/// Resolves (base, quote) to pool identities and owns the discovered-pairs
/// snapshot. Construct once and share behind an `Arc`.
pub struct PoolDirectory {
    reader: PoolStateReader,
    registry: Arc<dyn PoolRegistry>,
    store: Arc<dyn PairStore>,
    max_attempts: u32,
    backoff_base: Duration,
    published: RwLock<Arc<Published>>,
    initialized: AtomicBool,
    initializing: AtomicBool,
}

/// Clears the in-flight flag however `discover_all` exits.
struct InitGuard<'a>(&'a AtomicBool);

impl Drop for InitGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl PoolDirectory {
    pub fn new(
        reader: PoolStateReader,
        registry: Arc<dyn PoolRegistry>,
        store: Arc<dyn PairStore>,
        engine: &EngineConfig,
    ) -> Self {
        Self {
            reader,
            registry,
            store,
            max_attempts: engine.max_discovery_attempts.max(1),
            backoff_base: engine.backoff_base,
            published: RwLock::new(Arc::default()),
            initialized: AtomicBool::new(false),
            initializing: AtomicBool::new(false),
        }
    }

    pub fn reader(&self) -> &PoolStateReader {
        &self.reader
    }

    fn current(&self) -> Arc<Published> {
        self.published
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn cached(&self, base: &str, quote: &str) -> Option<PoolIdentity> {
        self.current()
            .cache
            .get(&(base.to_string(), quote.to_string()))
            .cloned()
    }

    /// Copy-on-write: a published map is never modified.
    fn update_cache(&self, f: impl FnOnce(&mut HashMap<PairKey, PoolIdentity>)) {
        let mut slot = self.published.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = Published::clone(&slot);
        f(&mut next.cache);
        *slot = Arc::new(next);
    }

    /// Pool identity for the ordered pair, from cache when known.
    ///
    /// # Errors
    /// `PoolNotFound` once every discovery attempt has failed. Failures are not cached.
    pub async fn resolve(&self, base: &str, quote: &str) -> Result<PoolIdentity> {
        if let Some(identity) = self.cached(base, quote) {
            return Ok(identity);
        }
        let (identity, _) = self.discover(base, quote).await?;
        self.update_cache(|cache| {
            cache.insert((base.to_string(), quote.to_string()), identity.clone());
        });
        Ok(identity)
    }

    /// Drops the cached identity and discovers the pair again.
    pub async fn refresh(&self, base: &str, quote: &str) -> Result<PoolIdentity> {
        self.update_cache(|cache| {
            cache.remove(&(base.to_string(), quote.to_string()));
        });
        self.resolve(base, quote).await
    }

    /// Registry lookup plus a pool read, retried with linear backoff.
    async fn discover(&self, base: &str, quote: &str) -> Result<(PoolIdentity, PoolSnapshot)> {
        for attempt in 1..=self.max_attempts {
            match self.try_discover(base, quote).await {
                Ok(found) => {
                    debug!(
                        base,
                        quote,
                        pool_id = %found.0.pool_id,
                        attempt,
                        "[DIRECTORY] pool discovered"
                    );
                    return Ok(found);
                }
                Err(e) => {
                    warn!(
                        base,
                        quote,
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "[DIRECTORY] discovery attempt failed"
                    );
                }
            }
            if attempt < self.max_attempts {
                tokio::time::sleep(self.backoff_base * attempt).await;
            }
        }
        Err(AppError::PoolNotFound(format!("{base}/{quote}")))
    }

    async fn try_discover(&self, base: &str, quote: &str) -> Result<(PoolIdentity, PoolSnapshot)> {
        let pool_id = self
            .registry
            .lookup(base, quote)
            .await?
            .ok_or_else(|| AppError::PoolNotFound(format!("no registry entry for {base}/{quote}")))?;
        let snapshot = self.reader.fetch(&pool_id).await?;
        let identity = PoolIdentity {
            base_token: base.to_string(),
            quote_token: quote.to_string(),
            pool_id,
        };
        Ok((identity, snapshot))
    }

    /// Discovers every pair of `tokens` in both directions and replaces the
    /// persisted and in-memory snapshots with the result.
    ///
    /// # Errors
    /// `AlreadyInitializing` if another call is in flight; store errors propagate
    /// and leave the previous snapshot in place.
    pub async fn discover_all(&self, tokens: &[TokenInfo]) -> Result<Vec<PoolPair>> {
        if self
            .initializing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(AppError::AlreadyInitializing);
        }
        let _guard = InitGuard(&self.initializing);
        info!(tokens = tokens.len(), "[DIRECTORY] discovering pools");

        let mut pairs = Vec::new();
        for (i, a) in tokens.iter().enumerate() {
            for b in &tokens[i + 1..] {
                for (base, quote) in [(a, b), (b, a)] {
                    match self.discover(&base.coin_type, &quote.coin_type).await {
                        Ok((identity, snapshot)) => {
                            pairs.push(pool_pair(base, quote, identity, &snapshot))
                        }
                        Err(e) => debug!(
                            base = %base.symbol,
                            quote = %quote.symbol,
                            error = %e,
                            "[DIRECTORY] no pool"
                        ),
                    }
                }
            }
        }

        self.store.save(&pairs, now_millis()).await?;
        self.install(pairs.clone());
        info!(pairs = pairs.len(), "[DIRECTORY] pool discovery complete");
        Ok(pairs)
    }

    /// Warms the directory from the persisted snapshot. Returns the pair count.
    pub async fn load_persisted(&self) -> Result<usize> {
        let Some(stored) = self.store.load().await? else {
            return Ok(0);
        };
        let count = stored.pairs.len();
        debug!(
            pairs = count,
            last_updated = ?stored.last_updated,
            "[DIRECTORY] loaded persisted pairs"
        );
        self.install(stored.pairs);
        Ok(count)
    }

    /// Replaces the cache and the pair list in one swap. Identities absent
    /// from `pairs` are dropped, so `resolve` asks the registry again.
    fn install(&self, pairs: Vec<PoolPair>) {
        let cache = pairs
            .iter()
            .map(|pair| {
                (
                    (pair.base_token.clone(), pair.quote_token.clone()),
                    pair.identity(),
                )
            })
            .collect();
        let next = Published {
            cache,
            pairs: Arc::new(pairs),
        };
        *self.published.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(next);
        self.initialized.store(true, Ordering::Release);
    }

    /// Current snapshot; replaced wholesale by `discover_all` and `load_persisted`.
    pub fn available_pairs(&self) -> Arc<Vec<PoolPair>> {
        self.current().pairs.clone()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire) && !self.available_pairs().is_empty()
    }
}

fn pool_pair(
    base: &TokenInfo,
    quote: &TokenInfo,
    identity: PoolIdentity,
    snapshot: &PoolSnapshot,
) -> PoolPair {
    PoolPair {
        base_token: identity.base_token,
        quote_token: identity.quote_token,
        pool_id: identity.pool_id,
        symbol: format!("{}/{}", base.symbol, quote.symbol),
        base_decimals: base.decimals,
        quote_decimals: quote.decimals,
        last_updated: Some(snapshot.fetched_at),
        liquidity: Some(PairLiquidity {
            base: snapshot.base_balance,
            quote: snapshot.quote_balance,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dex::registry::{DevInspectRegistry, RegistryCall, RegistryCallEncoder, StaticRegistry};
    use crate::dex::store::MemoryPairStore;
    use crate::ledger::{DevInspectResults, InMemoryLedger};
    use serde_json::{Value, json};
    use tokio::time::Instant;

    fn pool_json(base: &str, quote: &str) -> Value {
        json!({
            "base_asset": base,
            "quote_asset": quote,
            "tick_size": "1000",
            "lot_size": "1000",
            "base_custodian": {"total_supply": "1000000000"},
            "quote_custodian": {"total_supply": "2000000"}
        })
    }

    fn engine() -> EngineConfig {
        EngineConfig {
            backoff_base: Duration::from_millis(1_000),
            max_discovery_attempts: 3,
            ..EngineConfig::default()
        }
    }

    // Encodes as "BASE<QUOTE,registry>" so scripted inspections are easy to key.
    fn encoder() -> Arc<dyn RegistryCallEncoder> {
        Arc::new(|call: &RegistryCall| -> Result<String> {
            Ok(format!("{}<{},{}>", call.base, call.quote, call.registry))
        })
    }

    fn inspect_directory(ledger: &Arc<InMemoryLedger>) -> PoolDirectory {
        ledger.set_shared_version("reg", 1);
        let registry = DevInspectRegistry::new(ledger.clone(), encoder(), "0xdee9", "reg");
        PoolDirectory::new(
            PoolStateReader::new(ledger.clone(), 1_000_000),
            Arc::new(registry),
            Arc::new(MemoryPairStore::new()),
            &engine(),
        )
    }

    fn id_bytes(byte: u8) -> (String, DevInspectResults) {
        (
            format!("0x{}", hex::encode([byte; 32])),
            DevInspectResults::success(vec![(vec![byte; 32], "0x2::object::ID".into())]),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn resolve_gives_up_after_max_attempts_with_linear_backoff() {
        let ledger = Arc::new(InMemoryLedger::new());
        ledger.fail_inspections(3);
        let directory = inspect_directory(&ledger);

        let started = Instant::now();
        let err = directory.resolve("SUI", "USDT").await.unwrap_err();
        assert!(matches!(err, AppError::PoolNotFound(_)));
        assert_eq!(ledger.inspect_calls(), 3);
        // 1000ms after the first attempt, 2000ms after the second, none after the last.
        assert_eq!(started.elapsed(), Duration::from_millis(3_000));

        // Nothing negative was cached: once the registry answers, resolve succeeds.
        let (pool_id, answer) = id_bytes(0xab);
        ledger.insert_inspection("SUI<USDT,reg>", answer);
        ledger.insert_object(pool_id.clone(), pool_json("SUI", "USDT"));
        let identity = directory.resolve("SUI", "USDT").await.unwrap();
        assert_eq!(identity.pool_id, pool_id);
        assert_eq!(ledger.inspect_calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn resolve_recovers_on_a_later_attempt() {
        let ledger = Arc::new(InMemoryLedger::new());
        let (pool_id, answer) = id_bytes(0x11);
        ledger.insert_inspection("SUI<USDC,reg>", answer);
        ledger.insert_object(pool_id.clone(), pool_json("SUI", "USDC"));
        ledger.fail_inspections(1);
        let directory = inspect_directory(&ledger);

        let started = Instant::now();
        let identity = directory.resolve("SUI", "USDC").await.unwrap();
        assert_eq!(identity.pool_id, pool_id);
        assert_eq!(started.elapsed(), Duration::from_millis(1_000));
        assert_eq!(ledger.inspect_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn unreadable_pool_counts_as_a_failed_attempt() {
        let ledger = Arc::new(InMemoryLedger::new());
        let (_, answer) = id_bytes(0x22);
        ledger.insert_inspection("SUI<USDC,reg>", answer);
        let directory = inspect_directory(&ledger);

        let err = directory.resolve("SUI", "USDC").await.unwrap_err();
        assert!(matches!(err, AppError::PoolNotFound(_)));
        assert_eq!(ledger.object_calls(), 3);
    }

    #[tokio::test]
    async fn resolve_hits_cache_and_refresh_rediscovers() {
        let ledger = Arc::new(InMemoryLedger::new());
        let (first_id, first) = id_bytes(0x01);
        let (second_id, second) = id_bytes(0x02);
        ledger.insert_inspection("SUI<USDC,reg>", first);
        ledger.insert_object(first_id.clone(), pool_json("SUI", "USDC"));
        ledger.insert_object(second_id.clone(), pool_json("SUI", "USDC"));
        let directory = inspect_directory(&ledger);

        assert_eq!(directory.resolve("SUI", "USDC").await.unwrap().pool_id, first_id);
        ledger.insert_inspection("SUI<USDC,reg>", second);
        assert_eq!(directory.resolve("SUI", "USDC").await.unwrap().pool_id, first_id);
        assert_eq!(ledger.inspect_calls(), 1);

        assert_eq!(directory.refresh("SUI", "USDC").await.unwrap().pool_id, second_id);
        assert_eq!(directory.resolve("SUI", "USDC").await.unwrap().pool_id, second_id);
        assert_eq!(ledger.inspect_calls(), 2);
    }

    fn tokens() -> Vec<TokenInfo> {
        vec![
            TokenInfo::new("SUI", "sui", 9),
            TokenInfo::new("USDC", "usdc", 6),
            TokenInfo::new("USDT", "usdt", 6),
        ]
    }

    fn static_directory(ledger: &Arc<InMemoryLedger>, store: Arc<MemoryPairStore>) -> PoolDirectory {
        let registry = StaticRegistry::new()
            .with_pool("sui", "usdc", "0xa")
            .with_pool("usdc", "sui", "0xb")
            .with_pool("sui", "usdt", "0xc");
        for (id, base, quote) in [("0xa", "sui", "usdc"), ("0xb", "usdc", "sui"), ("0xc", "sui", "usdt")] {
            ledger.insert_object(id, pool_json(base, quote));
        }
        let engine = EngineConfig {
            backoff_base: Duration::from_millis(10),
            ..EngineConfig::default()
        };
        PoolDirectory::new(
            PoolStateReader::new(ledger.clone(), 1_000_000),
            Arc::new(registry),
            store,
            &engine,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn discover_all_tries_both_directions_and_persists() {
        let ledger = Arc::new(InMemoryLedger::new());
        let store = Arc::new(MemoryPairStore::new());
        let directory = static_directory(&ledger, store.clone());
        assert!(!directory.is_initialized());

        let pairs = directory.discover_all(&tokens()).await.unwrap();
        let symbols: Vec<&str> = pairs.iter().map(|p| p.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["SUI/USDC", "USDC/SUI", "SUI/USDT"]);
        assert_eq!(pairs[0].base_decimals, 9);
        assert_eq!(pairs[0].quote_decimals, 6);
        assert_eq!(
            pairs[0].liquidity,
            Some(PairLiquidity { base: 1_000_000_000, quote: 2_000_000 })
        );

        assert!(directory.is_initialized());
        assert_eq!(*directory.available_pairs(), pairs);
        assert_eq!(store.load().await.unwrap().unwrap().pairs, pairs);

        // Discovered identities are served from cache afterwards.
        let calls = ledger.object_calls();
        assert_eq!(directory.resolve("usdc", "sui").await.unwrap().pool_id, "0xb");
        assert_eq!(ledger.object_calls(), calls);
    }

    #[tokio::test(start_paused = true)]
    async fn rediscovery_drops_pools_that_disappeared() {
        let ledger = Arc::new(InMemoryLedger::new());
        let (pool_id, answer) = id_bytes(0x07);
        ledger.insert_inspection("sui<usdc,reg>", answer);
        ledger.insert_object(pool_id.clone(), pool_json("SUI", "USDC"));
        let directory = inspect_directory(&ledger);
        let mut universe = tokens();
        universe.truncate(2);

        let pairs = directory.discover_all(&universe).await.unwrap();
        assert_eq!(pairs.len(), 1);
        assert_eq!(directory.resolve("sui", "usdc").await.unwrap().pool_id, pool_id);

        ledger.remove_object(&pool_id);
        assert!(directory.discover_all(&universe).await.unwrap().is_empty());
        assert!(directory.available_pairs().is_empty());

        let calls = ledger.inspect_calls();
        let err = directory.resolve("sui", "usdc").await.unwrap_err();
        assert!(matches!(err, AppError::PoolNotFound(_)));
        assert_eq!(ledger.inspect_calls(), calls + 3);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_discover_all_fails_fast() {
        let ledger = Arc::new(InMemoryLedger::new());
        ledger.set_latency(Duration::from_millis(50));
        let directory = static_directory(&ledger, Arc::new(MemoryPairStore::new()));
        let universe = tokens();

        let (first, second) = tokio::join!(
            directory.discover_all(&universe),
            directory.discover_all(&universe)
        );
        assert_eq!(first.unwrap().len(), 3);
        assert!(matches!(second, Err(AppError::AlreadyInitializing)));

        // The guard is released once the first call completes.
        assert!(directory.discover_all(&universe).await.is_ok());
    }

    #[tokio::test]
    async fn load_persisted_warms_the_cache() {
        let store = Arc::new(MemoryPairStore::new());
        let pair = PoolPair {
            base_token: "sui".into(),
            quote_token: "usdc".into(),
            pool_id: "0xa".into(),
            symbol: "SUI/USDC".into(),
            base_decimals: 9,
            quote_decimals: 6,
            last_updated: None,
            liquidity: None,
        };
        store.save(&[pair], 1).await.unwrap();

        let ledger = Arc::new(InMemoryLedger::new());
        let directory = PoolDirectory::new(
            PoolStateReader::new(ledger.clone(), 1_000_000),
            Arc::new(StaticRegistry::new()),
            store,
            &EngineConfig::default(),
        );
        assert_eq!(directory.load_persisted().await.unwrap(), 1);
        assert!(directory.is_initialized());
        assert_eq!(directory.resolve("sui", "usdc").await.unwrap().pool_id, "0xa");
        assert_eq!(ledger.object_calls(), 0);
    }
}
