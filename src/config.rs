//! Configuration loader and application settings.

use crate::errors::{AppError, Result};
use crate::models::{TokenInfo, default_token_universe};
use crate::quote::{ImpactThresholds, PricingModel, Slippage};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

pub const DEFAULT_RPC_URL: &str = "https://fullnode.mainnet.sui.io:443";
pub const DEEPBOOK_PACKAGE_ID: &str =
    "0x000000000000000000000000000000000000000000000000000000000000dee9";
pub const DEEPBOOK_REGISTRY_ID: &str =
    "0xc43d77f51a52e046f150d05f3f23dba49bb3561ba424dcd6396b6707120c2fcd";

/// Tunables consumed by the quoting and validation core.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Exclusive upper bound on slippage tolerance.
    pub slippage_max_bps: u32,
    /// Slippage at or below this value is accepted with a warning.
    pub slippage_warn_low_bps: u32,
    /// Slippage at or above this value is accepted with a warning.
    pub slippage_warn_high_bps: u32,
    pub impact: ImpactThresholds,
    /// Quote-side balance a pool must exceed, in quote base units.
    pub min_liquidity: u128,
    pub refresh_interval: Duration,
    pub max_discovery_attempts: u32,
    pub backoff_base: Duration,
    pub pricing_model: PricingModel,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            slippage_max_bps: 5_000,
            slippage_warn_low_bps: 10,
            slippage_warn_high_bps: 500,
            impact: ImpactThresholds::default(),
            min_liquidity: 1_000_000,
            refresh_interval: Duration::from_secs(10),
            max_discovery_attempts: 3,
            backoff_base: Duration::from_millis(1_000),
            pricing_model: PricingModel::default(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.slippage_max_bps == 0 || self.slippage_max_bps > 10_000 {
            return Err(AppError::Config(
                "SLIPPAGE_MAX_BPS must be within (0, 10000]".into(),
            ));
        }
        if self.slippage_warn_low_bps >= self.slippage_warn_high_bps
            || self.slippage_warn_high_bps >= self.slippage_max_bps
        {
            return Err(AppError::Config(
                "slippage warning band must satisfy low < high < max".into(),
            ));
        }
        let t = &self.impact;
        if !(t.low_bps < t.medium_bps && t.medium_bps < t.high_bps) {
            return Err(AppError::Config(
                "price impact thresholds must be strictly increasing".into(),
            ));
        }
        if self.max_discovery_attempts == 0 {
            return Err(AppError::Config("MAX_DISCOVERY_ATTEMPTS must be >= 1".into()));
        }
        if self.refresh_interval.is_zero() {
            return Err(AppError::Config("REFRESH_INTERVAL_MS must be > 0".into()));
        }
        Ok(())
    }
}

/// A pool id supplied up front instead of discovered through the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticPool {
    pub base_symbol: String,
    pub quote_symbol: String,
    pub pool_id: String,
}

/// What the binary quotes and watches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub base_symbol: String,
    pub quote_symbol: String,
    /// Sell amount for a one-shot quote, as a decimal string.
    pub quote_amount: Option<String>,
    pub slippage: Slippage,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            base_symbol: "SUI".into(),
            quote_symbol: "USDC".into(),
            quote_amount: None,
            slippage: Slippage::from_bps(100),
        }
    }
}

/// Consolidated application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// JSON-RPC endpoint of a Sui fullnode.
    pub rpc_url: Url,
    /// Directory holding the persisted pair snapshot.
    pub store_dir: PathBuf,
    /// Owner whose balances are polled, if any.
    pub wallet_address: Option<String>,
    pub deepbook_package: String,
    pub registry_id: String,
    pub tokens: Vec<TokenInfo>,
    pub static_pools: Vec<StaticPool>,
    pub engine: EngineConfig,
    pub run: RunConfig,
}

impl AppConfig {
    /// Load configuration from process environment variables.
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let rpc_url = Url::parse(
            &lookup("RPC_URL").unwrap_or_else(|| DEFAULT_RPC_URL.to_string()),
        )?;
        let store_dir = PathBuf::from(lookup("STORE_DIR").unwrap_or_else(|| ".deepbook".into()));
        let wallet_address = lookup("WALLET_ADDRESS").filter(|s| !s.trim().is_empty());
        let deepbook_package =
            lookup("DEEPBOOK_PACKAGE").unwrap_or_else(|| DEEPBOOK_PACKAGE_ID.to_string());
        let registry_id =
            lookup("DEEPBOOK_REGISTRY").unwrap_or_else(|| DEEPBOOK_REGISTRY_ID.to_string());
        let static_pools = match lookup("POOL_IDS") {
            Some(raw) => parse_static_pools(&raw)?,
            None => Vec::new(),
        };

        let run = parse_run(&lookup)?;

        let defaults = EngineConfig::default();
        let engine = EngineConfig {
            slippage_max_bps: parse_or(&lookup, "SLIPPAGE_MAX_BPS", defaults.slippage_max_bps)?,
            slippage_warn_low_bps: parse_or(
                &lookup,
                "SLIPPAGE_WARN_LOW_BPS",
                defaults.slippage_warn_low_bps,
            )?,
            slippage_warn_high_bps: parse_or(
                &lookup,
                "SLIPPAGE_WARN_HIGH_BPS",
                defaults.slippage_warn_high_bps,
            )?,
            impact: ImpactThresholds {
                low_bps: parse_or(&lookup, "IMPACT_LOW_BPS", defaults.impact.low_bps)?,
                medium_bps: parse_or(&lookup, "IMPACT_MEDIUM_BPS", defaults.impact.medium_bps)?,
                high_bps: parse_or(&lookup, "IMPACT_HIGH_BPS", defaults.impact.high_bps)?,
            },
            min_liquidity: parse_or(&lookup, "MIN_LIQUIDITY", defaults.min_liquidity)?,
            refresh_interval: Duration::from_millis(parse_or(
                &lookup,
                "REFRESH_INTERVAL_MS",
                defaults.refresh_interval.as_millis() as u64,
            )?),
            max_discovery_attempts: parse_or(
                &lookup,
                "MAX_DISCOVERY_ATTEMPTS",
                defaults.max_discovery_attempts,
            )?,
            backoff_base: Duration::from_millis(parse_or(
                &lookup,
                "BACKOFF_BASE_MS",
                defaults.backoff_base.as_millis() as u64,
            )?),
            pricing_model: parse_or(&lookup, "PRICING_MODEL", defaults.pricing_model)?,
        };
        engine.validate()?;

        Ok(Self {
            rpc_url,
            store_dir,
            wallet_address,
            deepbook_package,
            registry_id,
            tokens: default_token_universe(),
            static_pools,
            engine,
            run,
        })
    }

    pub fn token(&self, symbol: &str) -> Option<&TokenInfo> {
        self.tokens.iter().find(|t| t.symbol.eq_ignore_ascii_case(symbol))
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("{key}={raw:?}: {e}"))),
        None => Ok(default),
    }
}

/// `PAIR=SUI/USDC`, `QUOTE_AMOUNT=1.5`, `SLIPPAGE=0.01`.
fn parse_run<F>(lookup: &F) -> Result<RunConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = RunConfig::default();
    let (base_symbol, quote_symbol) = match lookup("PAIR") {
        Some(raw) => raw
            .split_once('/')
            .map(|(b, q)| (b.trim().to_string(), q.trim().to_string()))
            .filter(|(b, q)| !b.is_empty() && !q.is_empty())
            .ok_or_else(|| AppError::Config(format!("PAIR={raw:?} must look like BASE/QUOTE")))?,
        None => (defaults.base_symbol, defaults.quote_symbol),
    };
    let slippage = match lookup("SLIPPAGE") {
        Some(raw) => Slippage::from_fraction_str(&raw)
            .map_err(|e| AppError::Config(format!("SLIPPAGE={raw:?}: {e}")))?,
        None => defaults.slippage,
    };
    Ok(RunConfig {
        base_symbol,
        quote_symbol,
        quote_amount: lookup("QUOTE_AMOUNT").filter(|s| !s.trim().is_empty()),
        slippage,
    })
}

/// Parses `SUI/USDC=0xabc,SUI/USDT=0xdef`.
fn parse_static_pools(raw: &str) -> Result<Vec<StaticPool>> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (pair, pool_id) = entry
                .split_once('=')
                .ok_or_else(|| AppError::Config(format!("POOL_IDS entry {entry:?} lacks '='")))?;
            let (base, quote) = pair
                .split_once('/')
                .ok_or_else(|| AppError::Config(format!("POOL_IDS pair {pair:?} lacks '/'")))?;
            Ok(StaticPool {
                base_symbol: base.trim().to_string(),
                quote_symbol: quote.trim().to_string(),
                pool_id: pool_id.trim().to_string(),
            })
        })
        .collect()
}
