use crate::errors::{AppError, Result};
use crate::ledger::Ledger;
use crate::models::{OrderLevel, PoolSnapshot};
use crate::utils::now_millis;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Activity and liquidity of a pool, derived from one snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    pub is_active: bool,
    pub has_liquidity: bool,
    pub min_liquidity: u128,
}

impl PoolStatus {
    /// `None` means the pool could not be read.
    pub fn of(snapshot: Option<&PoolSnapshot>, min_liquidity: u128) -> Self {
        match snapshot {
            Some(s) => Self {
                is_active: true,
                has_liquidity: s.base_balance > 0 && s.quote_balance > min_liquidity,
                min_liquidity,
            },
            None => Self {
                is_active: false,
                has_liquidity: false,
                min_liquidity,
            },
        }
    }
}

/// Stateless reader of pool objects. Never retries; the caller decides.
#[derive(Clone)]
pub struct PoolStateReader {
    ledger: Arc<dyn Ledger>,
    min_liquidity: u128,
}

impl PoolStateReader {
    pub fn new(ledger: Arc<dyn Ledger>, min_liquidity: u128) -> Self {
        Self {
            ledger,
            min_liquidity,
        }
    }

    pub fn min_liquidity(&self) -> u128 {
        self.min_liquidity
    }

    /// Build a `PoolSnapshot` from the pool object's current content.
    ///
    /// # Errors
    /// `PoolNotFound` if the object is absent, `MalformedPoolData` if required
    /// fields are missing or mistyped, `Network` on transport failure.
    pub async fn fetch(&self, pool_id: &str) -> Result<PoolSnapshot> {
        let content = self
            .ledger
            .get_object(pool_id)
            .await?
            .ok_or_else(|| AppError::PoolNotFound(pool_id.to_string()))?;
        let snapshot = parse_pool_content(pool_id, &content, now_millis())?;
        debug!(
            pool_id,
            base_balance = %snapshot.base_balance,
            quote_balance = %snapshot.quote_balance,
            bids = snapshot.bids.len(),
            asks = snapshot.asks.len(),
            "[POOL] snapshot fetched"
        );
        Ok(snapshot)
    }

    /// Unreadable pools report inactive; transport failures propagate.
    pub async fn check_state(&self, pool_id: &str) -> Result<PoolStatus> {
        match self.fetch(pool_id).await {
            Ok(snapshot) => Ok(PoolStatus::of(Some(&snapshot), self.min_liquidity)),
            Err(AppError::PoolNotFound(_)) | Err(AppError::MalformedPoolData { .. }) => {
                Ok(PoolStatus::of(None, self.min_liquidity))
            }
            Err(e) => Err(e),
        }
    }
}

/// Integers arrive as JSON strings or numbers depending on width.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Num {
    Int(u64),
    Text(String),
}

impl Num {
    fn to_u128(&self) -> Option<u128> {
        match self {
            Num::Int(v) => Some(*v as u128),
            Num::Text(s) => s.parse().ok(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CustodianFields {
    total_supply: Num,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Custodian {
    Wrapped { fields: CustodianFields },
    Flat(CustodianFields),
}

impl Custodian {
    fn total_supply(&self) -> &Num {
        match self {
            Custodian::Wrapped { fields } | Custodian::Flat(fields) => &fields.total_supply,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawLevel {
    price: Num,
    size: Num,
}

#[derive(Debug, Deserialize)]
struct PoolFields {
    #[serde(default)]
    base_asset: Option<String>,
    #[serde(default)]
    quote_asset: Option<String>,
    tick_size: Num,
    lot_size: Num,
    base_custodian: Custodian,
    quote_custodian: Custodian,
    #[serde(default)]
    bids: Option<Value>,
    #[serde(default)]
    asks: Option<Value>,
}

/// Strictly parses pool object content into a snapshot.
pub fn parse_pool_content(pool_id: &str, content: &Value, fetched_at: u64) -> Result<PoolSnapshot> {
    let malformed = |reason: String| AppError::MalformedPoolData {
        pool_id: pool_id.to_string(),
        reason,
    };
    let fields_value = content.get("fields").unwrap_or(content);
    let fields: PoolFields =
        serde_json::from_value(fields_value.clone()).map_err(|e| malformed(e.to_string()))?;

    let type_args = content
        .get("type")
        .and_then(Value::as_str)
        .map(type_arguments)
        .unwrap_or_default();
    let base_asset = fields
        .base_asset
        .clone()
        .or_else(|| type_args.first().cloned())
        .ok_or_else(|| malformed("base asset type unknown".into()))?;
    let quote_asset = fields
        .quote_asset
        .clone()
        .or_else(|| type_args.get(1).cloned())
        .ok_or_else(|| malformed("quote asset type unknown".into()))?;

    let int = |name: &str, n: &Num| -> Result<u128> {
        n.to_u128()
            .ok_or_else(|| malformed(format!("{name} is not an integer")))
    };
    let small = |name: &str, n: &Num| -> Result<u64> {
        u64::try_from(int(name, n)?).map_err(|_| malformed(format!("{name} exceeds u64")))
    };

    Ok(PoolSnapshot {
        pool_id: pool_id.to_string(),
        base_asset,
        quote_asset,
        base_balance: int("base_custodian.total_supply", fields.base_custodian.total_supply())?,
        quote_balance: int("quote_custodian.total_supply", fields.quote_custodian.total_supply())?,
        tick_size: small("tick_size", &fields.tick_size)?,
        lot_size: small("lot_size", &fields.lot_size)?,
        bids: parse_levels(pool_id, "bids", fields.bids.as_ref())?,
        asks: parse_levels(pool_id, "asks", fields.asks.as_ref())?,
        fetched_at,
    })
}

fn parse_levels(pool_id: &str, side: &str, raw: Option<&Value>) -> Result<Vec<OrderLevel>> {
    let Some(Value::Array(items)) = raw else {
        if raw.is_some_and(|v| !v.is_null()) {
            debug!(pool_id, side, "[POOL] non-list order side treated as empty");
        }
        return Ok(Vec::new());
    };
    items
        .iter()
        .map(|item| {
            let level: RawLevel = serde_json::from_value(item.clone()).map_err(|e| {
                AppError::MalformedPoolData {
                    pool_id: pool_id.to_string(),
                    reason: format!("{side}: {e}"),
                }
            })?;
            let to_u64 = |n: &Num| n.to_u128().and_then(|v| u64::try_from(v).ok());
            match (to_u64(&level.price), to_u64(&level.size)) {
                (Some(price), Some(size)) => Ok(OrderLevel::new(price, size)),
                _ => Err(AppError::MalformedPoolData {
                    pool_id: pool_id.to_string(),
                    reason: format!("{side}: level price/size is not a u64"),
                }),
            }
        })
        .collect()
}

/// Top-level generic arguments of a Move type, e.g. `Pool<A, B<C>>` -> `[A, B<C>]`.
fn type_arguments(type_tag: &str) -> Vec<String> {
    let (Some(open), Some(close)) = (type_tag.find('<'), type_tag.rfind('>')) else {
        return Vec::new();
    };
    if close <= open {
        return Vec::new();
    }
    let inner = &type_tag[open + 1..close];
    let mut args = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    for (i, c) in inner.char_indices() {
        match c {
            '<' => depth += 1,
            '>' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                args.push(inner[start..i].trim().to_string());
                start = i + 1;
            }
            _ => {}
        }
    }
    let last = inner[start..].trim();
    if !last.is_empty() {
        args.push(last.to_string());
    }
    args
}
