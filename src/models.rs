//! Shared data structures used throughout the application.

use crate::amount::TokenAmount;
use serde::{Deserialize, Serialize};

/// Fixed-point scale of on-chain prices: quote base units per base base-unit,
/// multiplied by 1e9.
pub const PRICE_SCALE: u128 = 1_000_000_000;

/// A coin type together with its display metadata.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenInfo {
    pub symbol: String,
    /// Fully qualified Move type, e.g. `0x2::sui::SUI`.
    pub coin_type: String,
    pub decimals: u8,
}

impl TokenInfo {
    pub fn new(symbol: impl Into<String>, coin_type: impl Into<String>, decimals: u8) -> Self {
        Self {
            symbol: symbol.into(),
            coin_type: coin_type.into(),
            decimals,
        }
    }
}

/// Known mainnet tokens.
pub fn default_token_universe() -> Vec<TokenInfo> {
    vec![
        TokenInfo::new("SUI", "0x2::sui::SUI", 9),
        TokenInfo::new(
            "USDC",
            "0x5d4b302506645c37ff133b98c4b50a5ae14841659738d6d733d59d0d217a93bf::coin::COIN",
            6,
        ),
        TokenInfo::new(
            "USDT",
            "0xc060006111016b8a020ad5b33834984a437aaa7d3c74c18e09a95d48aceab08c::coin::COIN",
            6,
        ),
        TokenInfo::new(
            "wETH",
            "0xaf8cd5edc19c4512f4259f0bee101c40768981429d8d886bd645fcd4574cd28d::coin::COIN",
            8,
        ),
        TokenInfo::new(
            "CETUS",
            "0x06864a6f921804860930db6ddbe2e16acdf8504495ea7481637a1c8b9a8fe54b::cetus::CETUS",
            9,
        ),
        TokenInfo::new(
            "WBTC",
            "0x027792d9fed7f9844eb4839566001bb6f6cb4804f66d4a1eab95843c9a8aa98c::coin::COIN",
            8,
        ),
    ]
}

/// A discovered pool for an ordered (base, quote) pair. Never mutated; a
/// refresh produces a new value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PoolIdentity {
    pub base_token: String,
    pub quote_token: String,
    pub pool_id: String,
}

/// Custodian balances recorded at discovery time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairLiquidity {
    #[serde(with = "u128_string")]
    pub base: u128,
    #[serde(with = "u128_string")]
    pub quote: u128,
}

/// One entry of the persisted "available pairs" snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolPair {
    pub base_token: String,
    pub quote_token: String,
    pub pool_id: String,
    pub symbol: String,
    pub base_decimals: u8,
    pub quote_decimals: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub liquidity: Option<PairLiquidity>,
}

impl PoolPair {
    pub fn identity(&self) -> PoolIdentity {
        PoolIdentity {
            base_token: self.base_token.clone(),
            quote_token: self.quote_token.clone(),
            pool_id: self.pool_id.clone(),
        }
    }
}

/// A resting order or aggregated price level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderLevel {
    /// Price scaled by [`PRICE_SCALE`].
    pub price: u64,
    /// Size in base-token base units.
    pub size: u64,
}

impl OrderLevel {
    pub const fn new(price: u64, size: u64) -> Self {
        Self { price, size }
    }

    /// `price * size`, the unscaled notional used for ranking.
    pub const fn notional(&self) -> u128 {
        self.price as u128 * self.size as u128
    }
}

/// Point-in-time pool state. Replaced wholesale on refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSnapshot {
    pub pool_id: String,
    pub base_asset: String,
    pub quote_asset: String,
    pub base_balance: u128,
    pub quote_balance: u128,
    pub tick_size: u64,
    pub lot_size: u64,
    pub bids: Vec<OrderLevel>,
    pub asks: Vec<OrderLevel>,
    /// Unix milliseconds at which the read completed.
    pub fetched_at: u64,
}

/// Order side from the trader's perspective on the base token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Limit,
    Market,
}

/// Direction of a swap through a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SwapDirection {
    /// Base in, quote out. Consumes bids.
    BaseToQuote,
    /// Quote in, base out. Consumes asks.
    QuoteToBase,
}

impl From<Side> for SwapDirection {
    fn from(side: Side) -> Self {
        match side {
            Side::Sell => SwapDirection::BaseToQuote,
            Side::Buy => SwapDirection::QuoteToBase,
        }
    }
}

/// A user-authored order request, consumed once by the validator.
///
/// `amount` is the base quantity for limit orders and the amount being spent
/// (base for sells, quote for buys) for market orders.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderIntent {
    pub side: Side,
    pub order_type: OrderType,
    pub price: Option<u64>,
    pub amount: TokenAmount,
    pub slippage: crate::quote::Slippage,
}

/// Balances serialized as strings keep full `u128` precision in JSON.
mod u128_string {
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(D::Error::custom)
    }
}
