use crate::amount::TokenAmount;
use crate::config::EngineConfig;
use crate::errors::{AppError, Result};
use crate::quote::{PriceImpact, Quote};

/// Bounds the validator enforces.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationConfig {
    /// Exclusive upper bound on slippage.
    pub max_slippage_bps: u32,
    pub warn_low_bps: u32,
    pub warn_high_bps: u32,
    pub min_liquidity: u128,
}

impl From<&EngineConfig> for ValidationConfig {
    fn from(engine: &EngineConfig) -> Self {
        Self {
            max_slippage_bps: engine.slippage_max_bps,
            warn_low_bps: engine.slippage_warn_low_bps,
            warn_high_bps: engine.slippage_warn_high_bps,
            min_liquidity: engine.min_liquidity,
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

/// Why an order was rejected, in precondition order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectReason {
    InvalidAmount,
    InvalidPrice,
    InsufficientBalance,
    InvalidSlippage,
    PoolNotFound,
    LowLiquidity,
    HighPriceImpact,
}

impl RejectReason {
    /// User-facing text.
    pub fn message(&self) -> &'static str {
        match self {
            RejectReason::InvalidAmount => "Please enter a valid amount",
            RejectReason::InvalidPrice => "Please enter a valid price",
            RejectReason::InsufficientBalance => "Insufficient balance for swap",
            RejectReason::InvalidSlippage => "Invalid slippage tolerance",
            RejectReason::PoolNotFound => "Trading pool not found or not initialized",
            RejectReason::LowLiquidity => "Insufficient liquidity in pool",
            RejectReason::HighPriceImpact => "Warning: High price impact on this trade",
        }
    }
}

/// Outcome of checking a slippage tolerance on its own.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SlippageCheck {
    pub is_valid: bool,
    pub error: Option<String>,
    pub warning: Option<String>,
}

/// Sole output of the order validator. Either valid or rejected with one reason.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub reason: Option<RejectReason>,
    /// Detail for the rejection, when more specific than the reason's message.
    pub error: Option<String>,
    /// Non-fatal advisory; present on valid results too.
    pub warning: Option<String>,
    /// Amount the order spends from the wallet, once computed.
    pub required: Option<TokenAmount>,
    pub available: Option<TokenAmount>,
    pub price_impact: Option<PriceImpact>,
    pub quote: Option<Quote>,
}

impl ValidationResult {
    pub(crate) fn rejected(reason: RejectReason) -> Self {
        Self {
            is_valid: false,
            reason: Some(reason),
            error: None,
            warning: None,
            required: None,
            available: None,
            price_impact: None,
            quote: None,
        }
    }

    pub(crate) fn accepted(quote: Quote) -> Self {
        Self {
            is_valid: true,
            reason: None,
            error: None,
            warning: None,
            required: None,
            available: None,
            price_impact: Some(quote.price_impact),
            quote: Some(quote),
        }
    }

    pub(crate) fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub(crate) fn with_warning(mut self, warning: Option<String>) -> Self {
        self.warning = warning;
        self
    }

    pub(crate) fn with_amounts(mut self, required: TokenAmount, available: TokenAmount) -> Self {
        self.required = Some(required);
        self.available = Some(available);
        self
    }

    /// Text to show the user for a rejection.
    pub fn message(&self) -> Option<String> {
        let reason = self.reason?;
        Some(
            self.error
                .clone()
                .unwrap_or_else(|| reason.message().to_string()),
        )
    }

    /// Converts a rejection into the matching error for `?` propagation.
    pub fn ensure_valid(&self, pool_id: &str) -> Result<()> {
        let Some(reason) = self.reason else {
            return Ok(());
        };
        let detail = self.message().unwrap_or_default();
        Err(match reason {
            RejectReason::InvalidAmount => AppError::InvalidAmount(detail),
            RejectReason::InvalidPrice => AppError::InvalidPrice(detail),
            RejectReason::InsufficientBalance => AppError::InsufficientBalance {
                required: self.required.map(|a| a.raw()).unwrap_or_default(),
                available: self.available.map(|a| a.raw()).unwrap_or_default(),
            },
            RejectReason::InvalidSlippage => AppError::InvalidSlippage(detail),
            RejectReason::PoolNotFound => AppError::PoolNotFound(pool_id.to_string()),
            RejectReason::LowLiquidity => AppError::LowLiquidity(pool_id.to_string()),
            RejectReason::HighPriceImpact => AppError::HighPriceImpact {
                bps: self.price_impact.map(|p| p.bps).unwrap_or_default(),
            },
        })
    }
}
