use super::types::{RejectReason, SlippageCheck, ValidationConfig, ValidationResult};
use crate::amount::TokenAmount;
use crate::config::EngineConfig;
use crate::dex::{PoolStateReader, PoolStatus};
use crate::errors::{AppError, Result};
use crate::models::{OrderIntent, OrderType, PRICE_SCALE, PoolSnapshot, Side, SwapDirection};
use crate::quote::{PairDecimals, QuoteEngine, Severity, Slippage};
use crate::utils::{Rounding, mul_div};
use std::cmp::Ordering;
use tracing::debug;

/// Checks a slippage tolerance against the configured band.
pub fn validate_slippage(slippage: Slippage, config: &ValidationConfig) -> SlippageCheck {
    let bps = slippage.bps();
    if bps == 0 {
        return SlippageCheck {
            is_valid: false,
            error: Some("Slippage must be greater than 0".into()),
            warning: None,
        };
    }
    if bps >= config.max_slippage_bps {
        return SlippageCheck {
            is_valid: false,
            error: Some(format!(
                "Slippage cannot exceed {}%",
                percent(config.max_slippage_bps)
            )),
            warning: None,
        };
    }
    let warning = if bps <= config.warn_low_bps {
        Some("Low slippage may cause failed transactions".to_string())
    } else if bps >= config.warn_high_bps {
        Some("High slippage may result in significant losses".to_string())
    } else {
        None
    };
    SlippageCheck {
        is_valid: true,
        error: None,
        warning,
    }
}

fn percent(bps: u32) -> String {
    if bps % 100 == 0 {
        (bps / 100).to_string()
    } else {
        format!("{:.2}", bps as f64 / 100.0)
    }
}

/// Amount the order takes out of the wallet.
///
/// Sells spend base. Market buys spend the quote amount given. Limit buys
/// spend `amount * price`, rounded up.
///
/// # Errors
/// `InvalidAmount` for a zero amount or one in the wrong token,
/// `InvalidPrice` for a limit order without a positive price.
pub fn required_amount(intent: &OrderIntent, decimals: PairDecimals) -> Result<TokenAmount> {
    if intent.amount.is_zero() {
        return Err(AppError::InvalidAmount("order amount must be positive".into()));
    }
    let price = match (intent.order_type, intent.price) {
        (OrderType::Limit, Some(p)) if p > 0 => Some(p),
        (OrderType::Limit, _) => {
            return Err(AppError::InvalidPrice("limit order needs a positive price".into()));
        }
        (OrderType::Market, _) => None,
    };
    let expected_decimals = match (intent.side, intent.order_type) {
        (Side::Sell, _) | (Side::Buy, OrderType::Limit) => decimals.base,
        (Side::Buy, OrderType::Market) => decimals.quote,
    };
    if intent.amount.decimals() != expected_decimals {
        return Err(AppError::InvalidAmount(format!(
            "amount has {} decimals, expected {expected_decimals}",
            intent.amount.decimals()
        )));
    }
    match (intent.side, price) {
        (Side::Buy, Some(price)) => {
            let raw = mul_div(intent.amount.raw(), price as u128, PRICE_SCALE, Rounding::Up)
                .ok_or_else(|| AppError::InvalidAmount("order notional overflows u128".into()))?;
            TokenAmount::new(raw, decimals.quote)
        }
        _ => Ok(intent.amount),
    }
}

/// Ordered precondition chain run immediately before an order is built.
#[derive(Debug, Clone)]
pub struct OrderValidator {
    config: ValidationConfig,
    engine: QuoteEngine,
}

impl OrderValidator {
    pub fn new(config: ValidationConfig, engine: QuoteEngine) -> Self {
        Self { config, engine }
    }

    pub fn from_engine_config(engine: &EngineConfig) -> Self {
        Self::new(
            ValidationConfig::from(engine),
            QuoteEngine::new(engine.impact, engine.pricing_model),
        )
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Validates `intent` against a pool snapshot (`None` if the pool could not
    /// be read) and the wallet balance of the token being spent.
    ///
    /// Rejections come back as an invalid [`ValidationResult`]. `Err` is kept
    /// for inputs that cannot be compared at all, such as a balance in the
    /// wrong token.
    pub fn validate(
        &self,
        intent: &OrderIntent,
        snapshot: Option<&PoolSnapshot>,
        wallet_balance: &TokenAmount,
        decimals: PairDecimals,
    ) -> Result<ValidationResult> {
        let required = match required_amount(intent, decimals) {
            Ok(required) => required,
            Err(AppError::InvalidAmount(msg)) => {
                return Ok(ValidationResult::rejected(RejectReason::InvalidAmount).with_error(msg));
            }
            Err(AppError::InvalidPrice(msg)) => {
                return Ok(ValidationResult::rejected(RejectReason::InvalidPrice).with_error(msg));
            }
            Err(e) => return Err(e),
        };

        if wallet_balance.try_cmp(&required)? == Ordering::Less {
            return Ok(ValidationResult::rejected(RejectReason::InsufficientBalance)
                .with_amounts(required, *wallet_balance));
        }

        let slippage = validate_slippage(intent.slippage, &self.config);
        if !slippage.is_valid {
            let msg = slippage.error.unwrap_or_default();
            return Ok(ValidationResult::rejected(RejectReason::InvalidSlippage).with_error(msg));
        }
        let warning = slippage.warning;

        let status = PoolStatus::of(snapshot, self.config.min_liquidity);
        let Some(snapshot) = snapshot.filter(|_| status.is_active) else {
            return Ok(ValidationResult::rejected(RejectReason::PoolNotFound).with_warning(warning));
        };
        if !status.has_liquidity {
            return Ok(ValidationResult::rejected(RejectReason::LowLiquidity).with_warning(warning));
        }

        let quote = self.engine.quote(
            &required,
            snapshot,
            SwapDirection::from(intent.side),
            decimals,
            intent.slippage,
        )?;
        if quote.price_impact.severity == Severity::VeryHigh {
            let mut result = ValidationResult::rejected(RejectReason::HighPriceImpact)
                .with_warning(warning);
            result.price_impact = Some(quote.price_impact);
            result.quote = Some(quote);
            return Ok(result);
        }

        Ok(ValidationResult::accepted(quote)
            .with_warning(warning)
            .with_amounts(required, *wallet_balance))
    }

    /// Reads the pool and validates against the fresh snapshot.
    ///
    /// Missing or malformed pools are rejected with `PoolNotFound`; transport
    /// errors propagate.
    pub async fn validate_live(
        &self,
        reader: &PoolStateReader,
        pool_id: &str,
        intent: &OrderIntent,
        wallet_balance: &TokenAmount,
        decimals: PairDecimals,
    ) -> Result<ValidationResult> {
        let snapshot = match reader.fetch(pool_id).await {
            Ok(snapshot) => Some(snapshot),
            Err(AppError::PoolNotFound(_)) | Err(AppError::MalformedPoolData { .. }) => None,
            Err(e) => return Err(e),
        };
        let result = self.validate(intent, snapshot.as_ref(), wallet_balance, decimals)?;
        debug!(
            pool_id,
            valid = result.is_valid,
            reason = ?result.reason,
            "[VALIDATE] order checked"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::to_base_units;
    use crate::ledger::InMemoryLedger;
    use crate::models::OrderLevel;
    use serde_json::json;
    use std::sync::Arc;

    const SUI_USDC: PairDecimals = PairDecimals { base: 9, quote: 6 };

    fn pool(quote_balance: u128, bids: Vec<OrderLevel>) -> PoolSnapshot {
        PoolSnapshot {
            pool_id: "0xpool".into(),
            base_asset: "0x2::sui::SUI".into(),
            quote_asset: "0xusdc::coin::COIN".into(),
            base_balance: 1_000_000_000,
            quote_balance,
            tick_size: 1_000,
            lot_size: 1_000,
            bids,
            asks: Vec::new(),
            fetched_at: 0,
        }
    }

    fn sui(raw: &str) -> TokenAmount {
        to_base_units(raw, 9).unwrap()
    }

    fn sell(amount: &str, slippage_bps: u32) -> OrderIntent {
        OrderIntent {
            side: Side::Sell,
            order_type: OrderType::Market,
            price: None,
            amount: sui(amount),
            slippage: Slippage::from_bps(slippage_bps),
        }
    }

    fn validator() -> OrderValidator {
        OrderValidator::from_engine_config(&EngineConfig::default())
    }

    #[test]
    fn slippage_band() {
        let cfg = ValidationConfig::default();
        let zero = validate_slippage(Slippage::ZERO, &cfg);
        assert!(!zero.is_valid);
        assert_eq!(zero.error.as_deref(), Some("Slippage must be greater than 0"));

        let max = validate_slippage(Slippage::from_bps(5_000), &cfg);
        assert!(!max.is_valid);
        assert_eq!(max.error.as_deref(), Some("Slippage cannot exceed 50%"));

        let low = validate_slippage(Slippage::from_bps(10), &cfg);
        assert!(low.is_valid);
        assert_eq!(
            low.warning.as_deref(),
            Some("Low slippage may cause failed transactions")
        );

        let high = validate_slippage(Slippage::from_bps(4_999), &cfg);
        assert!(high.is_valid);
        assert_eq!(
            high.warning.as_deref(),
            Some("High slippage may result in significant losses")
        );

        assert_eq!(
            validate_slippage(Slippage::from_bps(50), &cfg),
            SlippageCheck {
                is_valid: true,
                error: None,
                warning: None
            }
        );
    }

    #[test]
    fn sub_basis_point_tolerance_is_accepted_with_a_warning() {
        let slippage = Slippage::from_fraction_str("0.00005").unwrap();
        let check = validate_slippage(slippage, &ValidationConfig::default());
        assert!(check.is_valid);
        assert_eq!(
            check.warning.as_deref(),
            Some("Low slippage may cause failed transactions")
        );
    }

    #[test]
    fn required_amount_per_order_kind() {
        assert_eq!(required_amount(&sell("1.5", 50), SUI_USDC).unwrap(), sui("1.5"));

        let market_buy = OrderIntent {
            side: Side::Buy,
            amount: to_base_units("3", 6).unwrap(),
            ..sell("1", 50)
        };
        assert_eq!(
            required_amount(&market_buy, SUI_USDC).unwrap(),
            to_base_units("3", 6).unwrap()
        );

        let limit_buy = OrderIntent {
            side: Side::Buy,
            order_type: OrderType::Limit,
            price: Some(2_000_000),
            ..sell("1.5", 50)
        };
        assert_eq!(required_amount(&limit_buy, SUI_USDC).unwrap().raw(), 3_000_000);
        // 3_000_001.5 quote units, rounded up.
        let odd_price = OrderIntent {
            price: Some(2_000_001),
            ..limit_buy.clone()
        };
        assert_eq!(required_amount(&odd_price, SUI_USDC).unwrap().raw(), 3_000_002);

        let no_price = OrderIntent {
            price: None,
            ..limit_buy
        };
        assert!(matches!(
            required_amount(&no_price, SUI_USDC),
            Err(AppError::InvalidPrice(_))
        ));
        assert!(matches!(
            required_amount(&sell("0", 50), SUI_USDC),
            Err(AppError::InvalidAmount(_))
        ));
    }

    #[test]
    fn balance_check_precedes_slippage_check() {
        let snapshot = pool(2_000_000, Vec::new());
        let result = validator()
            .validate(&sell("2", 0), Some(&snapshot), &sui("1"), SUI_USDC)
            .unwrap();
        assert!(!result.is_valid);
        assert_eq!(result.reason, Some(RejectReason::InsufficientBalance));
        assert!(matches!(
            result.ensure_valid("0xpool"),
            Err(AppError::InsufficientBalance {
                required: 2_000_000_000,
                available: 1_000_000_000
            })
        ));
    }

    #[test]
    fn slippage_rejected_once_balance_is_sufficient() {
        let snapshot = pool(2_000_000, Vec::new());
        let result = validator()
            .validate(&sell("0.5", 0), Some(&snapshot), &sui("1"), SUI_USDC)
            .unwrap();
        assert_eq!(result.reason, Some(RejectReason::InvalidSlippage));
        assert_eq!(
            result.message().as_deref(),
            Some("Slippage must be greater than 0")
        );
    }

    #[test]
    fn unreadable_pool_then_thin_pool() {
        let v = validator();
        let result = v.validate(&sell("0.5", 100), None, &sui("1"), SUI_USDC).unwrap();
        assert_eq!(result.reason, Some(RejectReason::PoolNotFound));

        let thin = pool(999_999, Vec::new());
        let result = v
            .validate(&sell("0.5", 100), Some(&thin), &sui("1"), SUI_USDC)
            .unwrap();
        assert_eq!(result.reason, Some(RejectReason::LowLiquidity));
        assert_eq!(result.message().as_deref(), Some("Insufficient liquidity in pool"));
    }

    #[test]
    fn very_high_impact_is_rejected_with_impact_attached() {
        // Only 0.1 SUI of bids for a 0.5 SUI sell: 200_000 out of 1_000_000 expected.
        let snapshot = pool(2_000_000, vec![OrderLevel::new(2_000_000, 100_000_000)]);
        let result = validator()
            .validate(&sell("0.5", 100), Some(&snapshot), &sui("1"), SUI_USDC)
            .unwrap();
        assert_eq!(result.reason, Some(RejectReason::HighPriceImpact));
        let impact = result.price_impact.unwrap();
        assert_eq!(impact.bps, 8_000);
        assert_eq!(impact.severity, Severity::VeryHigh);
        assert!(matches!(
            result.ensure_valid("0xpool"),
            Err(AppError::HighPriceImpact { bps: 8_000 })
        ));
    }

    #[test]
    fn valid_order_carries_quote_and_warning() {
        let snapshot = pool(2_000_000, Vec::new());
        let result = validator()
            .validate(&sell("0.5", 10), Some(&snapshot), &sui("1"), SUI_USDC)
            .unwrap();
        assert!(result.is_valid);
        assert!(result.ensure_valid("0xpool").is_ok());
        assert_eq!(
            result.warning.as_deref(),
            Some("Low slippage may cause failed transactions")
        );
        let quote = result.quote.unwrap();
        assert_eq!(quote.estimated_output.raw(), 1_000_000);
        assert_eq!(quote.minimum_output.raw(), 999_000);
        assert_eq!(result.price_impact.unwrap().severity, Severity::Low);
    }

    #[test]
    fn balance_in_wrong_token_is_an_error() {
        let snapshot = pool(2_000_000, Vec::new());
        let usdc = to_base_units("10", 6).unwrap();
        assert!(matches!(
            validator().validate(&sell("0.5", 100), Some(&snapshot), &usdc, SUI_USDC),
            Err(AppError::DecimalsMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn validate_live_reads_the_pool() {
        let ledger = Arc::new(InMemoryLedger::new());
        ledger.insert_object(
            "0xpool",
            json!({
                "base_asset": "SUI",
                "quote_asset": "USDC",
                "tick_size": 1,
                "lot_size": 1,
                "base_custodian": {"total_supply": "1000000000"},
                "quote_custodian": {"total_supply": "2000000"}
            }),
        );
        let reader = PoolStateReader::new(ledger.clone(), 1_000_000);
        let v = validator();

        let ok = v
            .validate_live(&reader, "0xpool", &sell("0.5", 100), &sui("1"), SUI_USDC)
            .await
            .unwrap();
        assert!(ok.is_valid);

        let missing = v
            .validate_live(&reader, "0xgone", &sell("0.5", 100), &sui("1"), SUI_USDC)
            .await
            .unwrap();
        assert_eq!(missing.reason, Some(RejectReason::PoolNotFound));

        ledger.fail_object_reads(1);
        assert!(matches!(
            v.validate_live(&reader, "0xpool", &sell("0.5", 100), &sui("1"), SUI_USDC)
                .await,
            Err(AppError::Network(_))
        ));
    }
}
