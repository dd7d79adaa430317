use super::types::{
    BPS_DENOMINATOR, ImpactThresholds, PairDecimals, PriceImpact, PricingModel, Quote, Slippage,
};
use crate::amount::TokenAmount;
use crate::errors::{AppError, Result};
use crate::models::{OrderLevel, PRICE_SCALE, PoolSnapshot, SwapDirection};
use crate::orderbook::sort_levels;
use crate::utils::{Rounding, mul_div};

/// Stateless swap quoting over a [`PoolSnapshot`].
#[derive(Debug, Clone, Copy, Default)]
pub struct QuoteEngine {
    pub thresholds: ImpactThresholds,
    pub model: PricingModel,
}

impl QuoteEngine {
    pub fn new(thresholds: ImpactThresholds, model: PricingModel) -> Self {
        Self { thresholds, model }
    }

    /// Quote `input` swapped through `snapshot` in `direction`.
    ///
    /// # Errors
    /// `InvalidAmount` for a zero input, `DecimalsMismatch` when `input` is not
    /// denominated in the input asset, `InvalidSlippage` above 100%.
    pub fn quote(
        &self,
        input: &TokenAmount,
        snapshot: &PoolSnapshot,
        direction: SwapDirection,
        decimals: PairDecimals,
        slippage: Slippage,
    ) -> Result<Quote> {
        let (in_decimals, out_decimals, reserve_in, reserve_out) = match direction {
            SwapDirection::BaseToQuote => (
                decimals.base,
                decimals.quote,
                snapshot.base_balance,
                snapshot.quote_balance,
            ),
            SwapDirection::QuoteToBase => (
                decimals.quote,
                decimals.base,
                snapshot.quote_balance,
                snapshot.base_balance,
            ),
        };
        if input.is_zero() {
            return Err(AppError::InvalidAmount("input amount must be positive".into()));
        }
        if input.decimals() != in_decimals {
            return Err(AppError::DecimalsMismatch {
                left: input.decimals(),
                right: in_decimals,
            });
        }
        if reserve_in == 0 || reserve_out == 0 {
            return Ok(Quote::zeroed(out_decimals));
        }

        let expected = mul_div(input.raw(), reserve_out, reserve_in, Rounding::Down)
            .ok_or_else(|| AppError::InvalidAmount("quote overflows u128".into()))?;

        let estimated = match self.model {
            PricingModel::MidPrice => expected,
            PricingModel::BookWalk => {
                let levels = match direction {
                    SwapDirection::BaseToQuote => &snapshot.bids,
                    SwapDirection::QuoteToBase => &snapshot.asks,
                };
                if levels.is_empty() {
                    expected
                } else {
                    walk_book(input.raw(), levels, direction)
                }
            }
        };

        let minimum = calculate_minimum_output(estimated, slippage)?;
        let price_impact = calculate_price_impact(expected, estimated, &self.thresholds);

        Ok(Quote {
            expected_output: TokenAmount::new(expected, out_decimals)?,
            estimated_output: TokenAmount::new(estimated, out_decimals)?,
            minimum_output: TokenAmount::new(minimum, out_decimals)?,
            price_impact,
        })
    }
}

/// `estimated * (1 - slippage)`, rounded down.
pub fn calculate_minimum_output(estimated: u128, slippage: Slippage) -> Result<u128> {
    let bps = slippage.bps() as u128;
    if bps > BPS_DENOMINATOR {
        return Err(AppError::InvalidSlippage(format!(
            "{slippage} exceeds 100%"
        )));
    }
    mul_div(estimated, BPS_DENOMINATOR - bps, BPS_DENOMINATOR, Rounding::Down)
        .ok_or_else(|| AppError::InvalidAmount("minimum output overflows u128".into()))
}

/// `|expected - actual| / expected`, rounded up to whole basis points.
pub fn calculate_price_impact(
    expected: u128,
    actual: u128,
    thresholds: &ImpactThresholds,
) -> PriceImpact {
    if expected == 0 {
        return PriceImpact::NONE;
    }
    let diff = expected.abs_diff(actual);
    let bps = mul_div(diff, BPS_DENOMINATOR, expected, Rounding::Up)
        .map(|v| v.min(u64::MAX as u128) as u64)
        .unwrap_or(u64::MAX);
    PriceImpact {
        bps,
        severity: thresholds.classify(bps),
    }
}

/// Output of consuming resting levels best-first. Input beyond the visible
/// depth stays unfilled and contributes nothing.
fn walk_book(input: u128, levels: &[OrderLevel], direction: SwapDirection) -> u128 {
    let ascending = direction == SwapDirection::QuoteToBase;
    let mut remaining = input;
    let mut output: u128 = 0;

    for level in sort_levels(levels, ascending) {
        if remaining == 0 {
            break;
        }
        if level.price == 0 || level.size == 0 {
            continue;
        }
        let price = level.price as u128;
        let size = level.size as u128;
        match direction {
            SwapDirection::BaseToQuote => {
                let take = remaining.min(size);
                output += mul_div(take, price, PRICE_SCALE, Rounding::Down).unwrap_or(0);
                remaining -= take;
            }
            SwapDirection::QuoteToBase => {
                let Some(cost) = mul_div(size, price, PRICE_SCALE, Rounding::Up) else {
                    continue;
                };
                if remaining >= cost {
                    output += size;
                    remaining -= cost;
                } else {
                    output += mul_div(remaining, PRICE_SCALE, price, Rounding::Down).unwrap_or(0);
                    remaining = 0;
                }
            }
        }
    }
    output
}
