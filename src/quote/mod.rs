//! Swap quoting: estimated and slippage-bounded output plus price impact.

pub mod calc;
pub mod types;

pub use calc::{QuoteEngine, calculate_minimum_output, calculate_price_impact};
pub use types::{
    ImpactThresholds, PairDecimals, PriceImpact, PricingModel, Quote, Severity, Slippage,
};
