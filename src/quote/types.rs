use crate::amount::TokenAmount;
use crate::errors::{AppError, Result};
use bigdecimal::BigDecimal;
use num_traits::{Signed, ToPrimitive};
use std::fmt;
use std::str::FromStr;

pub const BPS_DENOMINATOR: u128 = 10_000;

/// Slippage tolerance in basis points (1 bp = 0.01%).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Slippage(u32);

impl Slippage {
    pub const ZERO: Self = Self(0);

    pub const fn from_bps(bps: u32) -> Self {
        Self(bps)
    }

    /// Parses a fraction such as `"0.01"` (1%). Sub-basis-point digits are
    /// truncated, except that a positive tolerance never drops below 1 bp.
    pub fn from_fraction_str(raw: &str) -> Result<Self> {
        let fraction = BigDecimal::from_str(raw.trim())
            .map_err(|e| AppError::InvalidSlippage(format!("'{raw}': {e}")))?;
        if fraction.is_negative() {
            return Err(AppError::InvalidSlippage(format!("'{raw}' is negative")));
        }
        let positive = fraction.is_positive();
        let bps = (fraction * BigDecimal::from(BPS_DENOMINATOR as u64)).with_scale(0);
        match bps.to_u32() {
            Some(0) if positive => Ok(Self(1)),
            Some(bps) => Ok(Self(bps)),
            None => Err(AppError::InvalidSlippage(format!("'{raw}' is out of range"))),
        }
    }

    pub const fn bps(&self) -> u32 {
        self.0
    }

    pub fn as_fraction(&self) -> f64 {
        self.0 as f64 / BPS_DENOMINATOR as f64
    }
}

impl fmt::Display for Slippage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}%", self.0 as f64 / 100.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Low,
    Medium,
    High,
    VeryHigh,
}

impl Severity {
    /// Display colour of the severity badge.
    pub fn color(&self) -> &'static str {
        match self {
            Severity::Low => "#4CAF50",
            Severity::Medium => "#FFC107",
            Severity::High => "#FF9800",
            Severity::VeryHigh => "#F44336",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::VeryHigh => "VERY_HIGH",
        };
        f.write_str(label)
    }
}

/// Upper bounds (inclusive) of each severity band, in basis points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImpactThresholds {
    pub low_bps: u64,
    pub medium_bps: u64,
    pub high_bps: u64,
}

impl Default for ImpactThresholds {
    fn default() -> Self {
        Self {
            low_bps: 100,
            medium_bps: 300,
            high_bps: 500,
        }
    }
}

impl ImpactThresholds {
    pub fn classify(&self, impact_bps: u64) -> Severity {
        if impact_bps <= self.low_bps {
            Severity::Low
        } else if impact_bps <= self.medium_bps {
            Severity::Medium
        } else if impact_bps <= self.high_bps {
            Severity::High
        } else {
            Severity::VeryHigh
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceImpact {
    pub bps: u64,
    pub severity: Severity,
}

impl PriceImpact {
    pub const NONE: Self = Self {
        bps: 0,
        severity: Severity::Low,
    };

    pub fn percentage(&self) -> f64 {
        self.bps as f64 / 100.0
    }

    pub fn message(&self) -> String {
        format!("Price Impact: {:.2}% ({})", self.percentage(), self.severity)
    }
}

/// How the estimated output of a swap is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PricingModel {
    /// Constant mid-pool price from custodian balances.
    MidPrice,
    /// Consume resting levels best-first; mid price when that side is empty.
    #[default]
    BookWalk,
}

impl FromStr for PricingModel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mid" | "mid_price" | "midprice" => Ok(PricingModel::MidPrice),
            "book" | "book_walk" | "bookwalk" => Ok(PricingModel::BookWalk),
            other => Err(format!("unknown pricing model '{other}' (expected mid|book)")),
        }
    }
}

/// Decimal counts of a pool's two assets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairDecimals {
    pub base: u8,
    pub quote: u8,
}

/// Swap preview derived from one snapshot and one input amount.
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    /// Output at the frictionless mid-pool price.
    pub expected_output: TokenAmount,
    pub estimated_output: TokenAmount,
    /// `estimated_output` reduced by the slippage tolerance, rounded down.
    pub minimum_output: TokenAmount,
    pub price_impact: PriceImpact,
}

impl Quote {
    /// The "no liquidity" quote.
    pub fn zeroed(output_decimals: u8) -> Self {
        Self {
            expected_output: TokenAmount::zero(output_decimals),
            estimated_output: TokenAmount::zero(output_decimals),
            minimum_output: TokenAmount::zero(output_decimals),
            price_impact: PriceImpact::NONE,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.estimated_output.is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slippage_parses_fractions() {
        assert_eq!(Slippage::from_fraction_str("0.01").unwrap().bps(), 100);
        assert_eq!(Slippage::from_fraction_str("0.005").unwrap().bps(), 50);
        assert_eq!(Slippage::from_fraction_str("0.00015").unwrap().bps(), 1);
        assert_eq!(Slippage::from_fraction_str("0").unwrap(), Slippage::ZERO);
        assert_eq!(Slippage::from_fraction_str("0.000").unwrap(), Slippage::ZERO);
        assert!(Slippage::from_fraction_str("-0.01").is_err());
        assert!(Slippage::from_fraction_str("one").is_err());
    }

    #[test]
    fn positive_sub_basis_point_slippage_is_one_bp() {
        assert_eq!(Slippage::from_fraction_str("0.00005").unwrap().bps(), 1);
        assert_eq!(Slippage::from_fraction_str("0.0000001").unwrap().bps(), 1);
    }

    #[test]
    fn thresholds_are_inclusive_upper_bounds() {
        let t = ImpactThresholds::default();
        assert_eq!(t.classify(0), Severity::Low);
        assert_eq!(t.classify(100), Severity::Low);
        assert_eq!(t.classify(101), Severity::Medium);
        assert_eq!(t.classify(300), Severity::Medium);
        assert_eq!(t.classify(500), Severity::High);
        assert_eq!(t.classify(501), Severity::VeryHigh);
    }

    #[test]
    fn impact_message_uses_percent() {
        let impact = PriceImpact {
            bps: 125,
            severity: Severity::Medium,
        };
        assert_eq!(impact.message(), "Price Impact: 1.25% (MEDIUM)");
        assert_eq!(Severity::VeryHigh.to_string(), "VERY_HIGH");
    }

    #[test]
    fn pricing_model_from_str() {
        assert_eq!("book".parse::<PricingModel>(), Ok(PricingModel::BookWalk));
        assert_eq!("MID".parse::<PricingModel>(), Ok(PricingModel::MidPrice));
        assert!("amm".parse::<PricingModel>().is_err());
    }
}
