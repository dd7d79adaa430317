//! Conversion between human decimal strings and on-chain base units.
//!
//! Every financial computation in this crate runs on [`TokenAmount`]; floats
//! only appear in display-oriented values such as depth bars.

use crate::errors::{AppError, Result};
use crate::utils::{Rounding, mul_div, pow10};
use bigdecimal::BigDecimal;
use num_traits::{Signed, ToPrimitive};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Largest decimal count whose scale factor fits in `u128`.
pub const MAX_DECIMALS: u8 = 38;

/// Unsigned fixed-point amount in a token's smallest unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawAmount")]
pub struct TokenAmount {
    raw: u128,
    decimals: u8,
}

#[derive(Deserialize)]
struct RawAmount {
    raw: u128,
    decimals: u8,
}

impl TryFrom<RawAmount> for TokenAmount {
    type Error = AppError;

    fn try_from(value: RawAmount) -> Result<Self> {
        Self::new(value.raw, value.decimals)
    }
}

impl TokenAmount {
    pub fn new(raw: u128, decimals: u8) -> Result<Self> {
        if decimals > MAX_DECIMALS {
            return Err(AppError::InvalidAmount(format!(
                "decimals {decimals} exceeds maximum {MAX_DECIMALS}"
            )));
        }
        Ok(Self { raw, decimals })
    }

    pub const fn zero(decimals: u8) -> Self {
        Self { raw: 0, decimals }
    }

    pub const fn raw(&self) -> u128 {
        self.raw
    }

    pub const fn decimals(&self) -> u8 {
        self.decimals
    }

    pub const fn is_zero(&self) -> bool {
        self.raw == 0
    }

    pub fn checked_add(&self, other: &Self) -> Result<Self> {
        self.ensure_same_scale(other)?;
        let raw = self
            .raw
            .checked_add(other.raw)
            .ok_or_else(|| AppError::InvalidAmount("addition overflow".into()))?;
        Ok(Self { raw, ..*self })
    }

    pub fn checked_sub(&self, other: &Self) -> Result<Self> {
        self.ensure_same_scale(other)?;
        let raw = self
            .raw
            .checked_sub(other.raw)
            .ok_or_else(|| AppError::InvalidAmount("subtraction underflow".into()))?;
        Ok(Self { raw, ..*self })
    }

    /// Compares two amounts of the same token.
    pub fn try_cmp(&self, other: &Self) -> Result<std::cmp::Ordering> {
        self.ensure_same_scale(other)?;
        Ok(self.raw.cmp(&other.raw))
    }

    /// Explicit rescale. Dropping precision truncates toward zero.
    pub fn rescale(&self, decimals: u8) -> Result<Self> {
        if decimals > MAX_DECIMALS {
            return Err(AppError::InvalidAmount(format!(
                "decimals {decimals} exceeds maximum {MAX_DECIMALS}"
            )));
        }
        let raw = if decimals >= self.decimals {
            let factor = pow10(decimals - self.decimals).unwrap_or(u128::MAX);
            self.raw
                .checked_mul(factor)
                .ok_or_else(|| AppError::InvalidAmount("rescale overflow".into()))?
        } else {
            let factor = pow10(self.decimals - decimals).unwrap_or(u128::MAX);
            mul_div(self.raw, 1, factor, Rounding::Down).unwrap_or(0)
        };
        Ok(Self { raw, decimals })
    }

    fn ensure_same_scale(&self, other: &Self) -> Result<()> {
        if self.decimals != other.decimals {
            return Err(AppError::DecimalsMismatch {
                left: self.decimals,
                right: other.decimals,
            });
        }
        Ok(())
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&to_decimal_string(self))
    }
}

/// Parses a plain decimal string into base units, truncating excess fraction
/// digits.
///
/// Accepts `123`, `123.`, `.5` and `0.000001`. Signs, exponents, separators
/// and whitespace are rejected.
pub fn to_base_units(input: &str, decimals: u8) -> Result<TokenAmount> {
    if decimals > MAX_DECIMALS {
        return Err(AppError::InvalidAmount(format!(
            "decimals {decimals} exceeds maximum {MAX_DECIMALS}"
        )));
    }
    if !is_plain_decimal(input) {
        return Err(AppError::InvalidAmount(format!("'{input}' is not a decimal number")));
    }
    let normalized = if input.starts_with('.') {
        format!("0{input}")
    } else {
        input.trim_end_matches('.').to_string()
    };
    let parsed = BigDecimal::from_str(&normalized)
        .map_err(|e| AppError::InvalidAmount(format!("'{input}': {e}")))?;
    if parsed.is_negative() {
        return Err(AppError::InvalidAmount(format!("'{input}' is negative")));
    }
    // `with_scale` drops digits past the new scale without rounding.
    let (units, _scale) = parsed.with_scale(decimals as i64).into_bigint_and_exponent();
    let raw = units
        .to_u128()
        .ok_or_else(|| AppError::InvalidAmount(format!("'{input}' exceeds u128 range")))?;
    Ok(TokenAmount { raw, decimals })
}

/// Formats base units with exactly `decimals` fraction digits.
pub fn to_decimal_string(amount: &TokenAmount) -> String {
    if amount.decimals == 0 {
        return amount.raw.to_string();
    }
    let scale = pow10(amount.decimals).unwrap_or(u128::MAX);
    format!(
        "{}.{:0width$}",
        amount.raw / scale,
        amount.raw % scale,
        width = amount.decimals as usize
    )
}

fn is_plain_decimal(input: &str) -> bool {
    let mut digits = 0usize;
    let mut dots = 0usize;
    for c in input.chars() {
        match c {
            '0'..='9' => digits += 1,
            '.' => dots += 1,
            _ => return false,
        }
    }
    digits > 0 && dots <= 1
}
