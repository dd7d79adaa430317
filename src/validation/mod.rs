//! Pre-submission order checks.

pub mod evaluator;
pub mod types;

pub use evaluator::{OrderValidator, required_amount, validate_slippage};
pub use types::{RejectReason, SlippageCheck, ValidationConfig, ValidationResult};
