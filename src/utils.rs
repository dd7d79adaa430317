//! Miscellaneous helper utilities.

use crate::errors::{AppError, Result};
use num_bigint::BigUint;
use num_traits::{ToPrimitive, Zero};
use std::future::Future;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, fmt};

/// Initialize `tracing` subscriber with env-based filter.
///
/// If `RUST_LOG` is not set, defaults to `info` level.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();
}

/// Milliseconds since the unix epoch, saturating to zero on a skewed clock.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Rounding direction for integer division.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rounding {
    Down,
    Up,
}

/// Computes `a * b / d` with a 256+ bit intermediate.
///
/// Returns `None` when `d == 0` or the quotient does not fit in `u128`.
pub fn mul_div(a: u128, b: u128, d: u128, rounding: Rounding) -> Option<u128> {
    if d == 0 {
        return None;
    }
    let numerator = BigUint::from(a) * BigUint::from(b);
    let divisor = BigUint::from(d);
    let quotient = &numerator / &divisor;
    let quotient = match rounding {
        Rounding::Down => quotient,
        Rounding::Up if !(&numerator % &divisor).is_zero() => quotient + 1u32,
        Rounding::Up => quotient,
    };
    quotient.to_u128()
}

/// `10^exp` as `u128`, `None` past 10^38.
pub fn pow10(exp: u8) -> Option<u128> {
    10u128.checked_pow(exp as u32)
}

/// Sending half of a [`Shutdown`] signal. Dropping it also cancels.
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }
}

/// Cancellation signal scoped to the lifetime of a view or component.
///
/// In-flight fetches wrapped with [`Shutdown::run`] resolve to
/// [`AppError::Cancelled`] once the trigger fires, so a stale result is never
/// applied after teardown.
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

pub fn shutdown_channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, Shutdown { rx })
}

impl Shutdown {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }

    /// Resolves once the trigger fires or is dropped.
    pub async fn cancelled(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Runs `fut` unless cancellation wins the race.
    pub async fn run<F, T>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let mut signal = self.clone();
        tokio::select! {
            biased;
            _ = signal.cancelled() => Err(AppError::Cancelled),
            res = fut => res,
        }
    }
}
