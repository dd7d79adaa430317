//! Depth-ranked projection of resting orders.
//!
//! Everything here is a pure function of its input: no clock, no hidden
//! state, and the same levels always project to the same output.

use crate::models::{OrderLevel, PoolSnapshot};
use std::collections::BTreeMap;

/// A level with its derived cumulative depth and display bar width.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectedLevel {
    pub price: u64,
    pub size: u64,
    /// Running sum of `size` from the best price outward.
    pub total: u128,
    /// `price * size` relative to the largest notional on this side, 0..=100.
    pub depth_percent: f64,
}

impl ProjectedLevel {
    pub fn level(&self) -> OrderLevel {
        OrderLevel::new(self.price, self.size)
    }
}

/// Both sides of a projected book.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BookView {
    /// Best (highest) bid first.
    pub bids: Vec<ProjectedLevel>,
    /// Best (lowest) ask first.
    pub asks: Vec<ProjectedLevel>,
}

impl BookView {
    pub fn best_bid(&self) -> Option<u64> {
        self.bids.first().map(|l| l.price)
    }

    pub fn best_ask(&self) -> Option<u64> {
        self.asks.first().map(|l| l.price)
    }

    /// `best_ask - best_bid`; `None` for a one-sided or crossed book.
    pub fn spread(&self) -> Option<u64> {
        self.best_ask()?.checked_sub(self.best_bid()?)
    }

    pub fn mid_price(&self) -> Option<u64> {
        let (bid, ask) = (self.best_bid()? as u128, self.best_ask()? as u128);
        Some(((bid + ask) / 2) as u64)
    }
}

/// Stable price sort; equal prices keep their input order.
pub fn sort_levels(levels: &[OrderLevel], ascending: bool) -> Vec<OrderLevel> {
    let mut sorted = levels.to_vec();
    if ascending {
        sorted.sort_by(|a, b| a.price.cmp(&b.price));
    } else {
        sorted.sort_by(|a, b| b.price.cmp(&a.price));
    }
    sorted
}

/// Sort one side (ascending for asks, descending for bids) and derive
/// cumulative totals and depth bars.
pub fn project(levels: &[OrderLevel], ascending: bool) -> Vec<ProjectedLevel> {
    if levels.is_empty() {
        return Vec::new();
    }
    let max_notional = levels.iter().map(OrderLevel::notional).max().unwrap_or(0);

    let mut running: u128 = 0;
    sort_levels(levels, ascending)
        .into_iter()
        .map(|level| {
            running = running.saturating_add(level.size as u128);
            let depth_percent = if max_notional == 0 {
                0.0
            } else {
                level.notional() as f64 / max_notional as f64 * 100.0
            };
            ProjectedLevel {
                price: level.price,
                size: level.size,
                total: running,
                depth_percent,
            }
        })
        .collect()
}

pub fn project_book(snapshot: &PoolSnapshot) -> BookView {
    BookView {
        bids: project(&snapshot.bids, false),
        asks: project(&snapshot.asks, true),
    }
}

/// Merge levels sharing a price and keep the best `max_levels`.
pub fn aggregate(levels: &[OrderLevel], max_levels: usize, ascending: bool) -> Vec<OrderLevel> {
    let mut merged: BTreeMap<u64, u64> = BTreeMap::new();
    for level in levels {
        let size = merged.entry(level.price).or_insert(0);
        *size = size.saturating_add(level.size);
    }
    let iter = merged.into_iter().map(|(price, size)| OrderLevel::new(price, size));
    if ascending {
        iter.take(max_levels).collect()
    } else {
        iter.rev().take(max_levels).collect()
    }
}
