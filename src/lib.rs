//! Core library for the deepbook-quoter project.
//!
//! Discovers DeepBook pools, reads their state, projects the order book,
//! quotes swaps and validates orders before a transaction is built.

pub mod amount;
pub mod config;
pub mod dex;
pub mod errors;
pub mod ledger;
pub mod models;
pub mod orderbook;
pub mod quote;
pub mod utils;
pub mod validation;
