//! Core domain types and logic.

pub mod account;
pub mod backtest;
pub mod config_validation;
pub mod error;
pub mod fee;
pub mod indicator;
pub mod ledger;
pub mod metrics;
pub mod ohlcv;
pub mod resolution;
pub mod strategy;
pub mod transaction;
