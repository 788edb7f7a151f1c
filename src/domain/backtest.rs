//! Backtest run parameters and the driver loop that feeds a ledger.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use tracing::info;

use super::error::LedgerError;
use super::fee::Fee;
use super::ledger::{Ledger, LedgerConfig};
use super::ohlcv::PriceBar;
use super::resolution::Resolution;
use super::strategy::StrategyKind;
use crate::ports::price_oracle::PriceOracle;
use crate::ports::recorder_port::TransactionRecorder;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub account_id: String,
    pub venue: String,
    pub instrument: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub initial_balance: f64,
    pub record_initial_deposit: bool,
    /// Resolution of the bar series the strategy iterates.
    pub resolution: Resolution,
    pub fee: Fee,
    pub strategy: StrategyKind,
}

impl BacktestConfig {
    /// Inclusive timestamp window covering every bar of the start and end days.
    pub fn window(&self) -> (NaiveDateTime, NaiveDateTime) {
        let start = self.start_date.and_time(NaiveTime::MIN);
        let end = self.end_date.and_hms_opt(23, 59, 59).unwrap_or(start);
        (start, end)
    }

    pub fn ledger_config(&self) -> LedgerConfig {
        LedgerConfig {
            account_id: self.account_id.clone(),
            venue: self.venue.clone(),
            initial_balance: self.initial_balance,
            record_initial_deposit: self.record_initial_deposit,
            opened_at: self.window().0,
        }
    }
}

/// Open a ledger for `config` and let its strategy drive it over `bars`.
///
/// The ledger is returned whether or not the strategy closed its position.
pub fn run_backtest<'a>(
    config: &BacktestConfig,
    bars: &[PriceBar],
    oracle: &'a dyn PriceOracle,
    recorder: Option<&'a dyn TransactionRecorder>,
) -> Result<Ledger<'a>, LedgerError> {
    let mut ledger = Ledger::open_with_recorder(config.ledger_config(), oracle, recorder)?;
    let driver = config.strategy.driver();

    info!(
        account = %config.account_id,
        instrument = %config.instrument,
        strategy = driver.name(),
        bars = bars.len(),
        "running backtest"
    );

    driver.drive(&config.instrument, bars, config.fee, &mut ledger)?;

    info!(
        account = %config.account_id,
        trades = ledger.trade_count(),
        return_rate = ledger.last_return_rate(),
        "backtest finished"
    );
    Ok(ledger)
}
