#![allow(dead_code)]

use backledger::adapters::memory_adapter::InMemoryPriceStore;
use backledger::domain::backtest::BacktestConfig;
use backledger::domain::error::{BackledgerError, LedgerError};
use backledger::domain::fee::Fee;
use backledger::domain::ledger::LedgerConfig;
use backledger::domain::ohlcv::PriceBar;
use backledger::domain::resolution::Resolution;
use backledger::domain::strategy::{BuyAndHold, StrategyKind};
use backledger::domain::transaction::TransactionRecord;
use backledger::ports::price_oracle::PriceOracle;
use backledger::ports::price_series_port::PriceSeriesPort;
use backledger::ports::recorder_port::TransactionRecorder;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;

pub const INSTRUMENT: &str = "KRW-BTC";

pub fn ts(date: &str, hour: u32) -> NaiveDateTime {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .unwrap()
        .and_hms_opt(hour, 0, 0)
        .unwrap()
}

pub fn make_bar(instrument: &str, timestamp: NaiveDateTime, close: f64) -> PriceBar {
    PriceBar {
        instrument: instrument.to_string(),
        timestamp,
        open: close,
        high: close,
        low: close,
        close,
        volume: 1.0,
    }
}

/// One daily bar per close, starting at `start`.
pub fn daily_bars(instrument: &str, start: &str, closes: &[f64]) -> Vec<PriceBar> {
    let first = ts(start, 0);
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| make_bar(instrument, first + Duration::days(i as i64), c))
        .collect()
}

/// Daily bars plus an hourly series carrying the same close every hour of
/// each day.
pub fn store_with_days(instrument: &str, start: &str, closes: &[f64]) -> InMemoryPriceStore {
    let daily = daily_bars(instrument, start, closes);
    let hourly: Vec<PriceBar> = daily
        .iter()
        .flat_map(|bar| {
            (0..24).map(move |h| make_bar(&bar.instrument, bar.timestamp + Duration::hours(h), bar.close))
        })
        .collect();
    InMemoryPriceStore::new()
        .with_bars(Resolution::Coarse, daily)
        .with_bars(Resolution::Fine, hourly)
}

pub fn ledger_config(initial_balance: f64) -> LedgerConfig {
    LedgerConfig {
        account_id: "bt-test".into(),
        venue: "upbit".into(),
        initial_balance,
        record_initial_deposit: false,
        opened_at: ts("2024-01-01", 0),
    }
}

pub fn backtest_config(start: &str, end: &str) -> BacktestConfig {
    BacktestConfig {
        account_id: "bt-test".into(),
        venue: "upbit".into(),
        instrument: INSTRUMENT.into(),
        start_date: NaiveDate::parse_from_str(start, "%Y-%m-%d").unwrap(),
        end_date: NaiveDate::parse_from_str(end, "%Y-%m-%d").unwrap(),
        initial_balance: 1_000_000.0,
        record_initial_deposit: true,
        resolution: Resolution::Coarse,
        fee: Fee::Percentage(0.0005),
        strategy: StrategyKind::BuyAndHold(BuyAndHold),
    }
}

/// Oracle answering every lookup with the same price.
pub struct FlatOracle(pub f64);

impl PriceOracle for FlatOracle {
    fn price_at_or_before(
        &self,
        _instrument: &str,
        _timestamp: NaiveDateTime,
        _resolution: Resolution,
    ) -> Result<f64, LedgerError> {
        Ok(self.0)
    }
}

/// Series port that fails every fetch.
pub struct FailingSeries {
    pub reason: String,
}

impl PriceSeriesPort for FailingSeries {
    fn fetch_bars(
        &self,
        _instrument: &str,
        _resolution: Resolution,
        _start: NaiveDateTime,
        _end: NaiveDateTime,
    ) -> Result<Vec<PriceBar>, BackledgerError> {
        Err(BackledgerError::DatabaseQuery {
            reason: self.reason.clone(),
        })
    }

    fn list_instruments(&self, _resolution: Resolution) -> Result<Vec<String>, BackledgerError> {
        Ok(Vec::new())
    }
}

#[derive(Default)]
pub struct CapturingRecorder {
    pub records: RefCell<Vec<(String, TransactionRecord)>>,
}

impl TransactionRecorder for CapturingRecorder {
    fn record(
        &self,
        account_id: &str,
        _venue: &str,
        record: &TransactionRecord,
    ) -> Result<(), BackledgerError> {
        self.records
            .borrow_mut()
            .push((account_id.to_string(), record.clone()));
        Ok(())
    }
}

pub struct FailingRecorder;

impl TransactionRecorder for FailingRecorder {
    fn record(
        &self,
        _account_id: &str,
        _venue: &str,
        _record: &TransactionRecord,
    ) -> Result<(), BackledgerError> {
        Err(BackledgerError::Database {
            reason: "disk full".into(),
        })
    }
}

/// Write `<dir>/<instrument>_<resolution>.csv` from bars.
pub fn write_csv_series(dir: &Path, instrument: &str, resolution: Resolution, bars: &[PriceBar]) {
    let mut content = String::from("timestamp,open,high,low,close,volume\n");
    for bar in bars {
        content.push_str(&format!(
            "{},{},{},{},{},{}\n",
            bar.timestamp.format("%Y-%m-%d %H:%M:%S"),
            bar.open,
            bar.high,
            bar.low,
            bar.close,
            bar.volume
        ));
    }
    std::fs::write(dir.join(format!("{}_{}.csv", instrument, resolution)), content).unwrap();
}

pub fn exit_code_eq(actual: std::process::ExitCode, expected: u8) -> bool {
    format!("{:?}", actual) == format!("{:?}", std::process::ExitCode::from(expected))
}

pub fn kind_counts(records: &[TransactionRecord]) -> HashMap<String, usize> {
    let mut by_kind = HashMap::new();
    for r in records {
        *by_kind.entry(r.kind.as_str().to_string()).or_insert(0) += 1;
    }
    by_kind
}
