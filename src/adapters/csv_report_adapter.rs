//! CSV report adapter implementing ReportPort.
//!
//! Writes the transaction log to the requested path and a two-column
//! `metric,value` summary next to it (`<stem>_summary.csv`). Values are
//! written unrounded.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::adapters::schema::TIMESTAMP_FORMAT;
use crate::domain::error::BackledgerError;
use crate::domain::ledger::Ledger;
use crate::domain::metrics::LedgerSummary;
use crate::domain::transaction::TransactionRecord;
use crate::ports::report_port::ReportPort;

#[derive(Debug, Default, Clone, Copy)]
pub struct CsvReportAdapter;

#[derive(Serialize)]
struct TransactionRow<'a> {
    backtest_id: &'a str,
    transaction_time: String,
    instrument: &'a str,
    venue: &'a str,
    fee_type: &'static str,
    fee_amount: f64,
    transaction_type: &'static str,
    price: f64,
    quantity: f64,
    total_amount: f64,
    cash_balance: f64,
    asset_value: f64,
    total_value: f64,
    return_rate: f64,
}

impl<'a> TransactionRow<'a> {
    fn new(ledger: &'a Ledger<'_>, record: &'a TransactionRecord) -> Self {
        TransactionRow {
            backtest_id: ledger.account_id(),
            transaction_time: record.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            instrument: &record.instrument,
            venue: ledger.venue(),
            fee_type: record.fee.kind().as_str(),
            fee_amount: record.fee.amount(),
            transaction_type: record.kind.as_str(),
            price: record.price,
            quantity: record.quantity,
            total_amount: record.total_amount,
            cash_balance: record.cash_balance,
            asset_value: record.asset_value,
            total_value: record.total_value,
            return_rate: record.return_rate,
        }
    }
}

fn csv_err(e: csv::Error) -> BackledgerError {
    BackledgerError::Csv {
        reason: e.to_string(),
    }
}

/// `out/run.csv` -> `out/run_summary.csv`.
pub fn summary_path(output_path: &Path) -> PathBuf {
    let stem = output_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "report".to_string());
    output_path.with_file_name(format!("{}_summary.csv", stem))
}

fn summary_rows(summary: &LedgerSummary) -> Vec<(&'static str, String)> {
    vec![
        ("account_id", summary.account_id.clone()),
        ("initial_balance", summary.initial_balance.to_string()),
        ("final_cash", summary.final_cash.to_string()),
        ("final_total_value", summary.final_total_value.to_string()),
        ("total_return", summary.total_return.to_string()),
        ("total_fees", summary.total_fees.to_string()),
        ("max_drawdown", summary.max_drawdown.to_string()),
        ("max_drawdown_duration", summary.max_drawdown_duration.to_string()),
        ("trade_count", summary.trade_count.to_string()),
        ("buy_count", summary.buy_count.to_string()),
        ("sell_count", summary.sell_count.to_string()),
        ("deposit_count", summary.deposit_count.to_string()),
        ("withdraw_count", summary.withdraw_count.to_string()),
        ("open_positions", summary.open_positions.to_string()),
    ]
}

impl ReportPort for CsvReportAdapter {
    fn write(
        &self,
        summary: &LedgerSummary,
        ledger: &Ledger<'_>,
        output_path: &str,
    ) -> Result<(), BackledgerError> {
        let path = Path::new(output_path);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
        for record in ledger.transactions() {
            writer
                .serialize(TransactionRow::new(ledger, record))
                .map_err(csv_err)?;
        }
        writer.flush()?;

        let mut writer = csv::Writer::from_path(summary_path(path)).map_err(csv_err)?;
        writer.write_record(["metric", "value"]).map_err(csv_err)?;
        for (metric, value) in summary_rows(summary) {
            writer.write_record([metric, value.as_str()]).map_err(csv_err)?;
        }
        writer.flush()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory_adapter::InMemoryPriceStore;
    use crate::domain::fee::Fee;
    use crate::domain::ledger::LedgerConfig;
    use crate::domain::ohlcv::PriceBar;
    use crate::domain::resolution::Resolution;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn store() -> InMemoryPriceStore {
        let ts = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        InMemoryPriceStore::new().with_bars(
            Resolution::Fine,
            vec![PriceBar {
                instrument: "KRW-BTC".into(),
                timestamp: ts,
                open: 100.0,
                high: 100.0,
                low: 100.0,
                close: 100.0,
                volume: 1.0,
            }],
        )
    }

    #[test]
    fn summary_path_sits_next_to_report() {
        assert_eq!(
            summary_path(Path::new("out/run.csv")),
            PathBuf::from("out/run_summary.csv")
        );
    }

    #[test]
    fn writes_transaction_log_and_summary() {
        let oracle = store();
        let opened_at = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let mut ledger = Ledger::open(
            LedgerConfig {
                account_id: "bt-report".into(),
                venue: "upbit".into(),
                initial_balance: 1_000.0,
                record_initial_deposit: true,
                opened_at,
            },
            &oracle,
        )
        .unwrap();
        ledger
            .buy(opened_at, "KRW-BTC", 100.0, 2.5, Fee::Percentage(0.001))
            .unwrap();

        let dir = TempDir::new().unwrap();
        let output = dir.path().join("reports").join("run.csv");
        let summary = LedgerSummary::compute(&ledger);
        CsvReportAdapter
            .write(&summary, &ledger, output.to_str().unwrap())
            .unwrap();

        let content = std::fs::read_to_string(&output).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("backtest_id,transaction_time,instrument,venue,fee_type"));
        assert!(lines[1].starts_with("bt-report,2024-01-01 00:00:00,CASH,upbit,fixed,0.0,Deposit"));
        assert!(lines[2].contains(",KRW-BTC,upbit,percent,0.001,Buy,100.0,2.5,"));

        let summary_csv = std::fs::read_to_string(summary_path(&output)).unwrap();
        assert!(summary_csv.starts_with("metric,value\n"));
        assert!(summary_csv.contains("trade_count,1\n"));
        assert!(summary_csv.contains("deposit_count,1\n"));
    }
}
