//! SQLite storage adapter.
//!
//! Price bars live in one table per venue and resolution
//! (`upbit_daily_price`, `upbit_1hour_price`); committed ledger actions are
//! appended to `transactions_id_log`. Timestamps are stored as
//! `YYYY-MM-DD HH:MM:SS` text so lexical order is chronological order.

use crate::adapters::schema::{price_table, validate_venue, DEFAULT_VENUE, TIMESTAMP_FORMAT};
use crate::domain::error::{BackledgerError, LedgerError};
use crate::domain::fee::Fee;
use crate::domain::ohlcv::PriceBar;
use crate::domain::resolution::Resolution;
use crate::domain::transaction::{TransactionKind, TransactionRecord};
use crate::ports::config_port::ConfigPort;
use crate::ports::price_oracle::PriceOracle;
use crate::ports::price_series_port::PriceSeriesPort;
use crate::ports::recorder_port::TransactionRecorder;
use chrono::{NaiveDateTime, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};
use tracing::{debug, warn};

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
    venue: String,
}

fn pool_err(e: r2d2::Error) -> BackledgerError {
    BackledgerError::Database {
        reason: e.to_string(),
    }
}

fn query_err(e: rusqlite::Error) -> BackledgerError {
    BackledgerError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn text_to_timestamp(idx: usize, value: String) -> rusqlite::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(&value, TIMESTAMP_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn text_parse_err(idx: usize, reason: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        rusqlite::types::Type::Text,
        Box::new(std::io::Error::other(reason)),
    )
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, BackledgerError> {
        let db_path =
            config
                .get_string("sqlite", "path")
                .ok_or_else(|| BackledgerError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                })?;

        let pool_size = config.get_int("sqlite", "pool_size", 4).max(1) as u32;
        let venue = config.get_string_or("backtest", "venue", DEFAULT_VENUE);
        validate_venue(&venue)?;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(pool_err)?;

        debug!(path = %db_path, pool_size, %venue, "opened sqlite pool");
        Ok(Self { pool, venue })
    }

    pub fn in_memory() -> Result<Self, BackledgerError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(pool_err)?;

        Ok(Self {
            pool,
            venue: DEFAULT_VENUE.to_string(),
        })
    }

    pub fn venue(&self) -> &str {
        &self.venue
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, BackledgerError> {
        self.pool.get().map_err(pool_err)
    }

    pub fn initialize_schema(&self) -> Result<(), BackledgerError> {
        let conn = self.conn()?;

        for resolution in [Resolution::Coarse, Resolution::Fine] {
            let table = price_table(&self.venue, resolution);
            conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                    market TEXT NOT NULL,
                    timestamp TEXT NOT NULL,
                    open REAL NOT NULL,
                    high REAL NOT NULL,
                    low REAL NOT NULL,
                    close REAL NOT NULL,
                    volume REAL NOT NULL,
                    PRIMARY KEY (market, timestamp)
                );"
            ))
            .map_err(query_err)?;
        }

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS transactions_id_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                backtest_id TEXT NOT NULL,
                transaction_time TEXT NOT NULL,
                crypto_name TEXT NOT NULL,
                market_name TEXT NOT NULL,
                fee_type TEXT NOT NULL CHECK (fee_type IN ('percent', 'fixed')),
                fee_amount REAL NOT NULL,
                transaction_type TEXT NOT NULL
                    CHECK (transaction_type IN ('Buy', 'Sell', 'Deposit', 'Withdraw')),
                price REAL NOT NULL,
                quantity REAL NOT NULL,
                total_amount REAL NOT NULL,
                cash_balance REAL NOT NULL,
                asset_value REAL NOT NULL,
                total_value REAL NOT NULL,
                return_rate REAL NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_transactions_backtest
                ON transactions_id_log(backtest_id, transaction_time);",
        )
        .map_err(query_err)?;

        Ok(())
    }

    pub fn insert_bars(&self, resolution: Resolution, bars: &[PriceBar]) -> Result<usize, BackledgerError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;
        let sql = format!(
            "INSERT OR REPLACE INTO {} (market, timestamp, open, high, low, close, volume)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            price_table(&self.venue, resolution)
        );

        for bar in bars {
            tx.execute(
                &sql,
                params![
                    bar.instrument,
                    bar.timestamp.format(TIMESTAMP_FORMAT).to_string(),
                    bar.open,
                    bar.high,
                    bar.low,
                    bar.close,
                    bar.volume
                ],
            )
            .map_err(query_err)?;
        }

        tx.commit().map_err(query_err)?;
        Ok(bars.len())
    }

    /// Recorded actions of one account in insertion order.
    pub fn transactions_for(&self, account_id: &str) -> Result<Vec<TransactionRecord>, BackledgerError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT transaction_time, crypto_name, fee_type, fee_amount, transaction_type,
                        price, quantity, total_amount, cash_balance, asset_value, total_value,
                        return_rate
                 FROM transactions_id_log
                 WHERE backtest_id = ?1
                 ORDER BY id ASC",
            )
            .map_err(query_err)?;

        let rows = stmt
            .query_map(params![account_id], |row| {
                let fee_type: String = row.get(2)?;
                let fee = Fee::from_parts(&fee_type, row.get(3)?).map_err(|e| text_parse_err(2, e))?;
                let kind_str: String = row.get(4)?;
                let kind = kind_str
                    .parse::<TransactionKind>()
                    .map_err(|e| text_parse_err(4, e))?;
                Ok(TransactionRecord {
                    timestamp: text_to_timestamp(0, row.get(0)?)?,
                    instrument: row.get(1)?,
                    price: row.get(5)?,
                    quantity: row.get(6)?,
                    total_amount: row.get(7)?,
                    fee,
                    kind,
                    cash_balance: row.get(8)?,
                    asset_value: row.get(9)?,
                    total_value: row.get(10)?,
                    return_rate: row.get(11)?,
                })
            })
            .map_err(query_err)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row.map_err(query_err)?);
        }
        Ok(records)
    }

    fn latest_close(
        &self,
        instrument: &str,
        timestamp: NaiveDateTime,
        resolution: Resolution,
    ) -> Result<Option<f64>, BackledgerError> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT close FROM {} WHERE market = ?1 AND timestamp <= ?2
             ORDER BY timestamp DESC LIMIT 1",
            price_table(&self.venue, resolution)
        );
        conn.query_row(
            &sql,
            params![instrument, timestamp.format(TIMESTAMP_FORMAT).to_string()],
            |row| row.get(0),
        )
        .optional()
        .map_err(query_err)
    }
}

impl PriceSeriesPort for SqliteAdapter {
    fn fetch_bars(
        &self,
        instrument: &str,
        resolution: Resolution,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<PriceBar>, BackledgerError> {
        let conn = self.conn()?;

        let query = format!(
            "SELECT market, timestamp, open, high, low, close, volume
             FROM {}
             WHERE market = ?1 AND timestamp >= ?2 AND timestamp <= ?3
             ORDER BY timestamp ASC",
            price_table(&self.venue, resolution)
        );

        let mut stmt = conn.prepare(&query).map_err(query_err)?;

        let rows = stmt
            .query_map(
                params![
                    instrument,
                    start.format(TIMESTAMP_FORMAT).to_string(),
                    end.format(TIMESTAMP_FORMAT).to_string()
                ],
                |row| {
                    Ok(PriceBar {
                        instrument: row.get(0)?,
                        timestamp: text_to_timestamp(1, row.get(1)?)?,
                        open: row.get(2)?,
                        high: row.get(3)?,
                        low: row.get(4)?,
                        close: row.get(5)?,
                        volume: row.get(6)?,
                    })
                },
            )
            .map_err(query_err)?;

        let mut bars = Vec::new();
        for row in rows {
            bars.push(row.map_err(query_err)?);
        }

        Ok(bars)
    }

    fn list_instruments(&self, resolution: Resolution) -> Result<Vec<String>, BackledgerError> {
        let conn = self.conn()?;

        let query = format!(
            "SELECT DISTINCT market FROM {} ORDER BY market",
            price_table(&self.venue, resolution)
        );

        let mut stmt = conn.prepare(&query).map_err(query_err)?;
        let rows = stmt.query_map([], |row| row.get(0)).map_err(query_err)?;

        let mut instruments = Vec::new();
        for row in rows {
            instruments.push(row.map_err(query_err)?);
        }

        Ok(instruments)
    }
}

impl PriceOracle for SqliteAdapter {
    fn price_at_or_before(
        &self,
        instrument: &str,
        timestamp: NaiveDateTime,
        resolution: Resolution,
    ) -> Result<f64, LedgerError> {
        let price = self
            .latest_close(instrument, timestamp, resolution)
            .unwrap_or_else(|e| {
                warn!(instrument, %timestamp, %resolution, error = %e, "price lookup failed");
                None
            });

        price.ok_or_else(|| LedgerError::PriceUnavailable {
            instrument: instrument.to_string(),
            timestamp,
            resolution,
        })
    }
}

impl TransactionRecorder for SqliteAdapter {
    fn record(
        &self,
        account_id: &str,
        venue: &str,
        record: &TransactionRecord,
    ) -> Result<(), BackledgerError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO transactions_id_log (
                backtest_id, transaction_time, crypto_name, market_name, fee_type, fee_amount,
                transaction_type, price, quantity, total_amount, cash_balance, asset_value,
                total_value, return_rate, created_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                account_id,
                record.timestamp.format(TIMESTAMP_FORMAT).to_string(),
                record.instrument,
                venue,
                record.fee.kind().as_str(),
                record.fee.amount(),
                record.kind.as_str(),
                record.price,
                record.quantity,
                record.total_amount,
                record.cash_balance,
                record.asset_value,
                record.total_value,
                record.return_rate,
                Utc::now().naive_utc().format(TIMESTAMP_FORMAT).to_string(),
            ],
        )
        .map_err(query_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ledger::{Ledger, LedgerConfig};
    use chrono::NaiveDate;

    struct EmptyConfig;

    impl ConfigPort for EmptyConfig {
        fn get_string(&self, _section: &str, _key: &str) -> Option<String> {
            None
        }
        fn get_int(&self, _section: &str, _key: &str, default: i64) -> i64 {
            default
        }
        fn get_double(&self, _section: &str, _key: &str, default: f64) -> f64 {
            default
        }
        fn get_bool(&self, _section: &str, _key: &str, default: bool) -> bool {
            default
        }
    }

    fn ts(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn bar(instrument: &str, timestamp: NaiveDateTime, close: f64) -> PriceBar {
        PriceBar {
            instrument: instrument.to_string(),
            timestamp,
            open: close - 1.0,
            high: close + 1.0,
            low: close - 2.0,
            close,
            volume: 0.5,
        }
    }

    fn seeded() -> SqliteAdapter {
        let adapter = SqliteAdapter::in_memory().unwrap();
        adapter.initialize_schema().unwrap();
        adapter
            .insert_bars(
                Resolution::Fine,
                &[
                    bar("KRW-BTC", ts(1, 0), 100.0),
                    bar("KRW-BTC", ts(1, 1), 101.0),
                    bar("KRW-BTC", ts(1, 2), 102.0),
                    bar("KRW-ETH", ts(1, 0), 10.0),
                ],
            )
            .unwrap();
        adapter
            .insert_bars(Resolution::Coarse, &[bar("KRW-BTC", ts(1, 0), 99.0)])
            .unwrap();
        adapter
    }

    #[test]
    fn from_config_missing_path() {
        let config = EmptyConfig;
        let result = SqliteAdapter::from_config(&config);
        match result {
            Err(BackledgerError::ConfigMissing { section, key }) => {
                assert_eq!(section, "sqlite");
                assert_eq!(key, "path");
            }
            Err(other) => panic!("expected ConfigMissing, got: {other}"),
            Ok(_) => panic!("expected error, got Ok"),
        }
    }

    #[test]
    fn schema_initialization_is_idempotent() {
        let adapter = SqliteAdapter::in_memory().unwrap();
        adapter.initialize_schema().unwrap();
        adapter.initialize_schema().unwrap();
    }

    #[test]
    fn fetch_bars_returns_window_in_order() {
        let adapter = seeded();
        let bars = adapter
            .fetch_bars("KRW-BTC", Resolution::Fine, ts(1, 1), ts(1, 2))
            .unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].timestamp, ts(1, 1));
        assert_eq!(bars[1].close, 102.0);
        assert_eq!(bars[1].volume, 0.5);
    }

    #[test]
    fn list_instruments_per_resolution() {
        let adapter = seeded();
        assert_eq!(
            adapter.list_instruments(Resolution::Fine).unwrap(),
            vec!["KRW-BTC", "KRW-ETH"]
        );
        assert_eq!(adapter.list_instruments(Resolution::Coarse).unwrap(), vec!["KRW-BTC"]);
    }

    #[test]
    fn oracle_returns_latest_close_at_or_before() {
        let adapter = seeded();
        let at = ts(1, 1) + chrono::Duration::minutes(59);
        assert_eq!(
            adapter.price_at_or_before("KRW-BTC", at, Resolution::Fine).unwrap(),
            101.0
        );
        assert_eq!(
            adapter.price_at_or_before("KRW-BTC", ts(1, 5), Resolution::Coarse).unwrap(),
            99.0
        );
        assert!(matches!(
            adapter.price_at_or_before("KRW-BTC", ts(1, 0) - chrono::Duration::hours(1), Resolution::Fine),
            Err(LedgerError::PriceUnavailable { .. })
        ));
    }

    #[test]
    fn oracle_without_schema_is_unavailable() {
        let adapter = SqliteAdapter::in_memory().unwrap();
        let err = adapter
            .price_at_or_before("KRW-BTC", ts(1, 0), Resolution::Fine)
            .unwrap_err();
        assert!(matches!(err, LedgerError::PriceUnavailable { .. }));
    }

    #[test]
    fn recorder_round_trip_through_ledger() {
        let adapter = seeded();
        let config = LedgerConfig {
            account_id: "bt-sqlite".into(),
            venue: "upbit".into(),
            initial_balance: 10_000.0,
            record_initial_deposit: true,
            opened_at: ts(1, 0),
        };
        let mut ledger = Ledger::open_with_recorder(config, &adapter, Some(&adapter)).unwrap();
        ledger
            .buy(ts(1, 1), "KRW-BTC", 101.0, 10.0, Fee::Percentage(0.0005))
            .unwrap();
        ledger
            .sell(ts(1, 2), "KRW-BTC", 102.0, 10.0, Fee::Percentage(0.0005))
            .unwrap();

        let stored = adapter.transactions_for("bt-sqlite").unwrap();
        assert_eq!(stored.as_slice(), ledger.transactions());
        assert_eq!(stored[0].kind, TransactionKind::Deposit);
        assert_eq!(stored[1].fee, Fee::Percentage(0.0005));
        assert!(adapter.transactions_for("other").unwrap().is_empty());
    }
}
