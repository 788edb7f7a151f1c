//! PostgreSQL storage adapter.
//!
//! Same tables as the SQLite adapter, with `TIMESTAMP` columns and
//! `double precision` values.

use crate::adapters::schema::{price_table, validate_venue, DEFAULT_VENUE};
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
use postgres::NoTls;
use r2d2::{Pool, PooledConnection};
use r2d2_postgres::PostgresConnectionManager;
use tracing::{debug, warn};

type Manager = PostgresConnectionManager<NoTls>;

pub struct PostgresAdapter {
    pool: Pool<Manager>,
    venue: String,
}

fn query_err(e: postgres::Error) -> BackledgerError {
    BackledgerError::DatabaseQuery {
        reason: e.to_string(),
    }
}

impl PostgresAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, BackledgerError> {
        let connection_string = config
            .get_string("postgres", "connection_string")
            .ok_or_else(|| BackledgerError::ConfigMissing {
                section: "postgres".into(),
                key: "connection_string".into(),
            })?;

        let pg_config = connection_string
            .parse::<postgres::Config>()
            .map_err(|e| BackledgerError::ConfigInvalid {
                section: "postgres".into(),
                key: "connection_string".into(),
                reason: e.to_string(),
            })?;

        let venue = config.get_string_or("backtest", "venue", DEFAULT_VENUE);
        validate_venue(&venue)?;
        let pool_size = config.get_int("postgres", "pool_size", 4).max(1) as u32;

        let manager = PostgresConnectionManager::new(pg_config, NoTls);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(|e| BackledgerError::Database {
                reason: e.to_string(),
            })?;

        debug!(pool_size, %venue, "opened postgres pool");
        Ok(Self { pool, venue })
    }

    fn conn(&self) -> Result<PooledConnection<Manager>, BackledgerError> {
        self.pool.get().map_err(|e| BackledgerError::Database {
            reason: e.to_string(),
        })
    }

    pub fn initialize_schema(&self) -> Result<(), BackledgerError> {
        let mut conn = self.conn()?;

        for resolution in [Resolution::Coarse, Resolution::Fine] {
            let table = price_table(&self.venue, resolution);
            conn.batch_execute(&format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                    market TEXT NOT NULL,
                    timestamp TIMESTAMP NOT NULL,
                    open DOUBLE PRECISION NOT NULL,
                    high DOUBLE PRECISION NOT NULL,
                    low DOUBLE PRECISION NOT NULL,
                    close DOUBLE PRECISION NOT NULL,
                    volume DOUBLE PRECISION NOT NULL,
                    PRIMARY KEY (market, timestamp)
                );"
            ))
            .map_err(query_err)?;
        }

        conn.batch_execute(
            "DO $$ BEGIN
                CREATE TYPE fee_type_enum AS ENUM ('percent', 'fixed');
             EXCEPTION WHEN duplicate_object THEN NULL; END $$;
             DO $$ BEGIN
                CREATE TYPE transaction_type_enum AS ENUM ('Buy', 'Sell', 'Deposit', 'Withdraw');
             EXCEPTION WHEN duplicate_object THEN NULL; END $$;
             CREATE TABLE IF NOT EXISTS transactions_id_log (
                id BIGSERIAL PRIMARY KEY,
                backtest_id TEXT NOT NULL,
                transaction_time TIMESTAMP NOT NULL,
                crypto_name TEXT NOT NULL,
                market_name TEXT NOT NULL,
                fee_type fee_type_enum NOT NULL,
                fee_amount DOUBLE PRECISION NOT NULL,
                transaction_type transaction_type_enum NOT NULL,
                price DOUBLE PRECISION NOT NULL,
                quantity DOUBLE PRECISION NOT NULL,
                total_amount DOUBLE PRECISION NOT NULL,
                cash_balance DOUBLE PRECISION NOT NULL,
                asset_value DOUBLE PRECISION NOT NULL,
                total_value DOUBLE PRECISION NOT NULL,
                return_rate DOUBLE PRECISION NOT NULL,
                created_at TIMESTAMP NOT NULL
             );
             CREATE INDEX IF NOT EXISTS idx_transactions_backtest
                ON transactions_id_log(backtest_id, transaction_time);",
        )
        .map_err(query_err)?;
        Ok(())
    }

    pub fn insert_bars(&self, resolution: Resolution, bars: &[PriceBar]) -> Result<usize, BackledgerError> {
        let mut conn = self.conn()?;
        let mut tx = conn.transaction().map_err(query_err)?;
        let sql = format!(
            "INSERT INTO {} (market, timestamp, open, high, low, close, volume)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (market, timestamp) DO UPDATE SET
                open = EXCLUDED.open, high = EXCLUDED.high, low = EXCLUDED.low,
                close = EXCLUDED.close, volume = EXCLUDED.volume",
            price_table(&self.venue, resolution)
        );

        for bar in bars {
            tx.execute(
                sql.as_str(),
                &[
                    &bar.instrument,
                    &bar.timestamp,
                    &bar.open,
                    &bar.high,
                    &bar.low,
                    &bar.close,
                    &bar.volume,
                ],
            )
            .map_err(query_err)?;
        }

        tx.commit().map_err(query_err)?;
        Ok(bars.len())
    }

    pub fn transactions_for(&self, account_id: &str) -> Result<Vec<TransactionRecord>, BackledgerError> {
        let mut conn = self.conn()?;
        let rows = conn
            .query(
                "SELECT transaction_time, crypto_name, fee_type::text, fee_amount,
                        transaction_type::text, price, quantity, total_amount, cash_balance,
                        asset_value, total_value, return_rate
                 FROM transactions_id_log
                 WHERE backtest_id = $1
                 ORDER BY id ASC",
                &[&account_id],
            )
            .map_err(query_err)?;

        rows.into_iter()
            .map(|row| {
                let fee_type: String = row.get(2);
                let kind: String = row.get(4);
                let corrupt = |reason: String| BackledgerError::DatabaseQuery { reason };
                Ok(TransactionRecord {
                    timestamp: row.get(0),
                    instrument: row.get(1),
                    fee: Fee::from_parts(&fee_type, row.get(3)).map_err(corrupt)?,
                    kind: kind.parse::<TransactionKind>().map_err(corrupt)?,
                    price: row.get(5),
                    quantity: row.get(6),
                    total_amount: row.get(7),
                    cash_balance: row.get(8),
                    asset_value: row.get(9),
                    total_value: row.get(10),
                    return_rate: row.get(11),
                })
            })
            .collect()
    }

    fn latest_close(
        &self,
        instrument: &str,
        timestamp: NaiveDateTime,
        resolution: Resolution,
    ) -> Result<Option<f64>, BackledgerError> {
        let mut conn = self.conn()?;
        let sql = format!(
            "SELECT close FROM {} WHERE market = $1 AND timestamp <= $2
             ORDER BY timestamp DESC LIMIT 1",
            price_table(&self.venue, resolution)
        );
        let row = conn
            .query_opt(sql.as_str(), &[&instrument, &timestamp])
            .map_err(query_err)?;
        Ok(row.map(|r| r.get(0)))
    }
}

impl PriceSeriesPort for PostgresAdapter {
    fn fetch_bars(
        &self,
        instrument: &str,
        resolution: Resolution,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<PriceBar>, BackledgerError> {
        let mut conn = self.conn()?;
        let query = format!(
            "SELECT market, timestamp, open, high, low, close, volume
             FROM {}
             WHERE market = $1 AND timestamp >= $2 AND timestamp <= $3
             ORDER BY timestamp ASC",
            price_table(&self.venue, resolution)
        );

        let rows = conn
            .query(query.as_str(), &[&instrument, &start, &end])
            .map_err(query_err)?;

        let bars: Vec<PriceBar> = rows
            .into_iter()
            .map(|row| PriceBar {
                instrument: row.get(0),
                timestamp: row.get(1),
                open: row.get(2),
                high: row.get(3),
                low: row.get(4),
                close: row.get(5),
                volume: row.get(6),
            })
            .collect();

        Ok(bars)
    }

    fn list_instruments(&self, resolution: Resolution) -> Result<Vec<String>, BackledgerError> {
        let mut conn = self.conn()?;
        let query = format!(
            "SELECT DISTINCT market FROM {} ORDER BY market",
            price_table(&self.venue, resolution)
        );

        let rows = conn.query(query.as_str(), &[]).map_err(query_err)?;
        let instruments: Vec<String> = rows.into_iter().map(|row| row.get(0)).collect();

        Ok(instruments)
    }
}

impl PriceOracle for PostgresAdapter {
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

impl TransactionRecorder for PostgresAdapter {
    fn record(
        &self,
        account_id: &str,
        venue: &str,
        record: &TransactionRecord,
    ) -> Result<(), BackledgerError> {
        let mut conn = self.conn()?;
        let created_at = Utc::now().naive_utc();
        let fee_amount = record.fee.amount();
        conn.execute(
            "INSERT INTO transactions_id_log (
                backtest_id, transaction_time, crypto_name, market_name, fee_type, fee_amount,
                transaction_type, price, quantity, total_amount, cash_balance, asset_value,
                total_value, return_rate, created_at
             ) VALUES ($1, $2, $3, $4, $5::text::fee_type_enum, $6, $7::text::transaction_type_enum,
                       $8, $9, $10, $11, $12, $13, $14, $15)",
            &[
                &account_id,
                &record.timestamp,
                &record.instrument,
                &venue,
                &record.fee.kind().as_str(),
                &fee_amount,
                &record.kind.as_str(),
                &record.price,
                &record.quantity,
                &record.total_amount,
                &record.cash_balance,
                &record.asset_value,
                &record.total_value,
                &record.return_rate,
                &created_at,
            ],
        )
        .map_err(query_err)?;
        Ok(())
    }
}
