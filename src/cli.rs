//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, warn};

use crate::adapters::csv_adapter::{parse_timestamp, read_bars_file, CsvAdapter};
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
#[cfg(feature = "postgres")]
use crate::adapters::postgres_adapter::PostgresAdapter;
#[cfg(feature = "sqlite")]
use crate::adapters::sqlite_adapter::SqliteAdapter;
use crate::adapters::schema::DEFAULT_VENUE;
use crate::domain::backtest::{run_backtest as run_ledger, BacktestConfig};
use crate::domain::config_validation::{parse_date, validate_backtest_config, validate_strategy_config};
use crate::domain::error::BackledgerError;
use crate::domain::fee::Fee;
use crate::domain::metrics::LedgerSummary;
use crate::domain::ohlcv::PriceBar;
use crate::domain::resolution::Resolution;
use crate::domain::strategy::{BuyAndHold, RsiReversion, StrategyKind, VolatilityBreakout};
use crate::domain::transaction::TransactionRecord;
use crate::ports::config_port::ConfigPort;
use crate::ports::price_oracle::PriceOracle;
use crate::ports::price_series_port::PriceSeriesPort;
use crate::ports::recorder_port::TransactionRecorder;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "backledger", about = "Portfolio ledger backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Transaction log CSV, overrides [report] output
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        instrument: Option<String>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Look up the close at or before a timestamp
    Price {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        instrument: String,
        /// `YYYY-MM-DD HH:MM:SS` or `YYYY-MM-DD`
        #[arg(long)]
        at: String,
        #[arg(long, default_value = "1hour")]
        resolution: String,
    },
    /// Load a CSV price file into the configured database
    Import {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        csv: PathBuf,
        #[arg(long)]
        instrument: String,
        #[arg(long)]
        resolution: String,
    },
    /// Create price and transaction tables
    InitDb {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Print recorded transactions of a backtest id
    Transactions {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        id: String,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            output,
            instrument,
            dry_run,
        } => {
            if dry_run {
                run_dry_run(&config, instrument.as_deref())
            } else {
                run_backtest(&config, output.as_ref(), instrument.as_deref())
            }
        }
        Command::Price {
            config,
            instrument,
            at,
            resolution,
        } => run_price(&config, &instrument, &at, &resolution),
        Command::Import {
            config,
            csv,
            instrument,
            resolution,
        } => run_import(&config, &csv, &instrument, &resolution),
        Command::InitDb { config } => run_init_db(&config),
        Command::Transactions { config, id } => run_transactions(&config, &id),
    }
}

fn fail(err: BackledgerError) -> ExitCode {
    eprintln!("error: {err}");
    (&err).into()
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(fail)
}

/// Price source selected by `[data] source`.
pub enum DataSource {
    Csv(CsvAdapter),
    #[cfg(feature = "sqlite")]
    Sqlite(SqliteAdapter),
    #[cfg(feature = "postgres")]
    Postgres(PostgresAdapter),
}

impl DataSource {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, BackledgerError> {
        let source = config.get_string_or("data", "source", "csv");
        match source.as_str() {
            "csv" => {
                let path = config
                    .get_string("csv", "path")
                    .ok_or_else(|| BackledgerError::ConfigMissing {
                        section: "csv".into(),
                        key: "path".into(),
                    })?;
                Ok(DataSource::Csv(CsvAdapter::new(PathBuf::from(path))))
            }
            #[cfg(feature = "sqlite")]
            "sqlite" => Ok(DataSource::Sqlite(SqliteAdapter::from_config(config)?)),
            #[cfg(feature = "postgres")]
            "postgres" => Ok(DataSource::Postgres(PostgresAdapter::from_config(config)?)),
            other => Err(BackledgerError::ConfigInvalid {
                section: "data".into(),
                key: "source".into(),
                reason: format!("data source '{other}' is not available in this build"),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DataSource::Csv(_) => "csv",
            #[cfg(feature = "sqlite")]
            DataSource::Sqlite(_) => "sqlite",
            #[cfg(feature = "postgres")]
            DataSource::Postgres(_) => "postgres",
        }
    }

    pub fn series(&self) -> &dyn PriceSeriesPort {
        match self {
            DataSource::Csv(a) => a,
            #[cfg(feature = "sqlite")]
            DataSource::Sqlite(a) => a,
            #[cfg(feature = "postgres")]
            DataSource::Postgres(a) => a,
        }
    }

    pub fn oracle(&self) -> &dyn PriceOracle {
        match self {
            DataSource::Csv(a) => a,
            #[cfg(feature = "sqlite")]
            DataSource::Sqlite(a) => a,
            #[cfg(feature = "postgres")]
            DataSource::Postgres(a) => a,
        }
    }

    /// Database-backed sources double as the transaction recorder.
    pub fn recorder(&self) -> Option<&dyn TransactionRecorder> {
        match self {
            DataSource::Csv(_) => None,
            #[cfg(feature = "sqlite")]
            DataSource::Sqlite(a) => Some(a as &dyn TransactionRecorder),
            #[cfg(feature = "postgres")]
            DataSource::Postgres(a) => Some(a as &dyn TransactionRecorder),
        }
    }

    pub fn initialize_schema(&self) -> Result<(), BackledgerError> {
        match self {
            DataSource::Csv(_) => Err(not_a_database()),
            #[cfg(feature = "sqlite")]
            DataSource::Sqlite(a) => a.initialize_schema(),
            #[cfg(feature = "postgres")]
            DataSource::Postgres(a) => a.initialize_schema(),
        }
    }

    #[cfg_attr(not(any(feature = "sqlite", feature = "postgres")), allow(unused_variables))]
    pub fn insert_bars(&self, resolution: Resolution, bars: &[PriceBar]) -> Result<usize, BackledgerError> {
        match self {
            DataSource::Csv(_) => Err(not_a_database()),
            #[cfg(feature = "sqlite")]
            DataSource::Sqlite(a) => a.insert_bars(resolution, bars),
            #[cfg(feature = "postgres")]
            DataSource::Postgres(a) => a.insert_bars(resolution, bars),
        }
    }

    #[cfg_attr(not(any(feature = "sqlite", feature = "postgres")), allow(unused_variables))]
    pub fn transactions_for(&self, account_id: &str) -> Result<Vec<TransactionRecord>, BackledgerError> {
        match self {
            DataSource::Csv(_) => Err(not_a_database()),
            #[cfg(feature = "sqlite")]
            DataSource::Sqlite(a) => a.transactions_for(account_id),
            #[cfg(feature = "postgres")]
            DataSource::Postgres(a) => a.transactions_for(account_id),
        }
    }
}

fn not_a_database() -> BackledgerError {
    BackledgerError::ConfigInvalid {
        section: "data".into(),
        key: "source".into(),
        reason: "this command needs a database source (sqlite or postgres)".into(),
    }
}

pub fn build_backtest_config(adapter: &dyn ConfigPort) -> Result<BacktestConfig, BackledgerError> {
    let account_id = adapter
        .get_string("backtest", "id")
        .ok_or_else(|| BackledgerError::ConfigMissing {
            section: "backtest".into(),
            key: "id".into(),
        })?;
    let instrument = adapter
        .get_string("backtest", "instrument")
        .ok_or_else(|| BackledgerError::ConfigMissing {
            section: "backtest".into(),
            key: "instrument".into(),
        })?;

    let start_date = parse_date(adapter.get_string("backtest", "start_date").as_deref(), "start_date")?;
    let end_date = parse_date(adapter.get_string("backtest", "end_date").as_deref(), "end_date")?;

    let resolution = adapter
        .get_string_or("backtest", "resolution", "daily")
        .parse::<Resolution>()
        .map_err(|reason| BackledgerError::ConfigInvalid {
            section: "backtest".into(),
            key: "resolution".into(),
            reason,
        })?;

    let fee = Fee::from_parts(
        &adapter.get_string_or("fee", "type", "percent"),
        adapter.get_double("fee", "amount", 0.0005),
    )
    .map_err(|reason| BackledgerError::ConfigInvalid {
        section: "fee".into(),
        key: "type".into(),
        reason,
    })?;

    Ok(BacktestConfig {
        account_id: account_id.trim().to_string(),
        venue: adapter.get_string_or("backtest", "venue", DEFAULT_VENUE),
        instrument: instrument.trim().to_string(),
        start_date,
        end_date,
        initial_balance: adapter.get_double("backtest", "initial_balance", 10_000_000.0),
        record_initial_deposit: adapter.get_bool("backtest", "record_initial_deposit", false),
        resolution,
        fee,
        strategy: build_strategy(adapter)?,
    })
}

pub fn build_strategy(adapter: &dyn ConfigPort) -> Result<StrategyKind, BackledgerError> {
    let name = adapter.get_string_or("strategy", "name", "buy_and_hold");
    match name.as_str() {
        "buy_and_hold" => Ok(StrategyKind::BuyAndHold(BuyAndHold)),
        "volatility_breakout" => {
            let defaults = VolatilityBreakout::default();
            Ok(StrategyKind::VolatilityBreakout(VolatilityBreakout {
                k: adapter.get_double("strategy", "k", defaults.k),
                entry_offset_hours: adapter.get_int(
                    "strategy",
                    "entry_offset_hours",
                    defaults.entry_offset_hours,
                ),
            }))
        }
        "rsi" => {
            let defaults = RsiReversion::default();
            Ok(StrategyKind::RsiReversion(RsiReversion {
                period: adapter
                    .get_int("strategy", "rsi_period", defaults.period as i64)
                    .max(1) as usize,
                overbought: adapter.get_double("strategy", "overbought", defaults.overbought),
                oversold: adapter.get_double("strategy", "oversold", defaults.oversold),
            }))
        }
        other => Err(BackledgerError::ConfigInvalid {
            section: "strategy".into(),
            key: "name".into(),
            reason: format!("unknown strategy '{other}'"),
        }),
    }
}

fn load_and_build(
    config_path: &Path,
    instrument_override: Option<&str>,
) -> Result<(FileConfigAdapter, BacktestConfig), ExitCode> {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = load_config(config_path)?;

    validate_backtest_config(&adapter).map_err(fail)?;
    validate_strategy_config(&adapter).map_err(fail)?;

    let mut bt_config = build_backtest_config(&adapter).map_err(fail)?;
    if let Some(instrument) = instrument_override {
        bt_config.instrument = instrument.to_string();
    }
    Ok((adapter, bt_config))
}

/// Recorder for the run: the database source itself, or the `[sqlite]`
/// database when prices come from CSV files.
fn open_recorder(
    adapter: &dyn ConfigPort,
    source: &DataSource,
) -> Result<Option<Box<dyn TransactionRecorder>>, BackledgerError> {
    if source.recorder().is_some() {
        return Ok(None);
    }
    let recorder = sqlite_recorder(adapter)?;
    if recorder.is_none() {
        warn!("recorder enabled but no database is configured; transactions are not persisted");
    }
    Ok(recorder)
}

#[cfg(feature = "sqlite")]
fn sqlite_recorder(adapter: &dyn ConfigPort) -> Result<Option<Box<dyn TransactionRecorder>>, BackledgerError> {
    if adapter.get_string("sqlite", "path").is_none() {
        return Ok(None);
    }
    let sqlite = SqliteAdapter::from_config(adapter)?;
    sqlite.initialize_schema()?;
    info!(venue = sqlite.venue(), "recording transactions to sqlite");
    Ok(Some(Box::new(sqlite)))
}

#[cfg(not(feature = "sqlite"))]
fn sqlite_recorder(_adapter: &dyn ConfigPort) -> Result<Option<Box<dyn TransactionRecorder>>, BackledgerError> {
    Ok(None)
}

fn run_backtest(
    config_path: &Path,
    output_path: Option<&PathBuf>,
    instrument_override: Option<&str>,
) -> ExitCode {
    let (adapter, bt_config) = match load_and_build(config_path, instrument_override) {
        Ok(pair) => pair,
        Err(code) => return code,
    };

    let source = match DataSource::from_config(&adapter) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };
    info!(source = source.name(), "data source ready");

    let recorder_enabled = adapter.get_bool("recorder", "enabled", false);
    let fallback_recorder = if recorder_enabled {
        match open_recorder(&adapter, &source) {
            Ok(r) => r,
            Err(e) => return fail(e),
        }
    } else {
        None
    };
    let recorder: Option<&dyn TransactionRecorder> = match (recorder_enabled, &fallback_recorder) {
        (false, _) => None,
        (true, Some(r)) => Some(&**r),
        (true, None) => source.recorder(),
    };

    let output = output_path
        .cloned()
        .or_else(|| adapter.get_string("report", "output").map(PathBuf::from));

    run_backtest_pipeline(
        source.series(),
        source.oracle(),
        recorder,
        &bt_config,
        output.as_deref(),
    )
}

pub fn run_backtest_pipeline(
    series: &dyn PriceSeriesPort,
    oracle: &dyn PriceOracle,
    recorder: Option<&dyn TransactionRecorder>,
    bt_config: &BacktestConfig,
    output_path: Option<&Path>,
) -> ExitCode {
    // Stage 1: Fetch the driving series
    let (start, end) = bt_config.window();
    let bars = match series.fetch_bars(&bt_config.instrument, bt_config.resolution, start, end) {
        Ok(bars) => bars,
        Err(e) => return fail(e),
    };
    if bars.is_empty() {
        return fail(BackledgerError::NoData {
            instrument: bt_config.instrument.clone(),
            resolution: bt_config.resolution,
        });
    }

    eprintln!(
        "Running backtest {}: {} {} bars of {}, {} to {}",
        bt_config.account_id,
        bars.len(),
        bt_config.resolution,
        bt_config.instrument,
        bt_config.start_date,
        bt_config.end_date,
    );

    // Stage 2: Drive the ledger
    let ledger = match run_ledger(bt_config, &bars, oracle, recorder) {
        Ok(l) => l,
        Err(e) => return fail(e.into()),
    };

    // Stage 3: Console summary
    let summary = LedgerSummary::compute(&ledger);
    eprintln!("\n=== Ledger Summary ===");
    eprintln!("Strategy:         {}", bt_config.strategy.driver().name());
    eprintln!("Initial Balance:  {:.2}", summary.initial_balance);
    eprintln!("Final Cash:       {:.2}", summary.final_cash);
    eprintln!("Final Value:      {:.2}", summary.final_total_value);
    eprintln!("Total Return:     {:.2}%", summary.total_return * 100.0);
    eprintln!("Max Drawdown:     -{:.1}%", summary.max_drawdown * 100.0);
    eprintln!("Total Fees:       {:.2}", summary.total_fees);
    eprintln!(
        "Trades:           {} ({} buys, {} sells)",
        summary.trade_count, summary.buy_count, summary.sell_count
    );
    if summary.open_positions > 0 {
        eprintln!("Open Positions:   {}", summary.open_positions);
    }

    // Stage 4: Transaction report
    let Some(output) = output_path else {
        return ExitCode::SUCCESS;
    };
    match CsvReportAdapter.write(&summary, &ledger, &output.to_string_lossy()) {
        Ok(()) => {
            eprintln!("\nReport written to: {}", output.display());
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}

pub fn run_dry_run(config_path: &Path, instrument_override: Option<&str>) -> ExitCode {
    let (adapter, bt_config) = match load_and_build(config_path, instrument_override) {
        Ok(pair) => pair,
        Err(code) => return code,
    };
    eprintln!("Config validated successfully");

    eprintln!("\nBacktest:");
    eprintln!("  id:          {}", bt_config.account_id);
    eprintln!("  venue:       {}", bt_config.venue);
    eprintln!("  instrument:  {}", bt_config.instrument);
    eprintln!("  window:      {} to {}", bt_config.start_date, bt_config.end_date);
    eprintln!("  resolution:  {}", bt_config.resolution);
    eprintln!("  balance:     {:.2}", bt_config.initial_balance);
    eprintln!(
        "  fee:         {} {}",
        bt_config.fee.kind(),
        bt_config.fee.amount()
    );
    eprintln!("  strategy:    {:?}", bt_config.strategy);
    eprintln!(
        "  source:      {}",
        adapter.get_string_or("data", "source", "csv")
    );

    eprintln!("\nDry run complete: configuration is valid");
    ExitCode::SUCCESS
}

fn run_price(config_path: &Path, instrument: &str, at: &str, resolution: &str) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let Some(timestamp) = parse_timestamp(at) else {
        eprintln!("error: invalid timestamp '{at}', expected YYYY-MM-DD[ HH:MM:SS]");
        return ExitCode::from(2);
    };
    let resolution = match resolution.parse::<Resolution>() {
        Ok(r) => r,
        Err(reason) => {
            eprintln!("error: {reason}");
            return ExitCode::from(2);
        }
    };
    let source = match DataSource::from_config(&adapter) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };

    match source.oracle().price_at_or_before(instrument, timestamp, resolution) {
        Ok(price) => {
            println!("{price}");
            ExitCode::SUCCESS
        }
        Err(e) => fail(e.into()),
    }
}

fn run_import(config_path: &Path, csv_path: &Path, instrument: &str, resolution: &str) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let resolution = match resolution.parse::<Resolution>() {
        Ok(r) => r,
        Err(reason) => {
            eprintln!("error: {reason}");
            return ExitCode::from(2);
        }
    };

    let result = DataSource::from_config(&adapter).and_then(|source| {
        let bars = read_bars_file(csv_path, instrument)?;
        source.initialize_schema()?;
        source.insert_bars(resolution, &bars)
    });

    match result {
        Ok(count) => {
            eprintln!(
                "Imported {} {} bars of {} from {}",
                count,
                resolution,
                instrument,
                csv_path.display()
            );
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}

fn run_init_db(config_path: &Path) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    match DataSource::from_config(&adapter).and_then(|source| source.initialize_schema()) {
        Ok(()) => {
            eprintln!("Schema initialized");
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}

fn run_transactions(config_path: &Path, account_id: &str) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let records = match DataSource::from_config(&adapter).and_then(|s| s.transactions_for(account_id)) {
        Ok(r) => r,
        Err(e) => return fail(e),
    };

    if records.is_empty() {
        eprintln!("No transactions recorded for {account_id}");
        return ExitCode::SUCCESS;
    }

    println!(
        "{:<19}  {:<8}  {:<10}  {:>16}  {:>14}  {:>16}  {:>16}  {:>9}",
        "time", "type", "instrument", "price", "quantity", "cash", "total", "return"
    );
    for r in &records {
        println!(
            "{:<19}  {:<8}  {:<10}  {:>16.2}  {:>14.8}  {:>16.2}  {:>16.2}  {:>8.2}%",
            r.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            r.kind.as_str(),
            r.instrument,
            r.price,
            r.quantity,
            r.cash_balance,
            r.total_value,
            r.return_rate * 100.0
        );
    }
    ExitCode::SUCCESS
}
