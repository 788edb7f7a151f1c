//! CSV file price adapter.
//!
//! One file per instrument and resolution, `<INSTRUMENT>_<resolution>.csv`,
//! with header `timestamp,open,high,low,close,volume`. Series are loaded
//! lazily and cached, so oracle lookups during a run hit memory only.

use crate::adapters::memory_adapter::{close_at_or_before, InMemoryPriceStore};
use crate::domain::error::{BackledgerError, LedgerError};
use crate::domain::ohlcv::PriceBar;
use crate::domain::resolution::Resolution;
use crate::ports::price_oracle::PriceOracle;
use crate::ports::price_series_port::PriceSeriesPort;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Deserialize;
use std::cell::RefCell;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub struct CsvAdapter {
    base_path: PathBuf,
    cache: RefCell<InMemoryPriceStore>,
    loaded: RefCell<HashSet<(String, Resolution)>>,
}

#[derive(Debug, Deserialize)]
struct CsvBar {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self {
            base_path,
            cache: RefCell::new(InMemoryPriceStore::new()),
            loaded: RefCell::new(HashSet::new()),
        }
    }

    fn csv_path(&self, instrument: &str, resolution: Resolution) -> PathBuf {
        self.base_path
            .join(format!("{}_{}.csv", instrument, resolution.as_str()))
    }

    fn ensure_loaded(&self, instrument: &str, resolution: Resolution) -> Result<(), BackledgerError> {
        let key = (instrument.to_string(), resolution);
        if self.loaded.borrow().contains(&key) {
            return Ok(());
        }

        let bars = read_bars_file(&self.csv_path(instrument, resolution), instrument)?;
        debug!(instrument, %resolution, bars = bars.len(), "loaded csv series");
        self.cache.borrow_mut().insert_bars(resolution, bars);
        self.loaded.borrow_mut().insert(key);
        Ok(())
    }
}

/// Parse `YYYY-MM-DD HH:MM:SS`, or a bare date as midnight.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(NaiveTime::MIN))
        })
}

/// Read every bar in a CSV file, sorted by timestamp.
pub fn read_bars_file(path: &Path, instrument: &str) -> Result<Vec<PriceBar>, BackledgerError> {
    let content = fs::read_to_string(path).map_err(|e| BackledgerError::Csv {
        reason: format!("failed to read {}: {}", path.display(), e),
    })?;

    let mut rdr = csv::Reader::from_reader(content.as_bytes());
    let mut bars = Vec::new();

    for result in rdr.deserialize::<CsvBar>() {
        let row = result.map_err(|e| BackledgerError::Csv {
            reason: format!("CSV parse error in {}: {}", path.display(), e),
        })?;
        let timestamp = parse_timestamp(&row.timestamp).ok_or_else(|| BackledgerError::Csv {
            reason: format!("invalid timestamp '{}' in {}", row.timestamp, path.display()),
        })?;

        bars.push(PriceBar {
            instrument: instrument.to_string(),
            timestamp,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
        });
    }

    bars.sort_by_key(|b| b.timestamp);
    Ok(bars)
}

impl PriceSeriesPort for CsvAdapter {
    fn fetch_bars(
        &self,
        instrument: &str,
        resolution: Resolution,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<PriceBar>, BackledgerError> {
        self.ensure_loaded(instrument, resolution)?;
        self.cache
            .borrow()
            .fetch_bars(instrument, resolution, start, end)
    }

    fn list_instruments(&self, resolution: Resolution) -> Result<Vec<String>, BackledgerError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| BackledgerError::Csv {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let suffix = format!("_{}.csv", resolution.as_str());
        let mut instruments = Vec::new();

        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let name_str = name.to_string_lossy();

            if let Some(instrument) = name_str.strip_suffix(&suffix) {
                instruments.push(instrument.to_string());
            }
        }

        instruments.sort();
        Ok(instruments)
    }
}

impl PriceOracle for CsvAdapter {
    fn price_at_or_before(
        &self,
        instrument: &str,
        timestamp: NaiveDateTime,
        resolution: Resolution,
    ) -> Result<f64, LedgerError> {
        let unavailable = || LedgerError::PriceUnavailable {
            instrument: instrument.to_string(),
            timestamp,
            resolution,
        };

        if let Err(e) = self.ensure_loaded(instrument, resolution) {
            warn!(instrument, %resolution, error = %e, "price series unavailable");
            return Err(unavailable());
        }
        let cache = self.cache.borrow();
        close_at_or_before(cache.series(instrument, resolution), timestamp).ok_or_else(unavailable)
    }
}
