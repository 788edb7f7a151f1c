//! In-memory price store.
//!
//! Holds sorted bar series per instrument and resolution. Backs the CSV
//! adapter's cache and serves as a self-contained oracle for drivers fed
//! from already loaded data.

use crate::domain::error::{BackledgerError, LedgerError};
use crate::domain::ohlcv::PriceBar;
use crate::domain::resolution::Resolution;
use crate::ports::price_oracle::PriceOracle;
use crate::ports::price_series_port::PriceSeriesPort;
use chrono::NaiveDateTime;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct InMemoryPriceStore {
    series: HashMap<(String, Resolution), Vec<PriceBar>>,
}

impl InMemoryPriceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bars(mut self, resolution: Resolution, bars: Vec<PriceBar>) -> Self {
        self.insert_bars(resolution, bars);
        self
    }

    /// Merge bars into the series of each bar's instrument, keeping them
    /// ordered by timestamp.
    pub fn insert_bars(&mut self, resolution: Resolution, bars: Vec<PriceBar>) {
        for bar in bars {
            self.series
                .entry((bar.instrument.clone(), resolution))
                .or_default()
                .push(bar);
        }
        for series in self.series.values_mut() {
            series.sort_by_key(|b| b.timestamp);
        }
    }

    pub fn series(&self, instrument: &str, resolution: Resolution) -> &[PriceBar] {
        self.series
            .get(&(instrument.to_string(), resolution))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Close of the last bar at or before `timestamp` in a sorted series.
pub(crate) fn close_at_or_before(bars: &[PriceBar], timestamp: NaiveDateTime) -> Option<f64> {
    let idx = bars.partition_point(|b| b.timestamp <= timestamp);
    if idx == 0 {
        None
    } else {
        Some(bars[idx - 1].close)
    }
}

impl PriceOracle for InMemoryPriceStore {
    fn price_at_or_before(
        &self,
        instrument: &str,
        timestamp: NaiveDateTime,
        resolution: Resolution,
    ) -> Result<f64, LedgerError> {
        close_at_or_before(self.series(instrument, resolution), timestamp).ok_or_else(|| {
            LedgerError::PriceUnavailable {
                instrument: instrument.to_string(),
                timestamp,
                resolution,
            }
        })
    }
}

impl PriceSeriesPort for InMemoryPriceStore {
    fn fetch_bars(
        &self,
        instrument: &str,
        resolution: Resolution,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<PriceBar>, BackledgerError> {
        Ok(self
            .series(instrument, resolution)
            .iter()
            .filter(|b| b.timestamp >= start && b.timestamp <= end)
            .cloned()
            .collect())
    }

    fn list_instruments(&self, resolution: Resolution) -> Result<Vec<String>, BackledgerError> {
        let mut instruments: Vec<String> = self
            .series
            .keys()
            .filter(|(_, r)| *r == resolution)
            .map(|(i, _)| i.clone())
            .collect();
        instruments.sort();
        Ok(instruments)
    }
}
