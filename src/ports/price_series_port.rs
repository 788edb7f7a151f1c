//! Historical price series port consumed by strategy drivers.

use crate::domain::error::BackledgerError;
use crate::domain::ohlcv::PriceBar;
use crate::domain::resolution::Resolution;
use chrono::NaiveDateTime;

pub trait PriceSeriesPort {
    /// Bars with `start <= timestamp <= end`, oldest first.
    fn fetch_bars(
        &self,
        instrument: &str,
        resolution: Resolution,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<PriceBar>, BackledgerError>;

    fn list_instruments(&self, resolution: Resolution) -> Result<Vec<String>, BackledgerError>;
}
