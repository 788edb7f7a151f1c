//! Point-in-time price lookup port.

use crate::domain::error::LedgerError;
use crate::domain::resolution::Resolution;
use chrono::NaiveDateTime;

/// Most recent known close at or before a timestamp.
pub trait PriceOracle {
    /// Fails with [`LedgerError::PriceUnavailable`] when the series has no
    /// point at or before `timestamp`.
    fn price_at_or_before(
        &self,
        instrument: &str,
        timestamp: NaiveDateTime,
        resolution: Resolution,
    ) -> Result<f64, LedgerError>;
}
