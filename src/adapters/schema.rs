//! Table naming shared by the database adapters.

use crate::domain::error::BackledgerError;
use crate::domain::resolution::Resolution;

pub const DEFAULT_VENUE: &str = "upbit";

/// Text form of timestamps in SQLite tables and CSV reports.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Venue names become part of table names, so only `[a-z0-9_]` is allowed.
pub fn validate_venue(venue: &str) -> Result<(), BackledgerError> {
    let valid = !venue.is_empty()
        && venue
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if !valid {
        return Err(BackledgerError::ConfigInvalid {
            section: "backtest".into(),
            key: "venue".into(),
            reason: format!("venue '{}' must match [a-z0-9_]+", venue),
        });
    }
    Ok(())
}

/// `upbit` + `Fine` -> `upbit_1hour_price`.
pub fn price_table(venue: &str, resolution: Resolution) -> String {
    format!("{}_{}_price", venue, resolution.as_str())
}
