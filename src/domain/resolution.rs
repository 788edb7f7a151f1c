//! Price series resolution.

use std::fmt;
use std::str::FromStr;

/// Granularity of a historical price series.
///
/// `Coarse` is the daily series, `Fine` the hourly one. Ledger actions always
/// value holdings against `Fine`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resolution {
    Coarse,
    Fine,
}

impl Resolution {
    /// Name used in config files, CSV file names and price table names.
    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::Coarse => "daily",
            Resolution::Fine => "1hour",
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "daily" | "coarse" | "1day" => Ok(Resolution::Coarse),
            "1hour" | "hourly" | "fine" => Ok(Resolution::Fine),
            other => Err(format!("unknown resolution '{other}' (expected daily or 1hour)")),
        }
    }
}
