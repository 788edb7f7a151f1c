//! Domain error types.

use chrono::NaiveDateTime;

use super::resolution::Resolution;

/// Rejection reasons for ledger actions and valuations.
///
/// Every variant is recoverable: the ledger never partially applies an
/// action, so the caller may retry, skip, or abort the run.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LedgerError {
    #[error("insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: f64, available: f64 },

    #[error("insufficient holdings of {instrument}: requested {requested}, held {held}")]
    InsufficientHoldings {
        instrument: String,
        requested: f64,
        held: f64,
    },

    #[error("no holdings of {instrument}")]
    UnknownInstrument { instrument: String },

    #[error("invalid {field}: {value}")]
    InvalidAmount { field: &'static str, value: f64 },

    #[error("no {resolution} price for {instrument} at or before {timestamp}")]
    PriceUnavailable {
        instrument: String,
        timestamp: NaiveDateTime,
        resolution: Resolution,
    },
}

/// Top-level error type for backledger.
#[derive(Debug, thiserror::Error)]
pub enum BackledgerError {
    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("no {resolution} data for {instrument}")]
    NoData {
        instrument: String,
        resolution: Resolution,
    },

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("csv error: {reason}")]
    Csv { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&BackledgerError> for std::process::ExitCode {
    fn from(err: &BackledgerError) -> Self {
        let code: u8 = match err {
            BackledgerError::Io(_) | BackledgerError::Csv { .. } => 1,
            BackledgerError::ConfigParse { .. }
            | BackledgerError::ConfigMissing { .. }
            | BackledgerError::ConfigInvalid { .. } => 2,
            BackledgerError::Database { .. } | BackledgerError::DatabaseQuery { .. } => 3,
            BackledgerError::Ledger(_) => 4,
            BackledgerError::NoData { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
