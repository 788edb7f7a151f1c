//! Configuration validation.
//!
//! Validates all config fields before any price data is touched.

use crate::domain::error::BackledgerError;
use crate::domain::fee::FeeKind;
use crate::domain::resolution::Resolution;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;

pub const STRATEGY_NAMES: [&str; 3] = ["buy_and_hold", "volatility_breakout", "rsi"];
pub const DATA_SOURCES: [&str; 3] = ["csv", "sqlite", "postgres"];

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), BackledgerError> {
    validate_required(config, "backtest", "id")?;
    validate_required(config, "backtest", "instrument")?;
    validate_initial_balance(config)?;
    validate_dates(config)?;
    validate_resolution(config)?;
    validate_fee(config)?;
    validate_data_source(config)?;
    Ok(())
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), BackledgerError> {
    let name = config.get_string_or("strategy", "name", "buy_and_hold");
    if !STRATEGY_NAMES.contains(&name.as_str()) {
        return Err(invalid(
            "strategy",
            "name",
            format!("unknown strategy '{}', expected one of {}", name, STRATEGY_NAMES.join(", ")),
        ));
    }

    match name.as_str() {
        "volatility_breakout" => {
            let k = config.get_double("strategy", "k", 0.7);
            if !(k > 0.0 && k.is_finite()) {
                return Err(invalid("strategy", "k", "k must be positive".to_string()));
            }
            let offset = config.get_int("strategy", "entry_offset_hours", 6);
            if !(0..24).contains(&offset) {
                return Err(invalid(
                    "strategy",
                    "entry_offset_hours",
                    "entry_offset_hours must be between 0 and 23".to_string(),
                ));
            }
        }
        "rsi" => {
            let period = config.get_int("strategy", "rsi_period", 14);
            if period < 1 {
                return Err(invalid(
                    "strategy",
                    "rsi_period",
                    "rsi_period must be at least 1".to_string(),
                ));
            }
            let overbought = config.get_double("strategy", "overbought", 70.0);
            let oversold = config.get_double("strategy", "oversold", 30.0);
            if !(0.0..=100.0).contains(&overbought) {
                return Err(invalid(
                    "strategy",
                    "overbought",
                    "overbought must be between 0 and 100".to_string(),
                ));
            }
            if !(0.0..=100.0).contains(&oversold) || oversold >= overbought {
                return Err(invalid(
                    "strategy",
                    "oversold",
                    "oversold must be between 0 and overbought".to_string(),
                ));
            }
        }
        _ => {}
    }
    Ok(())
}

fn invalid(section: &str, key: &str, reason: String) -> BackledgerError {
    BackledgerError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason,
    }
}

fn validate_required(config: &dyn ConfigPort, section: &str, key: &str) -> Result<(), BackledgerError> {
    match config.get_string(section, key) {
        Some(s) if !s.trim().is_empty() => Ok(()),
        _ => Err(BackledgerError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }),
    }
}

fn validate_initial_balance(config: &dyn ConfigPort) -> Result<(), BackledgerError> {
    let value = config.get_double("backtest", "initial_balance", 10_000_000.0);
    if !(value > 0.0 && value.is_finite()) {
        return Err(invalid(
            "backtest",
            "initial_balance",
            "initial_balance must be positive".to_string(),
        ));
    }
    Ok(())
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(), BackledgerError> {
    let start_str = config.get_string("backtest", "start_date");
    let end_str = config.get_string("backtest", "end_date");

    let start_date = parse_date(start_str.as_deref(), "start_date")?;
    let end_date = parse_date(end_str.as_deref(), "end_date")?;

    if start_date >= end_date {
        return Err(invalid(
            "backtest",
            "start_date",
            "start_date must be before end_date".to_string(),
        ));
    }
    Ok(())
}

pub fn parse_date(value: Option<&str>, field: &str) -> Result<NaiveDate, BackledgerError> {
    match value {
        None => Err(BackledgerError::ConfigMissing {
            section: "backtest".to_string(),
            key: field.to_string(),
        }),
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| {
            invalid(
                "backtest",
                field,
                format!("invalid {} format, expected YYYY-MM-DD", field),
            )
        }),
    }
}

fn validate_resolution(config: &dyn ConfigPort) -> Result<(), BackledgerError> {
    let value = config.get_string_or("backtest", "resolution", "daily");
    value
        .parse::<Resolution>()
        .map(|_| ())
        .map_err(|reason| invalid("backtest", "resolution", reason))
}

fn validate_fee(config: &dyn ConfigPort) -> Result<(), BackledgerError> {
    let kind = config
        .get_string_or("fee", "type", "percent")
        .parse::<FeeKind>()
        .map_err(|reason| invalid("fee", "type", reason))?;

    let amount = config.get_double("fee", "amount", 0.0005);
    if !(amount >= 0.0 && amount.is_finite()) {
        return Err(invalid("fee", "amount", "amount must be non-negative".to_string()));
    }
    if kind == FeeKind::Percent && amount >= 1.0 {
        return Err(invalid(
            "fee",
            "amount",
            "percent fee must be a fraction below 1".to_string(),
        ));
    }
    Ok(())
}

fn validate_data_source(config: &dyn ConfigPort) -> Result<(), BackledgerError> {
    let source = config.get_string_or("data", "source", "csv");
    if !DATA_SOURCES.contains(&source.as_str()) {
        return Err(invalid(
            "data",
            "source",
            format!("unknown data source '{}', expected one of {}", source, DATA_SOURCES.join(", ")),
        ));
    }
    let path_key = match source.as_str() {
        "csv" => ("csv", "path"),
        "sqlite" => ("sqlite", "path"),
        _ => ("postgres", "connection_string"),
    };
    validate_required(config, path_key.0, path_key.1)
}
