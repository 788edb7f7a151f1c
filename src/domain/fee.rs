//! Trading fee model.

use std::fmt;
use std::str::FromStr;

use super::error::LedgerError;

/// Fee charged on a buy or sell.
///
/// `Percentage` holds a fraction of notional (`0.0005` is 5 bps), `Fixed` an
/// absolute surcharge in account currency.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Fee {
    Percentage(f64),
    Fixed(f64),
}

impl Fee {
    /// Fee stamped on deposit and withdraw records.
    pub const NONE: Fee = Fee::Fixed(0.0);

    /// Build a fee from its textual tag (`percent` or `fixed`) and amount.
    pub fn from_parts(kind: &str, amount: f64) -> Result<Self, String> {
        let kind: FeeKind = kind.parse()?;
        Ok(match kind {
            FeeKind::Percent => Fee::Percentage(amount),
            FeeKind::Fixed => Fee::Fixed(amount),
        })
    }

    pub fn kind(&self) -> FeeKind {
        match self {
            Fee::Percentage(_) => FeeKind::Percent,
            Fee::Fixed(_) => FeeKind::Fixed,
        }
    }

    /// The fraction or absolute amount, as configured.
    pub fn amount(&self) -> f64 {
        match *self {
            Fee::Percentage(fraction) => fraction,
            Fee::Fixed(amount) => amount,
        }
    }

    pub fn validate(&self) -> Result<(), LedgerError> {
        let amount = self.amount();
        if !amount.is_finite() || amount < 0.0 {
            return Err(LedgerError::InvalidAmount {
                field: "fee",
                value: amount,
            });
        }
        Ok(())
    }

    /// Cash debited for buying `quantity` at `price`, fee included.
    pub fn gross_cost(&self, price: f64, quantity: f64) -> f64 {
        match *self {
            Fee::Percentage(fraction) => price * quantity * (1.0 + fraction),
            Fee::Fixed(amount) => price * quantity + amount,
        }
    }

    /// Cash credited for selling `quantity` at `price`, fee deducted.
    pub fn net_proceeds(&self, price: f64, quantity: f64) -> f64 {
        match *self {
            Fee::Percentage(fraction) => price * quantity * (1.0 - fraction),
            Fee::Fixed(amount) => price * quantity - amount,
        }
    }

    /// Largest quantity whose gross cost at `price` fits in `cash`.
    pub fn affordable_quantity(&self, cash: f64, price: f64) -> f64 {
        if price <= 0.0 {
            return 0.0;
        }
        match *self {
            Fee::Percentage(fraction) => cash / (price * (1.0 + fraction)),
            Fee::Fixed(amount) => ((cash - amount) / price).max(0.0),
        }
    }
}

/// Textual fee tag as stored in config and transaction tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeKind {
    Percent,
    Fixed,
}

impl FeeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeeKind::Percent => "percent",
            FeeKind::Fixed => "fixed",
        }
    }
}

impl fmt::Display for FeeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "percent" | "percentage" => Ok(FeeKind::Percent),
            "fixed" => Ok(FeeKind::Fixed),
            other => Err(format!("unknown fee type '{other}' (expected percent or fixed)")),
        }
    }
}
