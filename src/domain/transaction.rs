//! Immutable transaction records produced by the ledger.

use chrono::NaiveDateTime;
use std::fmt;
use std::str::FromStr;

use super::fee::Fee;

/// Instrument label stamped on deposit and withdraw records.
pub const CASH_INSTRUMENT: &str = "CASH";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionKind {
    Buy,
    Sell,
    Deposit,
    Withdraw,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Buy => "Buy",
            TransactionKind::Sell => "Sell",
            TransactionKind::Deposit => "Deposit",
            TransactionKind::Withdraw => "Withdraw",
        }
    }

    /// Buy and sell count as trades; cash movements do not.
    pub fn is_trade(&self) -> bool {
        matches!(self, TransactionKind::Buy | TransactionKind::Sell)
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Buy" => Ok(TransactionKind::Buy),
            "Sell" => Ok(TransactionKind::Sell),
            "Deposit" => Ok(TransactionKind::Deposit),
            "Withdraw" => Ok(TransactionKind::Withdraw),
            other => Err(format!("unknown transaction type '{other}'")),
        }
    }
}

/// One committed ledger action with the account state it left behind.
///
/// `total_amount` is the gross cost of a buy, the net proceeds of a sell, or
/// the moved amount of a deposit/withdraw. `asset_value`, `total_value` and
/// `return_rate` are valued against the hourly series at `timestamp`.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionRecord {
    pub timestamp: NaiveDateTime,
    pub instrument: String,
    pub price: f64,
    pub quantity: f64,
    pub total_amount: f64,
    pub fee: Fee,
    pub kind: TransactionKind,
    pub cash_balance: f64,
    pub asset_value: f64,
    pub total_value: f64,
    pub return_rate: f64,
}

impl TransactionRecord {
    pub fn notional(&self) -> f64 {
        self.price * self.quantity
    }

    /// Currency charged as fee on this action.
    pub fn fee_paid(&self) -> f64 {
        match self.kind {
            TransactionKind::Buy => self.total_amount - self.notional(),
            TransactionKind::Sell => self.notional() - self.total_amount,
            TransactionKind::Deposit | TransactionKind::Withdraw => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use chrono::NaiveDate;

    fn sample_record(kind: TransactionKind, total_amount: f64) -> TransactionRecord {
        TransactionRecord {
            timestamp: NaiveDate::from_ymd_opt(2024, 3, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            instrument: "KRW-BTC".into(),
            price: 10_000_000.0,
            quantity: 0.0001,
            total_amount,
            fee: Fee::Percentage(0.005),
            kind,
            cash_balance: 0.0,
            asset_value: 0.0,
            total_value: 0.0,
            return_rate: 0.0,
        }
    }

    #[test]
    fn buy_fee_paid_is_surcharge() {
        let record = sample_record(TransactionKind::Buy, 1005.0);
        assert_abs_diff_eq!(record.fee_paid(), 5.0, epsilon = 1e-9);
    }

    #[test]
    fn sell_fee_paid_is_deduction() {
        let record = sample_record(TransactionKind::Sell, 995.0);
        assert_abs_diff_eq!(record.fee_paid(), 5.0, epsilon = 1e-9);
    }

    #[test]
    fn cash_movements_pay_no_fee() {
        let record = sample_record(TransactionKind::Deposit, 1000.0);
        assert_abs_diff_eq!(record.fee_paid(), 0.0);
    }

    #[test]
    fn kind_parse_and_display() {
        for kind in [
            TransactionKind::Buy,
            TransactionKind::Sell,
            TransactionKind::Deposit,
            TransactionKind::Withdraw,
        ] {
            assert_eq!(kind.to_string().parse::<TransactionKind>(), Ok(kind));
        }
        assert!("Transfer".parse::<TransactionKind>().is_err());
    }

    #[test]
    fn only_buy_and_sell_are_trades() {
        assert!(TransactionKind::Buy.is_trade());
        assert!(TransactionKind::Sell.is_trade());
        assert!(!TransactionKind::Deposit.is_trade());
        assert!(!TransactionKind::Withdraw.is_trade());
    }
}
