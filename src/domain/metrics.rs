//! Run summary derived from a ledger's transaction history.

use super::ledger::Ledger;
use super::transaction::{TransactionKind, TransactionRecord};

#[derive(Debug, Clone, PartialEq)]
pub struct LedgerSummary {
    pub account_id: String,
    pub initial_balance: f64,
    pub final_cash: f64,
    pub final_total_value: f64,
    pub total_return: f64,
    pub total_fees: f64,
    pub max_drawdown: f64,
    /// Longest run of consecutive records below the running peak.
    pub max_drawdown_duration: usize,
    pub trade_count: u64,
    pub buy_count: usize,
    pub sell_count: usize,
    pub deposit_count: usize,
    pub withdraw_count: usize,
    pub open_positions: usize,
}

impl LedgerSummary {
    pub fn compute(ledger: &Ledger<'_>) -> Self {
        let records = ledger.transactions();

        let final_total_value = records
            .last()
            .map(|r| r.total_value)
            .unwrap_or_else(|| ledger.cash_balance());

        let count = |kind: TransactionKind| records.iter().filter(|r| r.kind == kind).count();
        let (max_drawdown, max_drawdown_duration) = compute_drawdown(records);

        LedgerSummary {
            account_id: ledger.account_id().to_string(),
            initial_balance: ledger.initial_balance(),
            final_cash: ledger.cash_balance(),
            final_total_value,
            total_return: ledger.last_return_rate(),
            total_fees: records.iter().map(TransactionRecord::fee_paid).sum(),
            max_drawdown,
            max_drawdown_duration,
            trade_count: ledger.trade_count(),
            buy_count: count(TransactionKind::Buy),
            sell_count: count(TransactionKind::Sell),
            deposit_count: count(TransactionKind::Deposit),
            withdraw_count: count(TransactionKind::Withdraw),
            open_positions: ledger.holdings().len(),
        }
    }
}

/// Drawdown over trade valuations. Deposits and withdrawals move the peak by
/// their amount instead of counting as gains or losses.
fn compute_drawdown(records: &[TransactionRecord]) -> (f64, usize) {
    let Some(first) = records.first() else {
        return (0.0, 0);
    };

    let mut peak = first.total_value;
    let mut max_dd = 0.0_f64;
    let mut current_duration = 0usize;
    let mut max_duration = 0usize;

    for record in &records[1..] {
        match record.kind {
            TransactionKind::Deposit => {
                peak += record.quantity;
                continue;
            }
            TransactionKind::Withdraw => {
                peak = (peak - record.quantity).max(0.0);
                continue;
            }
            TransactionKind::Buy | TransactionKind::Sell => {}
        }

        if record.total_value >= peak {
            peak = record.total_value;
            current_duration = 0;
        } else if peak > 0.0 {
            let dd = (peak - record.total_value) / peak;
            if dd > max_dd {
                max_dd = dd;
            }
            current_duration += 1;
            if current_duration > max_duration {
                max_duration = current_duration;
            }
        }
    }

    (max_dd, max_duration)
}
