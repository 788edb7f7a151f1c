//! Account state owned by the ledger.

use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    pub account_id: String,
    pub venue: String,
    pub cash_balance: f64,
    pub holdings: BTreeMap<String, f64>,
    pub initial_balance: f64,
    pub trade_count: u64,
}

impl Account {
    pub fn new(account_id: impl Into<String>, venue: impl Into<String>, initial_balance: f64) -> Self {
        Account {
            account_id: account_id.into(),
            venue: venue.into(),
            cash_balance: 0.0,
            holdings: BTreeMap::new(),
            initial_balance,
            trade_count: 0,
        }
    }

    pub fn holding_quantity(&self, instrument: &str) -> f64 {
        self.holdings.get(instrument).copied().unwrap_or(0.0)
    }

    pub fn has_holding(&self, instrument: &str) -> bool {
        self.holdings.contains_key(instrument)
    }

    pub fn holding_count(&self) -> usize {
        self.holdings.len()
    }

    /// Holdings after adding `quantity` of `instrument`.
    pub(crate) fn holdings_after_buy(&self, instrument: &str, quantity: f64) -> BTreeMap<String, f64> {
        let mut holdings = self.holdings.clone();
        *holdings.entry(instrument.to_string()).or_insert(0.0) += quantity;
        holdings
    }

    /// Holdings after removing `quantity` of `instrument`; an entry that
    /// reaches exactly zero is dropped.
    pub(crate) fn holdings_after_sell(&self, instrument: &str, quantity: f64) -> BTreeMap<String, f64> {
        let mut holdings = self.holdings.clone();
        if let Some(held) = holdings.get_mut(instrument) {
            *held -= quantity;
            if *held == 0.0 {
                holdings.remove(instrument);
            }
        }
        holdings
    }
}
