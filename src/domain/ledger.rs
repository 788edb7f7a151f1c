//! Portfolio ledger: applies buy/sell/deposit/withdraw actions to an account
//! and keeps the append-only transaction history.
//!
//! Every action is atomic. The resulting state is built on the side, valued
//! against the hourly series, and only then committed together with its
//! record. A rejected action leaves cash, holdings, trade count and history
//! untouched and never reaches the recorder.

use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use super::account::Account;
use super::error::LedgerError;
use super::fee::Fee;
use super::resolution::Resolution;
use super::transaction::{TransactionKind, TransactionRecord, CASH_INSTRUMENT};
use crate::ports::price_oracle::PriceOracle;
use crate::ports::recorder_port::TransactionRecorder;

/// Resolution used to stamp valuations into transaction records.
pub const RECORD_RESOLUTION: Resolution = Resolution::Fine;

/// Parameters for opening a ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerConfig {
    pub account_id: String,
    pub venue: String,
    pub initial_balance: f64,
    /// Seed the account through a recorded deposit instead of setting cash
    /// directly.
    pub record_initial_deposit: bool,
    /// Timestamp of the seed deposit when `record_initial_deposit` is set.
    pub opened_at: NaiveDateTime,
}

/// Account state plus its audit trail.
pub struct Ledger<'a> {
    account: Account,
    transactions: Vec<TransactionRecord>,
    oracle: &'a dyn PriceOracle,
    recorder: Option<&'a dyn TransactionRecorder>,
}

/// A fully validated action waiting to be valued and committed.
struct PendingAction {
    timestamp: NaiveDateTime,
    instrument: String,
    price: f64,
    quantity: f64,
    total_amount: f64,
    fee: Fee,
    kind: TransactionKind,
    cash_balance: f64,
    holdings: BTreeMap<String, f64>,
}

impl<'a> Ledger<'a> {
    pub fn open(config: LedgerConfig, oracle: &'a dyn PriceOracle) -> Result<Self, LedgerError> {
        Self::open_with_recorder(config, oracle, None)
    }

    pub fn open_with_recorder(
        config: LedgerConfig,
        oracle: &'a dyn PriceOracle,
        recorder: Option<&'a dyn TransactionRecorder>,
    ) -> Result<Self, LedgerError> {
        non_negative("initial_balance", config.initial_balance)?;

        let mut ledger = Ledger {
            account: Account::new(config.account_id, config.venue, config.initial_balance),
            transactions: Vec::new(),
            oracle,
            recorder,
        };

        if config.record_initial_deposit {
            ledger.deposit(config.opened_at, config.initial_balance)?;
        } else {
            ledger.account.cash_balance = config.initial_balance;
        }

        debug!(
            account = %ledger.account.account_id,
            venue = %ledger.account.venue,
            initial_balance = config.initial_balance,
            recorded = config.record_initial_deposit,
            "ledger opened"
        );
        Ok(ledger)
    }

    pub fn buy(
        &mut self,
        timestamp: NaiveDateTime,
        instrument: &str,
        price: f64,
        quantity: f64,
        fee: Fee,
    ) -> Result<TransactionRecord, LedgerError> {
        validate_trade(price, quantity, fee)?;

        let gross_cost = fee.gross_cost(price, quantity);
        if self.account.cash_balance < gross_cost {
            debug!(
                %timestamp,
                instrument,
                required = gross_cost,
                available = self.account.cash_balance,
                "buy rejected"
            );
            return Err(LedgerError::InsufficientFunds {
                required: gross_cost,
                available: self.account.cash_balance,
            });
        }

        self.apply(PendingAction {
            timestamp,
            instrument: instrument.to_string(),
            price,
            quantity,
            total_amount: gross_cost,
            fee,
            kind: TransactionKind::Buy,
            cash_balance: self.account.cash_balance - gross_cost,
            holdings: self.account.holdings_after_buy(instrument, quantity),
        })
    }

    pub fn sell(
        &mut self,
        timestamp: NaiveDateTime,
        instrument: &str,
        price: f64,
        quantity: f64,
        fee: Fee,
    ) -> Result<TransactionRecord, LedgerError> {
        validate_trade(price, quantity, fee)?;

        let held = match self.account.holdings.get(instrument) {
            Some(&held) => held,
            None => {
                debug!(%timestamp, instrument, requested = quantity, held = 0.0, "sell rejected");
                return Err(LedgerError::UnknownInstrument {
                    instrument: instrument.to_string(),
                })
            }
        };
        if held < quantity {
            debug!(%timestamp, instrument, requested = quantity, held, "sell rejected");
            return Err(LedgerError::InsufficientHoldings {
                instrument: instrument.to_string(),
                requested: quantity,
                held,
            });
        }

        let net_proceeds = fee.net_proceeds(price, quantity);
        let cash_balance = self.account.cash_balance + net_proceeds;
        // A fixed fee above the notional would otherwise overdraw the account.
        if cash_balance < 0.0 {
            return Err(LedgerError::InsufficientFunds {
                required: -net_proceeds,
                available: self.account.cash_balance,
            });
        }

        self.apply(PendingAction {
            timestamp,
            instrument: instrument.to_string(),
            price,
            quantity,
            total_amount: net_proceeds,
            fee,
            kind: TransactionKind::Sell,
            cash_balance,
            holdings: self.account.holdings_after_sell(instrument, quantity),
        })
    }

    pub fn deposit(
        &mut self,
        timestamp: NaiveDateTime,
        amount: f64,
    ) -> Result<TransactionRecord, LedgerError> {
        non_negative("amount", amount)?;

        self.apply(PendingAction {
            timestamp,
            instrument: CASH_INSTRUMENT.to_string(),
            price: 1.0,
            quantity: amount,
            total_amount: amount,
            fee: Fee::NONE,
            kind: TransactionKind::Deposit,
            cash_balance: self.account.cash_balance + amount,
            holdings: self.account.holdings.clone(),
        })
    }

    pub fn withdraw(
        &mut self,
        timestamp: NaiveDateTime,
        amount: f64,
    ) -> Result<TransactionRecord, LedgerError> {
        non_negative("amount", amount)?;

        if self.account.cash_balance < amount {
            debug!(%timestamp, requested = amount, available = self.account.cash_balance, "withdraw rejected");
            return Err(LedgerError::InsufficientFunds {
                required: amount,
                available: self.account.cash_balance,
            });
        }

        self.apply(PendingAction {
            timestamp,
            instrument: CASH_INSTRUMENT.to_string(),
            price: 1.0,
            quantity: amount,
            total_amount: amount,
            fee: Fee::NONE,
            kind: TransactionKind::Withdraw,
            cash_balance: self.account.cash_balance - amount,
            holdings: self.account.holdings.clone(),
        })
    }

    pub fn holding_quantity(&self, instrument: &str) -> f64 {
        self.account.holding_quantity(instrument)
    }

    /// Sum of `quantity * price` over all holdings. Fails as a whole when any
    /// instrument has no price at or before `timestamp`.
    pub fn asset_valuation(
        &self,
        timestamp: NaiveDateTime,
        resolution: Resolution,
    ) -> Result<f64, LedgerError> {
        self.value_holdings(&self.account.holdings, timestamp, resolution)
    }

    pub fn portfolio_valuation(
        &self,
        timestamp: NaiveDateTime,
        resolution: Resolution,
    ) -> Result<f64, LedgerError> {
        Ok(self.account.cash_balance + self.asset_valuation(timestamp, resolution)?)
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    pub fn account_id(&self) -> &str {
        &self.account.account_id
    }

    pub fn venue(&self) -> &str {
        &self.account.venue
    }

    pub fn cash_balance(&self) -> f64 {
        self.account.cash_balance
    }

    pub fn trade_count(&self) -> u64 {
        self.account.trade_count
    }

    pub fn initial_balance(&self) -> f64 {
        self.account.initial_balance
    }

    pub fn holdings(&self) -> &BTreeMap<String, f64> {
        &self.account.holdings
    }

    pub fn transactions(&self) -> &[TransactionRecord] {
        &self.transactions
    }

    /// Return rate stamped on the latest record, 0.0 before any action.
    pub fn last_return_rate(&self) -> f64 {
        self.transactions
            .last()
            .map(|r| r.return_rate)
            .unwrap_or(0.0)
    }

    fn value_holdings(
        &self,
        holdings: &BTreeMap<String, f64>,
        timestamp: NaiveDateTime,
        resolution: Resolution,
    ) -> Result<f64, LedgerError> {
        holdings
            .iter()
            .map(|(instrument, quantity)| {
                self.oracle
                    .price_at_or_before(instrument, timestamp, resolution)
                    .map(|price| quantity * price)
            })
            .sum()
    }

    fn apply(&mut self, action: PendingAction) -> Result<TransactionRecord, LedgerError> {
        let asset_value = self.value_holdings(&action.holdings, action.timestamp, RECORD_RESOLUTION)?;

        // An account opened with nothing takes its first deposit as baseline.
        let initial_balance = if action.kind == TransactionKind::Deposit
            && self.account.initial_balance == 0.0
            && action.quantity > 0.0
        {
            action.quantity
        } else {
            self.account.initial_balance
        };

        let total_value = action.cash_balance + asset_value;
        let return_rate = if initial_balance > 0.0 {
            total_value / initial_balance - 1.0
        } else {
            0.0
        };

        let record = TransactionRecord {
            timestamp: action.timestamp,
            instrument: action.instrument,
            price: action.price,
            quantity: action.quantity,
            total_amount: action.total_amount,
            fee: action.fee,
            kind: action.kind,
            cash_balance: action.cash_balance,
            asset_value,
            total_value,
            return_rate,
        };

        self.account.cash_balance = action.cash_balance;
        self.account.holdings = action.holdings;
        self.account.initial_balance = initial_balance;
        if action.kind.is_trade() {
            self.account.trade_count += 1;
        }
        self.transactions.push(record.clone());

        debug!(
            account = %self.account.account_id,
            kind = %record.kind,
            instrument = %record.instrument,
            price = record.price,
            quantity = record.quantity,
            total_amount = record.total_amount,
            cash_balance = record.cash_balance,
            return_rate = record.return_rate,
            "transaction committed"
        );

        if let Some(recorder) = self.recorder {
            if let Err(e) = recorder.record(&self.account.account_id, &self.account.venue, &record) {
                warn!(
                    account = %self.account.account_id,
                    kind = %record.kind,
                    timestamp = %record.timestamp,
                    error = %e,
                    "failed to record transaction"
                );
            }
        }

        Ok(record)
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<(), LedgerError> {
    if !value.is_finite() || value < 0.0 {
        return Err(LedgerError::InvalidAmount { field, value });
    }
    Ok(())
}

fn validate_trade(price: f64, quantity: f64, fee: Fee) -> Result<(), LedgerError> {
    non_negative("price", price)?;
    if !quantity.is_finite() || quantity <= 0.0 {
        return Err(LedgerError::InvalidAmount {
            field: "quantity",
            value: quantity,
        });
    }
    fee.validate()
}
