//! Strategy drivers: walk a bar series in order and call ledger actions.
//!
//! Drivers own no account state. Everything they know about the position
//! comes from the ledger they are handed.

pub mod buy_and_hold;
pub mod rsi_reversion;
pub mod volatility_breakout;

use crate::domain::error::LedgerError;
use crate::domain::fee::Fee;
use crate::domain::ledger::Ledger;
use crate::domain::ohlcv::PriceBar;

pub use buy_and_hold::BuyAndHold;
pub use rsi_reversion::RsiReversion;
pub use volatility_breakout::VolatilityBreakout;

/// Fraction of affordable quantity actually ordered, leaving headroom for
/// float error in the fee calculation.
pub const SIZING_HAIRCUT: f64 = 0.999;

pub trait Driver {
    fn name(&self) -> &'static str;

    fn drive(
        &self,
        instrument: &str,
        bars: &[PriceBar],
        fee: Fee,
        ledger: &mut Ledger<'_>,
    ) -> Result<(), LedgerError>;
}

/// Quantity that spends (almost) all available cash at `price`.
pub fn all_in_quantity(cash: f64, price: f64, fee: Fee) -> f64 {
    fee.affordable_quantity(cash, price) * SIZING_HAIRCUT
}

#[derive(Debug, Clone, PartialEq)]
pub enum StrategyKind {
    BuyAndHold(BuyAndHold),
    VolatilityBreakout(VolatilityBreakout),
    RsiReversion(RsiReversion),
}

impl StrategyKind {
    pub fn driver(&self) -> &dyn Driver {
        match self {
            StrategyKind::BuyAndHold(d) => d,
            StrategyKind::VolatilityBreakout(d) => d,
            StrategyKind::RsiReversion(d) => d,
        }
    }
}
