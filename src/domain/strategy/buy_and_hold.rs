//! Buy at the first open, sell everything at the last close.

use tracing::debug;

use super::{all_in_quantity, Driver};
use crate::domain::error::LedgerError;
use crate::domain::fee::Fee;
use crate::domain::ledger::Ledger;
use crate::domain::ohlcv::PriceBar;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BuyAndHold;

impl Driver for BuyAndHold {
    fn name(&self) -> &'static str {
        "buy_and_hold"
    }

    fn drive(
        &self,
        instrument: &str,
        bars: &[PriceBar],
        fee: Fee,
        ledger: &mut Ledger<'_>,
    ) -> Result<(), LedgerError> {
        let (Some(first), Some(last)) = (bars.first(), bars.last()) else {
            return Ok(());
        };

        let quantity = all_in_quantity(ledger.cash_balance(), first.open, fee);
        if quantity <= 0.0 {
            debug!(instrument, cash = ledger.cash_balance(), "nothing to buy");
            return Ok(());
        }
        ledger.buy(first.timestamp, instrument, first.open, quantity, fee)?;

        let held = ledger.holding_quantity(instrument);
        ledger.sell(last.timestamp, instrument, last.close, held, fee)?;
        Ok(())
    }
}
