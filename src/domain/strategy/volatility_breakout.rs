//! Volatility breakout.
//!
//! Each bar's breakout target is `open + (prev_high - prev_low) * k`. An open
//! position is closed at the next bar's open; when the bar's high crosses the
//! target, a new position is opened at the target, stamped
//! `entry_offset_hours` after the bar starts.

use chrono::Duration;
use tracing::debug;

use super::{all_in_quantity, Driver};
use crate::domain::error::LedgerError;
use crate::domain::fee::Fee;
use crate::domain::ledger::Ledger;
use crate::domain::ohlcv::PriceBar;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolatilityBreakout {
    pub k: f64,
    pub entry_offset_hours: i64,
}

impl Default for VolatilityBreakout {
    fn default() -> Self {
        VolatilityBreakout {
            k: 0.7,
            entry_offset_hours: 6,
        }
    }
}

impl VolatilityBreakout {
    pub fn target_price(&self, bar: &PriceBar, prev: &PriceBar) -> f64 {
        bar.open + prev.range() * self.k
    }
}

impl Driver for VolatilityBreakout {
    fn name(&self) -> &'static str {
        "volatility_breakout"
    }

    fn drive(
        &self,
        instrument: &str,
        bars: &[PriceBar],
        fee: Fee,
        ledger: &mut Ledger<'_>,
    ) -> Result<(), LedgerError> {
        for window in bars.windows(2) {
            let (prev, bar) = (&window[0], &window[1]);
            let target = self.target_price(bar, prev);

            let held = ledger.holding_quantity(instrument);
            if held > 0.0 {
                ledger.sell(bar.timestamp, instrument, bar.open, held, fee)?;
            }

            if bar.high > target {
                let quantity = all_in_quantity(ledger.cash_balance(), target, fee);
                if quantity <= 0.0 {
                    debug!(instrument, target, "breakout skipped, no cash");
                    continue;
                }
                let entry_time = bar.timestamp + Duration::hours(self.entry_offset_hours);
                ledger.buy(entry_time, instrument, target, quantity, fee)?;
            }
        }
        Ok(())
    }
}
