//! RSI mean reversion: buy oversold closes, sell overbought closes.

use tracing::debug;

use super::{all_in_quantity, Driver};
use crate::domain::error::LedgerError;
use crate::domain::fee::Fee;
use crate::domain::indicator::rsi::calculate_rsi;
use crate::domain::ledger::Ledger;
use crate::domain::ohlcv::PriceBar;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RsiReversion {
    pub period: usize,
    pub overbought: f64,
    pub oversold: f64,
}

impl Default for RsiReversion {
    fn default() -> Self {
        RsiReversion {
            period: 14,
            overbought: 70.0,
            oversold: 30.0,
        }
    }
}

impl Driver for RsiReversion {
    fn name(&self) -> &'static str {
        "rsi"
    }

    fn drive(
        &self,
        instrument: &str,
        bars: &[PriceBar],
        fee: Fee,
        ledger: &mut Ledger<'_>,
    ) -> Result<(), LedgerError> {
        let rsi = calculate_rsi(bars, self.period);

        for (i, bar) in bars.iter().enumerate().skip(self.period + 1) {
            let Some(value) = rsi.value_at(i) else {
                continue;
            };

            let held = ledger.holding_quantity(instrument);
            if held > 0.0 && value > self.overbought {
                ledger.sell(bar.timestamp, instrument, bar.close, held, fee)?;
            } else if held == 0.0 && value < self.oversold {
                let quantity = all_in_quantity(ledger.cash_balance(), bar.close, fee);
                if quantity <= 0.0 {
                    debug!(instrument, rsi = value, "oversold but no cash");
                    continue;
                }
                ledger.buy(bar.timestamp, instrument, bar.close, quantity, fee)?;
            }
        }
        Ok(())
    }
}
