//! RSI (Relative Strength Index) over closing prices.
//!
//! Average gain and loss are plain rolling means over the last `period`
//! close-to-close changes (no Wilder smoothing).
//!
//! Formula: RSI = 100 - (100 / (1 + avg_gain / avg_loss))
//! If avg_loss == 0 and avg_gain > 0: RSI = 100
//! If both are 0 the point is invalid (flat window).
//!
//! Warmup: first `period` bars are invalid.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries};
use crate::domain::ohlcv::PriceBar;

pub fn calculate_rsi(bars: &[PriceBar], period: usize) -> IndicatorSeries {
    let mut values = Vec::with_capacity(bars.len());

    for (i, bar) in bars.iter().enumerate() {
        let point = if period == 0 || i < period {
            None
        } else {
            rsi_at(bars, i, period)
        };

        values.push(IndicatorPoint {
            timestamp: bar.timestamp,
            valid: point.is_some(),
            value: point.unwrap_or(0.0),
        });
    }

    IndicatorSeries { period, values }
}

/// RSI over the `period` changes ending at bar `end`.
fn rsi_at(bars: &[PriceBar], end: usize, period: usize) -> Option<f64> {
    let mut gain_sum = 0.0;
    let mut loss_sum = 0.0;

    for j in (end + 1 - period)..=end {
        let change = bars[j].close - bars[j - 1].close;
        if change > 0.0 {
            gain_sum += change;
        } else {
            loss_sum -= change;
        }
    }

    let avg_gain = gain_sum / period as f64;
    let avg_loss = loss_sum / period as f64;

    if avg_loss == 0.0 {
        if avg_gain == 0.0 {
            return None;
        }
        return Some(100.0);
    }
    Some(100.0 - (100.0 / (1.0 + avg_gain / avg_loss)))
}
