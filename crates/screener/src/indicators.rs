//! Indicator computation for daily price series
//!
//! Runs RSI(14), MACD(12, 26, 9) and SMA(50) bar-by-bar over a close series.
//! Values are reported as `None` until each indicator has seen enough bars,
//! so callers can tell a warmed-up reading from a seed value.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use ta::indicators::{MovingAverageConvergenceDivergence, RelativeStrengthIndex, SimpleMovingAverage};
use ta::Next;

use crate::types::{IndicatorPoint, IndicatorSeries, PriceBar};

pub const RSI_PERIOD: usize = 14;
pub const MACD_FAST: usize = 12;
pub const MACD_SLOW: usize = 26;
pub const MACD_SIGNAL: usize = 9;
pub const TREND_SMA_PERIOD: usize = 50;
/// Shorter histories are reported as unavailable by providers
pub const MIN_HISTORY_BARS: usize = 60;

pub(crate) fn decimal_to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

/// Annotate a time-ordered bar series with RSI, MACD/signal and the trend SMA
pub fn compute_indicator_series(ticker: &str, bars: &[PriceBar]) -> IndicatorSeries {
    let mut rsi = RelativeStrengthIndex::new(RSI_PERIOD).expect("Invalid RSI period");
    let mut macd = MovingAverageConvergenceDivergence::new(MACD_FAST, MACD_SLOW, MACD_SIGNAL)
        .expect("Invalid MACD params");
    let mut sma = SimpleMovingAverage::new(TREND_SMA_PERIOD).expect("Invalid SMA period");

    let points = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            let close = decimal_to_f64(bar.close);
            let rsi_val = rsi.next(close);
            let macd_out = macd.next(close);
            let sma_val = sma.next(close);
            let seen = i + 1;

            IndicatorPoint {
                date: bar.date,
                close: bar.close,
                // RSI needs `period` price changes, i.e. period + 1 closes
                rsi: if seen > RSI_PERIOD { finite(rsi_val) } else { None },
                macd: if seen >= MACD_SLOW { finite(macd_out.macd) } else { None },
                macd_signal: if seen >= MACD_SLOW + MACD_SIGNAL - 1 {
                    finite(macd_out.signal)
                } else {
                    None
                },
                sma: if seen >= TREND_SMA_PERIOD { finite(sma_val) } else { None },
            }
        })
        .collect();

    IndicatorSeries {
        ticker: ticker.to_string(),
        points,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn make_bars(prices: &[f64]) -> Vec<PriceBar> {
        let start = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        prices
            .iter()
            .enumerate()
            .map(|(i, &p)| PriceBar {
                date: start + chrono::Duration::days(i as i64),
                close: Decimal::from_str_exact(&format!("{:.2}", p)).unwrap(),
            })
            .collect()
    }

    #[test]
    fn test_warmup_is_undefined() {
        let bars = make_bars(&vec![100.0; 30]);
        let series = compute_indicator_series("AKBNK.IS", &bars);

        assert_eq!(series.len(), 30);
        assert!(series.points[RSI_PERIOD - 1].rsi.is_none());
        assert!(series.points[RSI_PERIOD].rsi.is_some());
        assert!(series.points[MACD_SLOW - 2].macd.is_none());
        assert!(series.points[MACD_SLOW - 1].macd.is_some());
        let last = series.latest().unwrap();
        assert!(last.sma.is_none(), "30 bars cannot define SMA 50");
    }

    #[test]
    fn test_uptrend_reads_bullish() {
        let prices: Vec<f64> = (0..80).map(|i| 100.0 * 1.01f64.powi(i)).collect();
        let series = compute_indicator_series("EREGL.IS", &make_bars(&prices));
        let last = series.latest().unwrap();

        let close = decimal_to_f64(last.close);
        assert!(last.rsi.unwrap() > 70.0);
        assert!(close > last.sma.unwrap());
        assert!(last.macd.unwrap() > last.macd_signal.unwrap());
    }

    #[test]
    fn test_downtrend_reads_bearish() {
        // Accelerating decline: a constant-rate fall lets MACD climb back above its signal
        let prices: Vec<f64> = (0..80).map(|i| 200.0 - 0.02 * (i * i) as f64).collect();
        let series = compute_indicator_series("PETKM.IS", &make_bars(&prices));
        let last = series.latest().unwrap();

        assert!(last.rsi.unwrap() < 30.0);
        assert!(decimal_to_f64(last.close) < last.sma.unwrap());
        assert!(last.macd.unwrap() < last.macd_signal.unwrap());
    }

    #[test]
    fn test_dates_and_closes_carried_over() {
        let bars = make_bars(&[10.0, 11.0, 12.5]);
        let series = compute_indicator_series("SOKM.IS", &bars);
        assert_eq!(series.ticker, "SOKM.IS");
        assert_eq!(series.points[2].close, bars[2].close);
        assert_eq!(series.points[2].date, bars[2].date);
    }
}
