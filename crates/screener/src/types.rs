//! Types shared by the providers, the filter cascade and the portfolio lifecycle

use chrono::NaiveDate;
use persistence::StockRecord;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Stocks per selection
pub const QUORUM: usize = 5;
/// Days a selection stays locked after its start date
pub const HOLDING_PERIOD_DAYS: i64 = 30;
/// Borsa Istanbul runs on Turkey time, UTC+3 all year (no DST)
pub const EXCHANGE_UTC_OFFSET_HOURS: i64 = 3;
/// Notional invested per held ticker when valuing the portfolio
pub const NOTIONAL_PER_TICKER: Decimal = dec!(1000);
/// Observations spanned by the momentum return
pub const MOMENTUM_WINDOW: usize = 30;
/// `tier_used` when no tier reached quorum and the momentum fallback picked the stocks
pub const FORCED_LABEL: &str = "Forced selection (out of filter)";

/// A single daily close
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub close: Decimal,
}

/// One observation with its indicator values. `None` means the indicator
/// has not warmed up yet at this point of the series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorPoint {
    pub date: NaiveDate,
    pub close: Decimal,
    pub rsi: Option<f64>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    /// Trend moving average (SMA 50)
    pub sma: Option<f64>,
}

/// Time-ordered indicator series for one ticker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorSeries {
    pub ticker: String,
    pub points: Vec<IndicatorPoint>,
}

impl IndicatorSeries {
    pub fn latest(&self) -> Option<&IndicatorPoint> {
        self.points.last()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Latest close over the close `MOMENTUM_WINDOW` observations back
    /// (inclusive of the latest), minus one. Zero for shorter series.
    pub fn momentum(&self) -> Decimal {
        let n = self.points.len();
        if n < MOMENTUM_WINDOW {
            return Decimal::ZERO;
        }
        let base = self.points[n - MOMENTUM_WINDOW].close;
        let last = self.points[n - 1].close;
        if base.is_zero() {
            return Decimal::ZERO;
        }
        last / base - Decimal::ONE
    }
}

/// Valuation ratios. Any field the source could not provide is `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fundamentals {
    pub trailing_pe: Option<Decimal>,
    pub price_to_book: Option<Decimal>,
    pub sector: Option<String>,
}

impl Fundamentals {
    pub fn unknown() -> Self {
        Self::default()
    }
}

/// Valuation part of a filter tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum FundamentalGate {
    /// Require 0 < P/E < max_pe and P/B < max_pb. Unknown ratios fail.
    Check { max_pe: Decimal, max_pb: Decimal },
    /// Valuation is not looked at
    Disabled,
}

/// One rung of the cascade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterTier {
    pub label: String,
    /// RSI must be strictly above this
    pub min_rsi: f64,
    pub fundamentals: FundamentalGate,
}

impl FilterTier {
    pub fn new(label: &str, min_rsi: f64, max_pe: Decimal, max_pb: Decimal) -> Self {
        Self {
            label: label.to_string(),
            min_rsi,
            fundamentals: FundamentalGate::Check { max_pe, max_pb },
        }
    }

    pub fn momentum_only(label: &str, min_rsi: f64) -> Self {
        Self {
            label: label.to_string(),
            min_rsi,
            fundamentals: FundamentalGate::Disabled,
        }
    }

    pub fn checks_fundamentals(&self) -> bool {
        matches!(self.fundamentals, FundamentalGate::Check { .. })
    }

    pub fn passes_fundamentals(&self, fundamentals: &Fundamentals) -> bool {
        match (
            &self.fundamentals,
            fundamentals.trailing_pe,
            fundamentals.price_to_book,
        ) {
            (FundamentalGate::Disabled, _, _) => true,
            (FundamentalGate::Check { max_pe, max_pb }, Some(pe), Some(pb)) => {
                pe > Decimal::ZERO && pe < *max_pe && pb < *max_pb
            }
            _ => false,
        }
    }
}

/// Strict → permissive ladder; the last rung ignores valuation entirely
pub fn default_tiers() -> Vec<FilterTier> {
    vec![
        FilterTier::new("Ideal (strict)", 50.0, dec!(25), dec!(5)),
        FilterTier::new("Moderate", 45.0, dec!(50), dec!(10)),
        FilterTier::new("Flexible", 40.0, dec!(100), dec!(15)),
        FilterTier::momentum_only("Forced (momentum only)", 30.0),
    ]
}

/// A ticker accepted by a tier during one cascade run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub ticker: String,
    /// Latest close
    pub price: Decimal,
    pub rsi: Decimal,
    pub pe_ratio: Option<Decimal>,
    pub pb_ratio: Option<Decimal>,
    pub momentum: Decimal,
    pub tier_label: String,
    pub sector: Option<String>,
}

impl Candidate {
    pub fn to_record(&self) -> StockRecord {
        StockRecord {
            ticker: self.ticker.clone(),
            price: self.price,
            rsi: self.rsi,
            pe_ratio: self.pe_ratio,
            pb_ratio: self.pb_ratio,
            momentum: self.momentum,
            tier_label: self.tier_label.clone(),
            sector: self.sector.clone(),
        }
    }
}
