//! In-memory fakes for the provider, store and clock seams

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use persistence::{SelectionRecord, SelectionSlot, SelectionStore, StoreResult};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::indicators::{decimal_to_f64, MIN_HISTORY_BARS};
use crate::lifecycle::Clock;
use crate::provider::{FundamentalsProvider, IndicatorProvider, ProviderError};
use crate::types::{Fundamentals, IndicatorPoint, IndicatorSeries};

/// What the latest observation of a synthetic series should look like
#[derive(Debug, Clone)]
pub struct SeriesShape {
    pub rsi: f64,
    pub above_sma: bool,
    pub macd_bullish: bool,
    /// Return over the momentum window
    pub momentum: Decimal,
    pub warmed_up: bool,
}

impl SeriesShape {
    pub fn bullish(rsi: f64, momentum: Decimal) -> Self {
        Self {
            rsi,
            above_sma: true,
            macd_bullish: true,
            momentum,
            warmed_up: true,
        }
    }

    pub fn bearish() -> Self {
        Self {
            rsi: 20.0,
            above_sma: false,
            macd_bullish: false,
            momentum: dec!(-0.1),
            warmed_up: true,
        }
    }

    pub fn warming_up() -> Self {
        Self {
            warmed_up: false,
            ..Self::bullish(60.0, Decimal::ZERO)
        }
    }

    /// Flat closes at 100 with the last close set so that momentum matches
    pub fn build(&self, ticker: &str) -> IndicatorSeries {
        let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let last_close = dec!(100) * (Decimal::ONE + self.momentum);
        let points = (0..MIN_HISTORY_BARS)
            .map(|i| {
                let close = if i + 1 == MIN_HISTORY_BARS { last_close } else { dec!(100) };
                let c = decimal_to_f64(close);
                let (macd, signal) = if self.macd_bullish { (1.0, 0.5) } else { (0.5, 1.0) };
                IndicatorPoint {
                    date: start + chrono::Duration::days(i as i64),
                    close,
                    rsi: self.warmed_up.then_some(self.rsi),
                    macd: Some(macd),
                    macd_signal: Some(signal),
                    sma: self
                        .warmed_up
                        .then_some(if self.above_sma { c * 0.9 } else { c * 1.1 }),
                }
            })
            .collect();

        IndicatorSeries {
            ticker: ticker.to_string(),
            points,
        }
    }
}

pub fn fundamentals(pe: Decimal, pb: Decimal) -> Fundamentals {
    Fundamentals {
        trailing_pe: Some(pe),
        price_to_book: Some(pb),
        sector: None,
    }
}

/// Fixed market data; tickers never added are unavailable
#[derive(Default)]
pub struct StaticMarket {
    series: Mutex<HashMap<String, IndicatorSeries>>,
    fundamentals: Mutex<HashMap<String, Fundamentals>>,
    quotes: Mutex<HashMap<String, Decimal>>,
    series_calls: AtomicUsize,
    fundamentals_calls: AtomicUsize,
    quote_calls: AtomicUsize,
}

impl StaticMarket {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, ticker: &str, shape: SeriesShape, fundamentals: Fundamentals) {
        self.series
            .lock()
            .unwrap()
            .insert(ticker.to_string(), shape.build(ticker));
        self.fundamentals
            .lock()
            .unwrap()
            .insert(ticker.to_string(), fundamentals);
    }

    pub fn set_quote(&self, ticker: &str, price: Decimal) {
        self.quotes.lock().unwrap().insert(ticker.to_string(), price);
    }

    pub fn series_calls(&self) -> usize {
        self.series_calls.load(Ordering::SeqCst)
    }

    pub fn fundamentals_calls(&self) -> usize {
        self.fundamentals_calls.load(Ordering::SeqCst)
    }

    pub fn quote_calls(&self) -> usize {
        self.quote_calls.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.series_calls() + self.fundamentals_calls() + self.quote_calls()
    }
}

#[async_trait]
impl IndicatorProvider for StaticMarket {
    async fn indicator_series(&self, ticker: &str) -> Result<IndicatorSeries, ProviderError> {
        self.series_calls.fetch_add(1, Ordering::SeqCst);
        self.series
            .lock()
            .unwrap()
            .get(ticker)
            .cloned()
            .ok_or_else(|| ProviderError::NoHistory(ticker.to_string()))
    }

    async fn latest_close(&self, ticker: &str) -> Result<Decimal, ProviderError> {
        self.quote_calls.fetch_add(1, Ordering::SeqCst);
        self.quotes
            .lock()
            .unwrap()
            .get(ticker)
            .copied()
            .ok_or_else(|| ProviderError::NoHistory(ticker.to_string()))
    }
}

#[async_trait]
impl FundamentalsProvider for StaticMarket {
    async fn fundamentals(&self, ticker: &str) -> Fundamentals {
        self.fundamentals_calls.fetch_add(1, Ordering::SeqCst);
        self.fundamentals
            .lock()
            .unwrap()
            .get(ticker)
            .cloned()
            .unwrap_or_default()
    }
}

/// Single-slot store kept in memory
#[derive(Default)]
pub struct MemoryStore {
    slot: Mutex<Option<SelectionRecord>>,
    replaces: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(record: SelectionRecord) -> Self {
        Self {
            slot: Mutex::new(Some(record)),
            replaces: AtomicUsize::new(0),
        }
    }

    pub fn replaces(&self) -> usize {
        self.replaces.load(Ordering::SeqCst)
    }

    pub fn stored(&self) -> Option<SelectionRecord> {
        self.slot.lock().unwrap().clone()
    }
}

#[async_trait]
impl SelectionStore for MemoryStore {
    fn describe(&self) -> String {
        "memory".to_string()
    }

    async fn load(&self) -> StoreResult<SelectionSlot> {
        Ok(match self.slot.lock().unwrap().clone() {
            Some(record) => SelectionSlot::Present(record),
            None => SelectionSlot::Empty,
        })
    }

    async fn replace(&self, record: &SelectionRecord) -> StoreResult<()> {
        self.replaces.fetch_add(1, Ordering::SeqCst);
        *self.slot.lock().unwrap() = Some(record.clone());
        Ok(())
    }

    async fn remove(&self) -> StoreResult<()> {
        *self.slot.lock().unwrap() = None;
        Ok(())
    }
}

/// Clock that only moves when told to
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap() = now;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}
