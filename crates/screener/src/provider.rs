//! Provider seams used by the cascade and the lifecycle manager
//!
//! `IndicatorProvider` may fail per ticker (the caller skips that ticker).
//! `FundamentalsProvider` never fails: anything it cannot obtain is `None`.

use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{debug, warn};

use crate::api::YahooClient;
use crate::indicators::{compute_indicator_series, MIN_HISTORY_BARS};
use crate::types::{Fundamentals, IndicatorSeries};

const HISTORY_RANGE: &str = "1y";
const QUOTE_RANGE: &str = "5d";
const DEFAULT_REQUEST_DELAY_MS: u64 = 100;
/// Shown for tickers whose profile has no sector
pub const DEFAULT_SECTOR: &str = "General";

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProviderError {
    #[error("no price history for {0}")]
    NoHistory(String),

    #[error("{ticker} has {bars} daily bars, need {required}")]
    InsufficientHistory {
        ticker: String,
        bars: usize,
        required: usize,
    },

    #[error("fetch failed for {ticker}: {reason}")]
    Fetch { ticker: String, reason: String },
}

#[async_trait]
pub trait IndicatorProvider: Send + Sync {
    /// ~1 year of daily observations with indicators attached
    async fn indicator_series(&self, ticker: &str) -> Result<IndicatorSeries, ProviderError>;

    /// Most recent close, used to value held stocks
    async fn latest_close(&self, ticker: &str) -> Result<Decimal, ProviderError> {
        let series = self.indicator_series(ticker).await?;
        series
            .latest()
            .map(|p| p.close)
            .ok_or_else(|| ProviderError::NoHistory(ticker.to_string()))
    }
}

#[async_trait]
pub trait FundamentalsProvider: Send + Sync {
    async fn fundamentals(&self, ticker: &str) -> Fundamentals;
}

/// Both providers backed by Yahoo Finance, with a small pause between requests
pub struct YahooMarketData {
    client: YahooClient,
    request_delay: Duration,
}

impl Default for YahooMarketData {
    fn default() -> Self {
        Self::new(YahooClient::new())
    }
}

impl YahooMarketData {
    pub fn new(client: YahooClient) -> Self {
        Self {
            client,
            request_delay: Duration::from_millis(DEFAULT_REQUEST_DELAY_MS),
        }
    }

    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    async fn pause(&self) {
        if !self.request_delay.is_zero() {
            tokio::time::sleep(self.request_delay).await;
        }
    }
}

#[async_trait]
impl IndicatorProvider for YahooMarketData {
    async fn indicator_series(&self, ticker: &str) -> Result<IndicatorSeries, ProviderError> {
        let fetched = self.client.get_daily_bars(ticker, HISTORY_RANGE).await;
        self.pause().await;

        let bars = fetched.map_err(|e| ProviderError::Fetch {
            ticker: ticker.to_string(),
            reason: format!("{e:#}"),
        })?;

        if bars.is_empty() {
            return Err(ProviderError::NoHistory(ticker.to_string()));
        }
        if bars.len() < MIN_HISTORY_BARS {
            return Err(ProviderError::InsufficientHistory {
                ticker: ticker.to_string(),
                bars: bars.len(),
                required: MIN_HISTORY_BARS,
            });
        }

        Ok(compute_indicator_series(ticker, &bars))
    }

    async fn latest_close(&self, ticker: &str) -> Result<Decimal, ProviderError> {
        let fetched = self.client.get_daily_bars(ticker, QUOTE_RANGE).await;
        self.pause().await;

        let bars = fetched.map_err(|e| ProviderError::Fetch {
            ticker: ticker.to_string(),
            reason: format!("{e:#}"),
        })?;
        bars.last()
            .map(|b| b.close)
            .ok_or_else(|| ProviderError::NoHistory(ticker.to_string()))
    }
}

#[async_trait]
impl FundamentalsProvider for YahooMarketData {
    async fn fundamentals(&self, ticker: &str) -> Fundamentals {
        let fetched = self.client.get_fundamentals(ticker).await;
        self.pause().await;

        match fetched {
            Ok(mut f) => {
                if f.sector.is_none() {
                    f.sector = Some(DEFAULT_SECTOR.to_string());
                }
                debug!(ticker, pe = ?f.trailing_pe, pb = ?f.price_to_book, "Fundamentals");
                f
            }
            Err(e) => {
                warn!(ticker, error = %format!("{e:#}"), "Fundamentals unavailable, treating as unknown");
                Fundamentals::unknown()
            }
        }
    }
}
