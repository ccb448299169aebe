//! Yahoo Finance public endpoints (no authentication) for daily closes and valuation ratios

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::DateTime;
use reqwest::{Client, StatusCode};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::types::{Fundamentals, PriceBar};

const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";
/// Hands out the session cookie that `getcrumb` requires
const DEFAULT_COOKIE_URL: &str = "https://fc.yahoo.com";
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) bist-lock";
const QUOTE_SUMMARY_MODULES: &str = "summaryDetail,defaultKeyStatistics,assetProfile";

/// Yahoo Finance market data client
///
/// The quote summary endpoint needs a session cookie plus a matching crumb token.
/// The crumb is fetched once, shared by clones, and refreshed when Yahoo rejects it.
#[derive(Clone)]
pub struct YahooClient {
    client: Client,
    base_url: String,
    cookie_url: String,
    crumb: Arc<Mutex<Option<String>>>,
}

// ---------------------------------------------------------------------------
// Chart endpoint: /v8/finance/chart/{symbol}
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartResult>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: Option<ChartMeta>,
    timestamp: Option<Vec<i64>>,
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    gmtoffset: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    quote: Vec<QuoteBlock>,
}

#[derive(Debug, Deserialize)]
struct QuoteBlock {
    close: Option<Vec<Option<f64>>>,
}

// ---------------------------------------------------------------------------
// Quote summary endpoint: /v10/finance/quoteSummary/{symbol}
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct QuoteSummaryResponse {
    #[serde(rename = "quoteSummary")]
    quote_summary: QuoteSummaryBody,
}

#[derive(Debug, Deserialize)]
struct QuoteSummaryBody {
    result: Option<Vec<QuoteSummaryResult>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteSummaryResult {
    summary_detail: Option<SummaryDetail>,
    default_key_statistics: Option<KeyStatistics>,
    asset_profile: Option<AssetProfile>,
}

#[derive(Debug, Deserialize)]
struct SummaryDetail {
    #[serde(rename = "trailingPE")]
    trailing_pe: Option<RawNumber>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeyStatistics {
    price_to_book: Option<RawNumber>,
}

#[derive(Debug, Deserialize)]
struct AssetProfile {
    sector: Option<String>,
}

/// Yahoo wraps numbers as `{ "raw": 12.3, "fmt": "12.30" }`, or `{}` when missing
#[derive(Debug, Deserialize)]
struct RawNumber {
    raw: Option<f64>,
}

impl RawNumber {
    fn decimal(&self) -> Option<Decimal> {
        self.raw
            .filter(|v| v.is_finite())
            .and_then(Decimal::from_f64)
            .map(|d| d.round_dp(4))
    }
}

fn describe(error: &ApiError) -> String {
    format!(
        "{}: {}",
        error.code.as_deref().unwrap_or("error"),
        error.description.as_deref().unwrap_or("no description")
    )
}

/// Decode a chart payload into time-ordered daily bars, dropping null closes
pub(crate) fn parse_chart(body: &str) -> Result<Vec<PriceBar>> {
    let response: ChartResponse = serde_json::from_str(body).context("chart payload")?;
    if let Some(error) = response.chart.error {
        anyhow::bail!("Yahoo chart error {}", describe(&error));
    }

    let Some(result) = response.chart.result.and_then(|r| r.into_iter().next()) else {
        return Ok(Vec::new());
    };

    let offset = result.meta.and_then(|m| m.gmtoffset).unwrap_or(0);
    let timestamps = result.timestamp.unwrap_or_default();
    let closes = result
        .indicators
        .quote
        .into_iter()
        .next()
        .and_then(|q| q.close)
        .unwrap_or_default();

    let mut bars: Vec<PriceBar> = timestamps
        .iter()
        .zip(closes)
        .filter_map(|(&ts, close)| {
            let close = Decimal::from_f64(close.filter(|c| c.is_finite() && *c > 0.0)?)?;
            // Exchange-local calendar date
            let date = DateTime::from_timestamp(ts + offset, 0)?.date_naive();
            Some(PriceBar {
                date,
                close: close.round_dp(4),
            })
        })
        .collect();

    bars.sort_by_key(|b| b.date);
    bars.dedup_by_key(|b| b.date);
    Ok(bars)
}

/// Validate the body of `/v1/test/getcrumb`
pub(crate) fn parse_crumb(body: &str) -> Result<String> {
    let crumb = body.trim();
    // Rate limiting and consent pages come back as HTML or plain sentences
    if crumb.is_empty()
        || crumb.len() > 64
        || crumb.starts_with('<')
        || crumb.contains(char::is_whitespace)
    {
        let preview: String = crumb.chars().take(80).collect();
        anyhow::bail!("Yahoo returned no usable crumb: {:?}", preview);
    }
    Ok(crumb.to_string())
}

/// Yahoo answers a missing or stale crumb with 401 `Invalid Crumb`
pub(crate) fn is_crumb_rejection(status: StatusCode, body: &str) -> bool {
    status == StatusCode::UNAUTHORIZED || body.contains("Invalid Crumb")
}

/// Decode a quote summary payload; absent modules become unknown fields
pub(crate) fn parse_quote_summary(body: &str) -> Result<Fundamentals> {
    let response: QuoteSummaryResponse =
        serde_json::from_str(body).context("quote summary payload")?;
    if let Some(error) = response.quote_summary.error {
        anyhow::bail!("Yahoo quoteSummary error {}", describe(&error));
    }

    let Some(result) = response
        .quote_summary
        .result
        .and_then(|r| r.into_iter().next())
    else {
        return Ok(Fundamentals::unknown());
    };

    Ok(Fundamentals {
        trailing_pe: result
            .summary_detail
            .as_ref()
            .and_then(|s| s.trailing_pe.as_ref())
            .and_then(RawNumber::decimal),
        price_to_book: result
            .default_key_statistics
            .as_ref()
            .and_then(|k| k.price_to_book.as_ref())
            .and_then(RawNumber::decimal),
        sector: result
            .asset_profile
            .and_then(|p| p.sector)
            .filter(|s| !s.trim().is_empty()),
    })
}

impl Default for YahooClient {
    fn default() -> Self {
        Self::new()
    }
}

impl YahooClient {
    /// Create a new client with the default base URL
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .user_agent(USER_AGENT)
                .cookie_store(true)
                .build()
                .unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
            cookie_url: DEFAULT_COOKIE_URL.to_string(),
            crumb: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_cookie_url(mut self, cookie_url: &str) -> Self {
        self.cookie_url = cookie_url.to_string();
        self
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Yahoo API error {}: {}", status, body);
        }

        Ok(response.text().await?)
    }

    /// Cached crumb, or a fresh cookie + crumb handshake
    async fn crumb(&self) -> Result<String> {
        let mut cached = self.crumb.lock().await;
        if let Some(crumb) = cached.as_ref() {
            return Ok(crumb.clone());
        }

        // Only the Set-Cookie matters; the page itself is usually a 404
        if let Err(e) = self.client.get(&self.cookie_url).send().await {
            debug!(error = %e, "Yahoo cookie request failed");
        }

        let url = format!("{}/v1/test/getcrumb", self.base_url);
        let body = self.get_text(&url).await.context("fetching Yahoo crumb")?;
        let crumb = parse_crumb(&body)?;
        debug!("Obtained Yahoo crumb");

        *cached = Some(crumb.clone());
        Ok(crumb)
    }

    async fn reset_crumb(&self) {
        *self.crumb.lock().await = None;
    }

    async fn fetch_quote_summary(&self, symbol: &str) -> Result<(StatusCode, String)> {
        let crumb = self.crumb().await?;
        let url = format!("{}/v10/finance/quoteSummary/{}", self.base_url, symbol);
        let response = self
            .client
            .get(&url)
            .query(&[("modules", QUOTE_SUMMARY_MODULES), ("crumb", crumb.as_str())])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Ok((status, body))
    }

    /// Daily closes for `range` (e.g. `1y`, `5d`)
    pub async fn get_daily_bars(&self, symbol: &str, range: &str) -> Result<Vec<PriceBar>> {
        let url = format!(
            "{}/v8/finance/chart/{}?range={}&interval=1d",
            self.base_url, symbol, range
        );

        debug!(symbol, range, "Fetching daily bars from Yahoo");
        let body = self.get_text(&url).await?;
        let bars = parse_chart(&body).with_context(|| format!("chart for {symbol}"))?;

        debug!(symbol, count = bars.len(), "Fetched daily bars");
        Ok(bars)
    }

    /// Trailing P/E, P/B and sector
    pub async fn get_fundamentals(&self, symbol: &str) -> Result<Fundamentals> {
        debug!(symbol, "Fetching fundamentals from Yahoo");
        let (mut status, mut body) = self.fetch_quote_summary(symbol).await?;

        if is_crumb_rejection(status, &body) {
            warn!(symbol, "Yahoo rejected the crumb, refreshing once");
            self.reset_crumb().await;
            (status, body) = self.fetch_quote_summary(symbol).await?;
        }

        if !status.is_success() {
            anyhow::bail!("Yahoo API error {}: {}", status, body);
        }
        parse_quote_summary(&body).with_context(|| format!("fundamentals for {symbol}"))
    }
}
