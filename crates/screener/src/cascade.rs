//! Adaptive filter cascade
//!
//! Scans the universe tier by tier, strict → permissive, and stops at the first
//! tier that accepts at least `quorum` tickers. When no tier gets there, every
//! candidate collected along the way is ranked by momentum and the best
//! `quorum` are returned under [`FORCED_LABEL`].

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::indicators::decimal_to_f64;
use crate::provider::{FundamentalsProvider, IndicatorProvider};
use crate::types::{Candidate, FilterTier, FundamentalGate, FORCED_LABEL};

#[derive(Debug, Error, PartialEq)]
pub enum ScreenError {
    #[error("no ticker qualified under any tier and the fallback pool is empty")]
    EmptyUniverseResult,

    #[error("universe has {size} tickers, fewer than the quorum of {quorum}")]
    UniverseTooSmall { size: usize, quorum: usize },

    #[error("quorum must be at least 1")]
    InvalidQuorum,

    #[error("invalid filter tiers: {0}")]
    InvalidTiers(String),
}

/// Why a ticker was left out of a tier without being judged
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The indicator provider had nothing usable
    Unavailable(String),
    /// Latest RSI or trend SMA has not warmed up
    IndicatorsUndefined,
}

/// Result of judging one ticker against one tier
#[derive(Debug, Clone, PartialEq)]
pub enum TickerOutcome {
    Accepted(Candidate),
    Rejected,
    Skipped(SkipReason),
}

/// What a successful cascade run produced
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CascadeOutcome {
    pub candidates: Vec<Candidate>,
    /// Label of the tier that reached quorum, or [`FORCED_LABEL`]
    pub tier_used: String,
    pub forced: bool,
}

/// Tiers must go strict → permissive: RSI floor strictly falling, valuation
/// ceilings never tightening, and only the last tier may skip valuation.
pub fn validate_tiers(tiers: &[FilterTier]) -> Result<(), ScreenError> {
    if tiers.is_empty() {
        return Err(ScreenError::InvalidTiers("no tiers".to_string()));
    }

    let last = tiers.len() - 1;
    for (i, tier) in tiers.iter().enumerate() {
        if !tier.min_rsi.is_finite() {
            return Err(ScreenError::InvalidTiers(format!(
                "{}: RSI floor is not a number",
                tier.label
            )));
        }
        if matches!(tier.fundamentals, FundamentalGate::Disabled) && i != last {
            return Err(ScreenError::InvalidTiers(format!(
                "{}: only the final tier may disable fundamentals",
                tier.label
            )));
        }
    }

    for pair in tiers.windows(2) {
        let (stricter, looser) = (&pair[0], &pair[1]);
        if looser.min_rsi >= stricter.min_rsi {
            return Err(ScreenError::InvalidTiers(format!(
                "{} must have a lower RSI floor than {}",
                looser.label, stricter.label
            )));
        }
        if let (
            FundamentalGate::Check { max_pe: pe_a, max_pb: pb_a },
            FundamentalGate::Check { max_pe: pe_b, max_pb: pb_b },
        ) = (&stricter.fundamentals, &looser.fundamentals)
        {
            if pe_b < pe_a || pb_b < pb_a {
                return Err(ScreenError::InvalidTiers(format!(
                    "{} tightens valuation limits of {}",
                    looser.label, stricter.label
                )));
            }
        }
    }

    Ok(())
}

/// Fallback: dedupe by ticker (first, strictest occurrence wins), stable sort
/// by momentum descending, keep the best `quorum`.
pub fn forced_selection(pool: Vec<Candidate>, quorum: usize) -> Result<CascadeOutcome, ScreenError> {
    let mut seen = HashSet::new();
    let mut ranked: Vec<Candidate> = pool
        .into_iter()
        .filter(|c| seen.insert(c.ticker.clone()))
        .collect();

    if ranked.is_empty() {
        return Err(ScreenError::EmptyUniverseResult);
    }

    ranked.sort_by(|a, b| b.momentum.cmp(&a.momentum));
    ranked.truncate(quorum);

    Ok(CascadeOutcome {
        candidates: ranked,
        tier_used: FORCED_LABEL.to_string(),
        forced: true,
    })
}

// ============================================================================
// Progress
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    Idle,
    Running,
    Completed,
    Failed,
}

/// Point-in-time copy of [`ScanProgress`] for display
#[derive(Debug, Clone, Serialize)]
pub struct ScanSnapshot {
    pub status: ScanStatus,
    pub current_tier: Option<String>,
    pub tier_index: usize,
    pub tier_count: usize,
    pub scanned: usize,
    pub total: usize,
    pub message: Option<String>,
}

/// Shared progress of the running scan, polled by the operator surface
pub struct ScanProgress {
    status: RwLock<ScanStatus>,
    current_tier: RwLock<Option<String>>,
    message: RwLock<Option<String>>,
    tier_index: AtomicUsize,
    tier_count: AtomicUsize,
    scanned: AtomicUsize,
    total: AtomicUsize,
}

impl Default for ScanProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanProgress {
    pub fn new() -> Self {
        Self {
            status: RwLock::new(ScanStatus::Idle),
            current_tier: RwLock::new(None),
            message: RwLock::new(None),
            tier_index: AtomicUsize::new(0),
            tier_count: AtomicUsize::new(0),
            scanned: AtomicUsize::new(0),
            total: AtomicUsize::new(0),
        }
    }

    /// Claim the scanner. Returns false if a scan is already running.
    pub fn try_start(&self) -> bool {
        let mut status = self.status.write().unwrap_or_else(PoisonError::into_inner);
        if *status == ScanStatus::Running {
            return false;
        }
        *status = ScanStatus::Running;
        drop(status);
        self.set_message(None);
        *self.current_tier.write().unwrap_or_else(PoisonError::into_inner) = None;
        self.tier_index.store(0, Ordering::Relaxed);
        self.scanned.store(0, Ordering::Relaxed);
        true
    }

    pub fn is_running(&self) -> bool {
        *self.status.read().unwrap_or_else(PoisonError::into_inner) == ScanStatus::Running
    }

    fn begin(&self, total: usize, tier_count: usize) {
        *self.status.write().unwrap_or_else(PoisonError::into_inner) = ScanStatus::Running;
        self.total.store(total, Ordering::Relaxed);
        self.tier_count.store(tier_count, Ordering::Relaxed);
        self.scanned.store(0, Ordering::Relaxed);
    }

    fn enter_tier(&self, index: usize, label: &str) {
        self.tier_index.store(index, Ordering::Relaxed);
        self.scanned.store(0, Ordering::Relaxed);
        *self.current_tier.write().unwrap_or_else(PoisonError::into_inner) =
            Some(label.to_string());
        self.set_message(Some(format!("Scanning tier: {label}")));
    }

    fn ticker_done(&self) {
        self.scanned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn complete(&self, message: String) {
        *self.status.write().unwrap_or_else(PoisonError::into_inner) = ScanStatus::Completed;
        self.set_message(Some(message));
    }

    pub fn fail(&self, message: String) {
        *self.status.write().unwrap_or_else(PoisonError::into_inner) = ScanStatus::Failed;
        self.set_message(Some(message));
    }

    fn set_message(&self, message: Option<String>) {
        *self.message.write().unwrap_or_else(PoisonError::into_inner) = message;
    }

    pub fn snapshot(&self) -> ScanSnapshot {
        ScanSnapshot {
            status: *self.status.read().unwrap_or_else(PoisonError::into_inner),
            current_tier: self
                .current_tier
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
            tier_index: self.tier_index.load(Ordering::Relaxed),
            tier_count: self.tier_count.load(Ordering::Relaxed),
            scanned: self.scanned.load(Ordering::Relaxed),
            total: self.total.load(Ordering::Relaxed),
            message: self
                .message
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
        }
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Runs the cascade against injected providers
pub struct CascadeEngine {
    indicators: Arc<dyn IndicatorProvider>,
    fundamentals: Arc<dyn FundamentalsProvider>,
    progress: Option<Arc<ScanProgress>>,
}

impl CascadeEngine {
    pub fn new(
        indicators: Arc<dyn IndicatorProvider>,
        fundamentals: Arc<dyn FundamentalsProvider>,
    ) -> Self {
        Self {
            indicators,
            fundamentals,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: Arc<ScanProgress>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Judge one ticker against one tier using its latest observation
    pub async fn evaluate_ticker(&self, ticker: &str, tier: &FilterTier) -> TickerOutcome {
        let series = match self.indicators.indicator_series(ticker).await {
            Ok(series) => series,
            Err(e) => return TickerOutcome::Skipped(SkipReason::Unavailable(e.to_string())),
        };

        let Some(last) = series.latest() else {
            return TickerOutcome::Skipped(SkipReason::Unavailable("empty series".to_string()));
        };
        let (Some(rsi), Some(sma)) = (last.rsi, last.sma) else {
            return TickerOutcome::Skipped(SkipReason::IndicatorsUndefined);
        };

        let rsi_ok = rsi > tier.min_rsi;
        let trend_ok = decimal_to_f64(last.close) > sma;
        // An undefined MACD never confirms
        let macd_ok = matches!((last.macd, last.macd_signal), (Some(m), Some(s)) if m > s);
        if !(rsi_ok && trend_ok && macd_ok) {
            return TickerOutcome::Rejected;
        }

        let fundamentals = if tier.checks_fundamentals() {
            let f = self.fundamentals.fundamentals(ticker).await;
            if !tier.passes_fundamentals(&f) {
                return TickerOutcome::Rejected;
            }
            Some(f)
        } else {
            None
        };

        let (pe_ratio, pb_ratio, sector) = match fundamentals {
            Some(f) => (f.trailing_pe, f.price_to_book, f.sector),
            None => (None, None, None),
        };

        TickerOutcome::Accepted(Candidate {
            ticker: ticker.to_string(),
            price: last.close,
            rsi: Decimal::from_f64(rsi).unwrap_or_default().round_dp(2),
            pe_ratio,
            pb_ratio,
            momentum: series.momentum().round_dp(6),
            tier_label: tier.label.clone(),
            sector,
        })
    }

    pub async fn run_cascade(
        &self,
        universe: &[String],
        tiers: &[FilterTier],
        quorum: usize,
    ) -> Result<CascadeOutcome, ScreenError> {
        let result = self.scan(universe, tiers, quorum).await;

        if let Some(progress) = &self.progress {
            match &result {
                Ok(outcome) => progress.complete(format!(
                    "Selected {} stocks ({})",
                    outcome.candidates.len(),
                    outcome.tier_used
                )),
                Err(e) => progress.fail(e.to_string()),
            }
        }
        result
    }

    async fn scan(
        &self,
        universe: &[String],
        tiers: &[FilterTier],
        quorum: usize,
    ) -> Result<CascadeOutcome, ScreenError> {
        if quorum == 0 {
            return Err(ScreenError::InvalidQuorum);
        }
        validate_tiers(tiers)?;
        if universe.len() < quorum {
            return Err(ScreenError::UniverseTooSmall {
                size: universe.len(),
                quorum,
            });
        }

        if let Some(progress) = &self.progress {
            progress.begin(universe.len(), tiers.len());
        }
        info!(
            tickers = universe.len(),
            tiers = tiers.len(),
            quorum,
            "Starting filter cascade"
        );

        let mut pool: Vec<Candidate> = Vec::new();

        for (index, tier) in tiers.iter().enumerate() {
            if let Some(progress) = &self.progress {
                progress.enter_tier(index, &tier.label);
            }

            let mut accepted: Vec<Candidate> = Vec::new();
            let mut skipped = 0usize;

            for ticker in universe {
                match self.evaluate_ticker(ticker, tier).await {
                    TickerOutcome::Accepted(candidate) => {
                        debug!(
                            ticker = %candidate.ticker,
                            tier = %tier.label,
                            rsi = %candidate.rsi,
                            momentum = %candidate.momentum,
                            "Accepted"
                        );
                        accepted.push(candidate);
                    }
                    TickerOutcome::Rejected => {}
                    TickerOutcome::Skipped(reason) => {
                        skipped += 1;
                        debug!(ticker = %ticker, ?reason, "Skipped");
                    }
                }

                if let Some(progress) = &self.progress {
                    progress.ticker_done();
                }
                if accepted.len() >= quorum {
                    break;
                }
            }

            info!(
                tier = %tier.label,
                accepted = accepted.len(),
                skipped,
                "Tier scanned"
            );

            if accepted.len() >= quorum {
                info!(tier = %tier.label, "Quorum reached");
                return Ok(CascadeOutcome {
                    candidates: accepted,
                    tier_used: tier.label.clone(),
                    forced: false,
                });
            }
            pool.extend(accepted);
        }

        warn!(
            pool = pool.len(),
            "No tier reached quorum, falling back to momentum ranking"
        );
        forced_selection(pool, quorum)
    }
}
