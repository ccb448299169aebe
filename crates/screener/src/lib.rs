//! BIST screener: adaptive filter cascade and the 30-day locked portfolio
//!
//! Provides:
//! - Yahoo Finance client for daily closes and valuation ratios
//! - RSI / MACD / SMA indicator series
//! - Tiered filter cascade with quorum and momentum fallback
//! - Portfolio lifecycle manager over an injected selection store

pub mod api;
pub mod cascade;
pub mod indicators;
pub mod lifecycle;
pub mod provider;
pub mod types;
pub mod universe;

#[cfg(test)]
mod testing;

// Re-exports for convenience
pub use api::YahooClient;
pub use cascade::{
    forced_selection, validate_tiers, CascadeEngine, CascadeOutcome, ScanProgress, ScanSnapshot,
    ScanStatus, ScreenError, SkipReason, TickerOutcome,
};
pub use indicators::compute_indicator_series;
pub use lifecycle::{
    exchange_date, unrealized_return_pct, Clock, HoldingPerformance, LifecycleError,
    LifecycleState, LockState, PortfolioManager, PortfolioStatus, PortfolioSummary, SystemClock,
};
pub use provider::{FundamentalsProvider, IndicatorProvider, ProviderError, YahooMarketData};
pub use types::{
    default_tiers, Candidate, FilterTier, FundamentalGate, Fundamentals, IndicatorPoint,
    IndicatorSeries, PriceBar, FORCED_LABEL, HOLDING_PERIOD_DAYS, NOTIONAL_PER_TICKER, QUORUM,
};
pub use universe::{default_universe, load_universe_file, normalize_universe, parse_universe};
