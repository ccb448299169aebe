//! Portfolio lifecycle
//!
//! Owns the single persisted selection. Its state is derived on every read
//! from the stored record and the clock:
//!
//! ```text
//! Empty ──request──▶ Locked ──30 days──▶ Expired ──request──▶ Locked
//!                                          │
//! Corrupt ──delete──▶ Empty ◀──delete──────┘
//! ```

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use persistence::{SelectionRecord, SelectionSlot, SelectionStore, StockRecord, StoreError};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::cascade::{CascadeEngine, ScanProgress, ScreenError};
use crate::provider::{FundamentalsProvider, IndicatorProvider};
use crate::types::{
    default_tiers, FilterTier, EXCHANGE_UTC_OFFSET_HOURS, HOLDING_PERIOD_DAYS, NOTIONAL_PER_TICKER,
    QUORUM,
};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Calendar date in Istanbul at `now`. Selections are stamped with it.
pub fn exchange_date(now: DateTime<Utc>) -> NaiveDate {
    (now + Duration::hours(EXCHANGE_UTC_OFFSET_HOURS)).date_naive()
}

/// Lock window derived from a start date; the selection is locked on `[start, start + 30d)`
/// where `start` is midnight of `start_date` in Istanbul.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LockState {
    pub locked: bool,
    pub days_remaining: i64,
    pub unlock_date: NaiveDate,
}

impl LockState {
    pub fn evaluate(start_date: NaiveDate, now: DateTime<Utc>) -> Self {
        let start = start_date.and_time(NaiveTime::MIN).and_utc()
            - Duration::hours(EXCHANGE_UTC_OFFSET_HOURS);
        let holding = Duration::days(HOLDING_PERIOD_DAYS);
        let elapsed_days = (now - start).num_days();

        Self {
            locked: now < start + holding,
            days_remaining: (HOLDING_PERIOD_DAYS - elapsed_days).max(0),
            unlock_date: start_date + holding,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleState {
    Empty,
    Locked {
        record: SelectionRecord,
        lock: LockState,
    },
    Expired {
        record: SelectionRecord,
        lock: LockState,
    },
    Corrupt {
        reason: String,
    },
}

/// Live valuation of one held stock
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HoldingPerformance {
    pub ticker: String,
    pub sector: Option<String>,
    pub tier_label: String,
    pub entry_price: Decimal,
    pub current_price: Decimal,
    /// Unrealized return in percent, 2 decimals
    pub profit_pct: Decimal,
    /// False when the current price could not be fetched and the entry price stands in
    pub quote_available: bool,
}

/// Totals on a fixed notional per holding
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioSummary {
    pub total_invested: Decimal,
    pub current_value: Decimal,
    pub total_profit: Decimal,
    pub total_profit_pct: Decimal,
}

impl PortfolioSummary {
    pub fn from_holdings(holdings: &[HoldingPerformance]) -> Self {
        let total_invested = NOTIONAL_PER_TICKER * Decimal::from(holdings.len());
        let current_value: Decimal = holdings
            .iter()
            .map(|h| {
                if h.entry_price > Decimal::ZERO {
                    NOTIONAL_PER_TICKER * h.current_price / h.entry_price
                } else {
                    NOTIONAL_PER_TICKER
                }
            })
            .sum();
        let current_value = current_value.round_dp(2);
        let total_profit = current_value - total_invested;
        let total_profit_pct = if total_invested.is_zero() {
            Decimal::ZERO
        } else {
            (total_profit / total_invested * Decimal::ONE_HUNDRED).round_dp(2)
        };

        Self {
            total_invested,
            current_value,
            total_profit,
            total_profit_pct,
        }
    }
}

/// What `view_status` reports
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PortfolioStatus {
    Empty,
    Locked {
        selection: SelectionRecord,
        lock: LockState,
        holdings: Vec<HoldingPerformance>,
        summary: PortfolioSummary,
    },
    Expired {
        selection: SelectionRecord,
        lock: LockState,
    },
    Corrupt {
        reason: String,
    },
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("selection is locked for {days_remaining} more days (unlocks {unlock_date})")]
    Locked {
        days_remaining: i64,
        unlock_date: NaiveDate,
    },

    #[error("stored selection is unreadable ({reason}); delete it first")]
    CorruptState { reason: String },

    #[error("no selection to delete")]
    NothingToDelete,

    #[error(transparent)]
    Screen(#[from] ScreenError),

    #[error("selection store failed: {0}")]
    Store(#[from] StoreError),
}

/// `(current - entry) / entry * 100`, 2 decimals. Zero for a non-positive entry.
pub fn unrealized_return_pct(entry: Decimal, current: Decimal) -> Decimal {
    if entry <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    ((current - entry) / entry * Decimal::ONE_HUNDRED).round_dp(2)
}

pub struct PortfolioManager {
    store: Arc<dyn SelectionStore>,
    indicators: Arc<dyn IndicatorProvider>,
    engine: CascadeEngine,
    universe: Vec<String>,
    tiers: Vec<FilterTier>,
    quorum: usize,
    clock: Arc<dyn Clock>,
}

impl PortfolioManager {
    pub fn new(
        store: Arc<dyn SelectionStore>,
        indicators: Arc<dyn IndicatorProvider>,
        fundamentals: Arc<dyn FundamentalsProvider>,
        universe: Vec<String>,
    ) -> Self {
        Self {
            store,
            engine: CascadeEngine::new(indicators.clone(), fundamentals),
            indicators,
            universe,
            tiers: default_tiers(),
            quorum: QUORUM,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_tiers(mut self, tiers: Vec<FilterTier>) -> Self {
        self.tiers = tiers;
        self
    }

    pub fn with_progress(mut self, progress: Arc<ScanProgress>) -> Self {
        self.engine = self.engine.with_progress(progress);
        self
    }

    pub fn tiers(&self) -> &[FilterTier] {
        &self.tiers
    }

    pub fn universe(&self) -> &[String] {
        &self.universe
    }

    pub fn store_description(&self) -> String {
        self.store.describe()
    }

    pub async fn current_state(&self) -> Result<LifecycleState, LifecycleError> {
        let state = match self.store.load().await? {
            SelectionSlot::Empty => LifecycleState::Empty,
            SelectionSlot::Corrupt { reason } => LifecycleState::Corrupt { reason },
            SelectionSlot::Present(record) => {
                let lock = LockState::evaluate(record.start_date, self.clock.now());
                if lock.locked {
                    LifecycleState::Locked { record, lock }
                } else {
                    LifecycleState::Expired { record, lock }
                }
            }
        };
        Ok(state)
    }

    /// Read-only: while locked, only current prices are fetched
    pub async fn view_status(&self) -> Result<PortfolioStatus, LifecycleError> {
        let status = match self.current_state().await? {
            LifecycleState::Empty => PortfolioStatus::Empty,
            LifecycleState::Corrupt { reason } => PortfolioStatus::Corrupt { reason },
            LifecycleState::Expired { record, lock } => PortfolioStatus::Expired {
                selection: record,
                lock,
            },
            LifecycleState::Locked { record, lock } => {
                let mut holdings = Vec::with_capacity(record.stocks.len());
                for stock in &record.stocks {
                    holdings.push(self.value_holding(stock).await);
                }
                let summary = PortfolioSummary::from_holdings(&holdings);
                PortfolioStatus::Locked {
                    selection: record,
                    lock,
                    holdings,
                    summary,
                }
            }
        };
        Ok(status)
    }

    async fn value_holding(&self, stock: &StockRecord) -> HoldingPerformance {
        let (current_price, quote_available) = match self.indicators.latest_close(&stock.ticker).await {
            Ok(price) => (price, true),
            Err(e) => {
                warn!(ticker = %stock.ticker, error = %e, "No current quote, using entry price");
                (stock.price, false)
            }
        };

        HoldingPerformance {
            ticker: stock.ticker.clone(),
            sector: stock.sector.clone(),
            tier_label: stock.tier_label.clone(),
            entry_price: stock.price,
            current_price,
            profit_pct: unrealized_return_pct(stock.price, current_price),
            quote_available,
        }
    }

    /// Run the cascade and persist its result, stamped with today's date.
    /// Rejected before any provider call unless the state is Empty or Expired.
    pub async fn request_new_selection(&self) -> Result<SelectionRecord, LifecycleError> {
        match self.current_state().await? {
            LifecycleState::Locked { lock, .. } => {
                return Err(LifecycleError::Locked {
                    days_remaining: lock.days_remaining,
                    unlock_date: lock.unlock_date,
                })
            }
            LifecycleState::Corrupt { reason } => return Err(LifecycleError::CorruptState { reason }),
            LifecycleState::Empty | LifecycleState::Expired { .. } => {}
        }

        let outcome = self
            .engine
            .run_cascade(&self.universe, &self.tiers, self.quorum)
            .await?;

        let record = SelectionRecord {
            start_date: exchange_date(self.clock.now()),
            stocks: outcome.candidates.iter().map(|c| c.to_record()).collect(),
            filter_used: outcome.tier_used,
        };
        self.store.replace(&record).await?;

        info!(
            start_date = %record.start_date,
            filter = %record.filter_used,
            forced = outcome.forced,
            stocks = record.stocks.len(),
            store = %self.store.describe(),
            "New selection locked"
        );
        Ok(record)
    }

    /// Allowed once the lock has expired, or to clear an unreadable record
    pub async fn delete_selection(&self) -> Result<(), LifecycleError> {
        match self.current_state().await? {
            LifecycleState::Empty => Err(LifecycleError::NothingToDelete),
            LifecycleState::Locked { lock, .. } => Err(LifecycleError::Locked {
                days_remaining: lock.days_remaining,
                unlock_date: lock.unlock_date,
            }),
            LifecycleState::Expired { .. } | LifecycleState::Corrupt { .. } => {
                self.store.remove().await?;
                info!(store = %self.store.describe(), "Selection deleted");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fundamentals, ManualClock, MemoryStore, SeriesShape, StaticMarket};
    use chrono::TimeZone;
    use persistence::JsonFileStore;
    use rust_decimal_macros::dec;

    const NAMES: [&str; 5] = ["A.IS", "B.IS", "C.IS", "D.IS", "E.IS"];

    fn universe() -> Vec<String> {
        NAMES.iter().map(|s| s.to_string()).collect()
    }

    fn bullish_market() -> Arc<StaticMarket> {
        let market = StaticMarket::new();
        for name in NAMES {
            market.add(name, SeriesShape::bullish(60.0, dec!(0.05)), fundamentals(dec!(10), dec!(2)));
        }
        Arc::new(market)
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn stock(ticker: &str, price: Decimal) -> StockRecord {
        StockRecord {
            ticker: ticker.to_string(),
            price,
            rsi: dec!(55),
            pe_ratio: Some(dec!(10)),
            pb_ratio: Some(dec!(2)),
            momentum: dec!(0.04),
            tier_label: "Ideal (strict)".to_string(),
            sector: None,
        }
    }

    fn record(start_date: NaiveDate, stocks: Vec<StockRecord>) -> SelectionRecord {
        SelectionRecord {
            start_date,
            stocks,
            filter_used: "Ideal (strict)".to_string(),
        }
    }

    fn manager(
        store: Arc<dyn SelectionStore>,
        market: &Arc<StaticMarket>,
        now: DateTime<Utc>,
    ) -> PortfolioManager {
        PortfolioManager::new(store, market.clone(), market.clone(), universe())
            .with_clock(Arc::new(ManualClock::at(now)))
    }

    #[test]
    fn test_lock_boundary() {
        // Istanbul midnight of 2026-03-02 is 2026-03-01 21:00 UTC
        let start = date(2026, 3, 2);

        let before = LockState::evaluate(start, at(2026, 3, 31, 20, 59));
        assert!(before.locked);
        assert_eq!(before.days_remaining, 1);

        let after = LockState::evaluate(start, at(2026, 3, 31, 21, 0));
        assert!(!after.locked);
        assert_eq!(after.days_remaining, 0);
        assert_eq!(after.unlock_date, date(2026, 4, 1));

        let first_day = LockState::evaluate(start, at(2026, 3, 1, 21, 0));
        assert!(first_day.locked);
        assert_eq!(first_day.days_remaining, 30);

        let long_after = LockState::evaluate(start, at(2026, 9, 1, 12, 0));
        assert_eq!(long_after.days_remaining, 0);
    }

    #[test]
    fn test_exchange_date_uses_istanbul_time() {
        assert_eq!(exchange_date(at(2026, 10, 16, 20, 59)), date(2026, 10, 16));
        assert_eq!(exchange_date(at(2026, 10, 16, 21, 0)), date(2026, 10, 17));
    }

    #[tokio::test]
    async fn test_lock_expires_as_clock_advances() {
        let market = bullish_market();
        let store = Arc::new(MemoryStore::new());
        // 01:30 on the 17th in Istanbul
        let clock = Arc::new(ManualClock::at(at(2026, 10, 16, 22, 30)));
        let m = PortfolioManager::new(store.clone(), market.clone(), market.clone(), universe())
            .with_clock(clock.clone());

        let selection = m.request_new_selection().await.unwrap();
        assert_eq!(selection.start_date, date(2026, 10, 17));
        match m.current_state().await.unwrap() {
            LifecycleState::Locked { lock, .. } => {
                assert_eq!(lock.days_remaining, 30);
                assert_eq!(lock.unlock_date, date(2026, 11, 16));
            }
            other => panic!("expected Locked, got {other:?}"),
        }

        clock.set(at(2026, 11, 15, 20, 59));
        assert!(matches!(
            m.current_state().await.unwrap(),
            LifecycleState::Locked { lock: LockState { days_remaining: 1, .. }, .. }
        ));
        assert!(matches!(
            m.request_new_selection().await,
            Err(LifecycleError::Locked { .. })
        ));

        clock.set(at(2026, 11, 15, 21, 0));
        assert!(matches!(m.current_state().await.unwrap(), LifecycleState::Expired { .. }));
        let next = m.request_new_selection().await.unwrap();
        assert_eq!(next.start_date, date(2026, 11, 16));
        assert_eq!(store.replaces(), 2);
    }

    #[test]
    fn test_unrealized_return() {
        assert_eq!(unrealized_return_pct(dec!(100), dec!(110)), dec!(10.00));
        assert_eq!(unrealized_return_pct(dec!(300), dec!(290)), dec!(-3.33));
        assert_eq!(unrealized_return_pct(dec!(0), dec!(5)), Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_request_from_empty_locks_selection() {
        let market = bullish_market();
        let store = Arc::new(MemoryStore::new());
        let m = manager(store.clone(), &market, at(2026, 10, 16, 10, 30));

        let selection = m.request_new_selection().await.unwrap();
        assert_eq!(selection.start_date, date(2026, 10, 16));
        assert_eq!(selection.stocks.len(), 5);
        assert_eq!(selection.filter_used, "Ideal (strict)");
        assert_eq!(store.stored(), Some(selection));

        match m.current_state().await.unwrap() {
            LifecycleState::Locked { lock, .. } => {
                assert_eq!(lock.days_remaining, 30);
                assert_eq!(lock.unlock_date, date(2026, 11, 15));
            }
            other => panic!("expected Locked, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_request_while_locked_makes_no_calls() {
        let market = bullish_market();
        let existing = record(date(2026, 10, 13), vec![stock("A.IS", dec!(10))]);
        let store = Arc::new(MemoryStore::with_record(existing.clone()));
        let m = manager(store.clone(), &market, at(2026, 10, 16, 9, 0));

        let err = m.request_new_selection().await.unwrap_err();
        assert!(matches!(err, LifecycleError::Locked { days_remaining: 27, .. }));
        assert_eq!(market.total_calls(), 0);
        assert_eq!(store.replaces(), 0);
        assert_eq!(store.stored(), Some(existing));
    }

    #[tokio::test]
    async fn test_request_after_expiry_replaces_selection() {
        let market = bullish_market();
        let old = record(date(2026, 9, 1), vec![stock("Z.IS", dec!(10))]);
        let store = Arc::new(MemoryStore::with_record(old));
        let m = manager(store.clone(), &market, at(2026, 10, 16, 9, 0));

        assert!(matches!(m.current_state().await.unwrap(), LifecycleState::Expired { .. }));
        let selection = m.request_new_selection().await.unwrap();
        assert_eq!(selection.start_date, date(2026, 10, 16));
        assert_eq!(store.stored().unwrap().stocks[0].ticker, "A.IS");
    }

    #[tokio::test]
    async fn test_failed_cascade_keeps_prior_state() {
        let market = StaticMarket::new();
        for name in NAMES {
            market.add(name, SeriesShape::bearish(), fundamentals(dec!(10), dec!(2)));
        }
        let market = Arc::new(market);

        let store = Arc::new(MemoryStore::new());
        let m = manager(store.clone(), &market, at(2026, 10, 16, 9, 0));
        let err = m.request_new_selection().await.unwrap_err();
        assert!(matches!(err, LifecycleError::Screen(ScreenError::EmptyUniverseResult)));
        assert_eq!(store.stored(), None);
        assert_eq!(store.replaces(), 0);

        let old = record(date(2026, 9, 1), vec![stock("Z.IS", dec!(10))]);
        let store = Arc::new(MemoryStore::with_record(old.clone()));
        let m = manager(store.clone(), &market, at(2026, 10, 16, 9, 0));
        assert!(m.request_new_selection().await.is_err());
        assert_eq!(store.stored(), Some(old));
    }

    #[tokio::test]
    async fn test_small_universe_fails_without_calls() {
        let market = bullish_market();
        let store = Arc::new(MemoryStore::new());
        let m = PortfolioManager::new(
            store.clone(),
            market.clone(),
            market.clone(),
            vec!["A.IS".to_string()],
        );

        let err = m.request_new_selection().await.unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::Screen(ScreenError::UniverseTooSmall { size: 1, quorum: 5 })
        ));
        assert_eq!(market.total_calls(), 0);
        assert_eq!(store.stored(), None);
    }

    #[tokio::test]
    async fn test_view_status_values_holdings() {
        let market = Arc::new(StaticMarket::new());
        market.set_quote("A.IS", dec!(110));
        market.set_quote("B.IS", dec!(45));
        let store = Arc::new(MemoryStore::with_record(record(
            date(2026, 10, 10),
            vec![stock("A.IS", dec!(100)), stock("B.IS", dec!(50))],
        )));
        let m = manager(store.clone(), &market, at(2026, 10, 16, 9, 0));

        let PortfolioStatus::Locked { holdings, summary, lock, .. } = m.view_status().await.unwrap()
        else {
            panic!("expected Locked");
        };
        assert_eq!(lock.days_remaining, 24);
        assert_eq!(holdings[0].profit_pct, dec!(10.00));
        assert_eq!(holdings[1].profit_pct, dec!(-10.00));
        assert!(holdings.iter().all(|h| h.quote_available));
        assert_eq!(summary.total_invested, dec!(2000));
        assert_eq!(summary.current_value, dec!(2000));
        assert_eq!(summary.total_profit, Decimal::ZERO);
        // valuation reads quotes only
        assert_eq!(market.series_calls(), 0);
        assert_eq!(market.fundamentals_calls(), 0);
    }

    #[tokio::test]
    async fn test_view_status_is_idempotent() {
        let market = Arc::new(StaticMarket::new());
        market.set_quote("A.IS", dec!(12.5));
        let stored = record(date(2026, 10, 1), vec![stock("A.IS", dec!(10))]);
        let store = Arc::new(MemoryStore::with_record(stored.clone()));
        let m = manager(store.clone(), &market, at(2026, 10, 16, 9, 0));

        let first = serde_json::to_value(m.view_status().await.unwrap()).unwrap();
        let second = serde_json::to_value(m.view_status().await.unwrap()).unwrap();
        assert_eq!(first, second);
        assert_eq!(first["state"], "locked");
        assert_eq!(store.stored(), Some(stored));
        assert_eq!(store.replaces(), 0);
    }

    #[tokio::test]
    async fn test_missing_quote_falls_back_to_entry() {
        let market = Arc::new(StaticMarket::new());
        let store = Arc::new(MemoryStore::with_record(record(
            date(2026, 10, 10),
            vec![stock("A.IS", dec!(100))],
        )));
        let m = manager(store, &market, at(2026, 10, 16, 9, 0));

        let PortfolioStatus::Locked { holdings, .. } = m.view_status().await.unwrap() else {
            panic!("expected Locked");
        };
        assert_eq!(holdings[0].current_price, dec!(100));
        assert_eq!(holdings[0].profit_pct, Decimal::ZERO);
        assert!(!holdings[0].quote_available);
    }

    #[tokio::test]
    async fn test_expired_status_has_no_valuation() {
        let market = Arc::new(StaticMarket::new());
        let store = Arc::new(MemoryStore::with_record(record(
            date(2026, 9, 1),
            vec![stock("A.IS", dec!(100))],
        )));
        let m = manager(store, &market, at(2026, 10, 16, 9, 0));

        assert!(matches!(
            m.view_status().await.unwrap(),
            PortfolioStatus::Expired { lock: LockState { locked: false, days_remaining: 0, .. }, .. }
        ));
        assert_eq!(market.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_delete_rules() {
        let market = Arc::new(StaticMarket::new());

        let m = manager(Arc::new(MemoryStore::new()), &market, at(2026, 10, 16, 9, 0));
        assert!(matches!(m.delete_selection().await, Err(LifecycleError::NothingToDelete)));

        let locked = Arc::new(MemoryStore::with_record(record(
            date(2026, 10, 15),
            vec![stock("A.IS", dec!(100))],
        )));
        let m = manager(locked.clone(), &market, at(2026, 10, 16, 9, 0));
        assert!(matches!(m.delete_selection().await, Err(LifecycleError::Locked { .. })));
        assert!(locked.stored().is_some());

        let expired = Arc::new(MemoryStore::with_record(record(
            date(2026, 9, 15),
            vec![stock("A.IS", dec!(100))],
        )));
        let m = manager(expired.clone(), &market, at(2026, 10, 16, 9, 0));
        m.delete_selection().await.unwrap();
        assert_eq!(expired.stored(), None);
        assert_eq!(m.current_state().await.unwrap(), LifecycleState::Empty);
    }

    #[tokio::test]
    async fn test_corrupt_file_blocks_request_but_allows_delete() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("portfolio.json");
        std::fs::write(&path, br#"{"start_date":"16/10/2026","stocks":[],"filter_used":"x"}"#)
            .unwrap();

        let market = bullish_market();
        let store: Arc<dyn SelectionStore> = Arc::new(JsonFileStore::new(&path));
        let m = manager(store, &market, at(2026, 10, 16, 9, 0));

        assert!(matches!(m.view_status().await.unwrap(), PortfolioStatus::Corrupt { .. }));
        assert!(matches!(
            m.request_new_selection().await,
            Err(LifecycleError::CorruptState { .. })
        ));
        assert_eq!(market.total_calls(), 0);

        m.delete_selection().await.unwrap();
        assert!(!path.exists());
        assert_eq!(m.current_state().await.unwrap(), LifecycleState::Empty);

        let selection = m.request_new_selection().await.unwrap();
        let on_disk: SelectionRecord =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(on_disk, selection);
    }
}
