//! SQLite store: the selection lives in the single `active_selection` row

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::SqlitePool;
use tracing::{info, warn};

use super::SelectionStore;
use crate::record::{SelectionRecord, SelectionSlot, StockRecord};
use crate::StoreResult;

pub struct SqliteSelectionStore {
    pool: SqlitePool,
}

impl SqliteSelectionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn decode_row(start_date: &str, filter_used: String, stocks_json: &str) -> SelectionSlot {
    let start_date = match NaiveDate::parse_from_str(start_date, "%Y-%m-%d") {
        Ok(d) => d,
        Err(e) => {
            return SelectionSlot::Corrupt {
                reason: format!("start_date {start_date:?}: {e}"),
            }
        }
    };
    let stocks = match serde_json::from_str::<Vec<StockRecord>>(stocks_json) {
        Ok(s) => s,
        Err(e) => {
            return SelectionSlot::Corrupt {
                reason: format!("stocks: {e}"),
            }
        }
    };

    SelectionSlot::checked(SelectionRecord {
        start_date,
        stocks,
        filter_used,
    })
}

#[async_trait]
impl SelectionStore for SqliteSelectionStore {
    fn describe(&self) -> String {
        "sqlite:active_selection".to_string()
    }

    async fn load(&self) -> StoreResult<SelectionSlot> {
        let row: Option<(String, String, String)> = sqlx::query_as(
            "SELECT start_date, filter_used, stocks_json FROM active_selection WHERE slot = 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        let Some((start_date, filter_used, stocks_json)) = row else {
            return Ok(SelectionSlot::Empty);
        };

        let slot = decode_row(&start_date, filter_used, &stocks_json);
        if let SelectionSlot::Corrupt { reason } = &slot {
            warn!(%reason, "Stored selection row is unreadable");
        }
        Ok(slot)
    }

    async fn replace(&self, record: &SelectionRecord) -> StoreResult<()> {
        let stocks_json = serde_json::to_string(&record.stocks)?;

        // One statement, so the row flips atomically
        sqlx::query(
            r#"INSERT INTO active_selection (slot, start_date, filter_used, stocks_json, saved_at)
               VALUES (1, ?1, ?2, ?3, strftime('%s', 'now'))
               ON CONFLICT(slot) DO UPDATE SET
                 start_date = excluded.start_date,
                 filter_used = excluded.filter_used,
                 stocks_json = excluded.stocks_json,
                 saved_at = excluded.saved_at
            "#,
        )
        .bind(record.start_date.format("%Y-%m-%d").to_string())
        .bind(&record.filter_used)
        .bind(&stocks_json)
        .execute(&self.pool)
        .await?;

        info!(
            start_date = %record.start_date,
            stocks = record.stocks.len(),
            "Selection saved to SQLite"
        );
        Ok(())
    }

    async fn remove(&self) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM active_selection")
            .execute(&self.pool)
            .await?;
        info!(rows = result.rows_affected(), "Selection row removed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;
    use rust_decimal_macros::dec;

    fn record() -> SelectionRecord {
        SelectionRecord {
            start_date: NaiveDate::from_ymd_opt(2026, 1, 15).unwrap(),
            stocks: vec![StockRecord {
                ticker: "BIMAS.IS".to_string(),
                price: dec!(480.25),
                rsi: dec!(52.3),
                pe_ratio: None,
                pb_ratio: None,
                momentum: dec!(0.031),
                tier_label: "Forced (momentum only)".to_string(),
                sector: None,
            }],
            filter_used: "Forced (momentum only)".to_string(),
        }
    }

    #[tokio::test]
    async fn test_round_trip_and_single_row() {
        let db = Database::in_memory().await.unwrap();
        let store = SqliteSelectionStore::new(db.pool_clone());

        assert_eq!(store.load().await.unwrap(), SelectionSlot::Empty);

        store.replace(&record()).await.unwrap();
        store.replace(&record()).await.unwrap();

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM active_selection")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(store.load().await.unwrap(), SelectionSlot::Present(record()));

        store.remove().await.unwrap();
        assert_eq!(store.load().await.unwrap(), SelectionSlot::Empty);
    }

    #[tokio::test]
    async fn test_unparseable_start_date_is_corrupt() {
        let db = Database::in_memory().await.unwrap();
        sqlx::query(
            "INSERT INTO active_selection (slot, start_date, filter_used, stocks_json) \
             VALUES (1, 'yesterday', 'Moderate', '[]')",
        )
        .execute(db.pool())
        .await
        .unwrap();

        let store = SqliteSelectionStore::new(db.pool_clone());
        assert!(matches!(
            store.load().await.unwrap(),
            SelectionSlot::Corrupt { .. }
        ));
    }

    #[tokio::test]
    async fn test_second_slot_rejected() {
        let db = Database::in_memory().await.unwrap();
        let inserted = sqlx::query(
            "INSERT INTO active_selection (slot, start_date, filter_used, stocks_json) \
             VALUES (2, '2026-01-01', 'x', '[]')",
        )
        .execute(db.pool())
        .await;
        assert!(inserted.is_err());
    }
}
