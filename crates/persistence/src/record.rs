//! Persisted shape of the active selection

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One held stock, frozen at the moment the selection was made
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockRecord {
    pub ticker: String,
    /// Entry price (latest close at selection time)
    pub price: Decimal,
    pub rsi: Decimal,
    /// Trailing P/E, `None` when it could not be obtained or was not checked
    pub pe_ratio: Option<Decimal>,
    pub pb_ratio: Option<Decimal>,
    /// 30-observation return as a fraction (0.08 = +8%)
    pub momentum: Decimal,
    /// Label of the filter tier that accepted the stock
    pub tier_label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sector: Option<String>,
}

/// The whole persisted document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionRecord {
    /// ISO calendar date (`YYYY-MM-DD`) the lock started
    pub start_date: NaiveDate,
    pub stocks: Vec<StockRecord>,
    pub filter_used: String,
}

impl SelectionRecord {
    /// Structural checks that serde cannot express
    pub fn validate(&self) -> Result<(), String> {
        if self.stocks.is_empty() {
            return Err("selection holds no stocks".to_string());
        }
        for stock in &self.stocks {
            if stock.ticker.trim().is_empty() {
                return Err("stock with empty ticker".to_string());
            }
            if stock.price <= Decimal::ZERO {
                return Err(format!("{} has non-positive entry price", stock.ticker));
            }
        }
        Ok(())
    }
}

/// What a store found when it looked for the active selection
#[derive(Debug, Clone, PartialEq)]
pub enum SelectionSlot {
    /// Nothing persisted
    Empty,
    Present(SelectionRecord),
    /// Something is persisted but it is not a valid selection
    Corrupt { reason: String },
}

impl SelectionSlot {
    /// Decode a JSON document; any decode or validation failure is `Corrupt`
    pub fn from_json(bytes: &[u8]) -> Self {
        match serde_json::from_slice::<SelectionRecord>(bytes) {
            Ok(record) => Self::checked(record),
            Err(e) => Self::Corrupt {
                reason: e.to_string(),
            },
        }
    }

    pub(crate) fn checked(record: SelectionRecord) -> Self {
        match record.validate() {
            Ok(()) => Self::Present(record),
            Err(reason) => Self::Corrupt { reason },
        }
    }
}
