//! Database schema definitions

/// SQL to create all tables
/// NOTE: decimals live inside `stocks_json` as strings to preserve rust_decimal precision
pub const CREATE_TABLES: &str = r#"
-- The one active selection. `slot` is pinned to 1 so a second row cannot exist.
CREATE TABLE IF NOT EXISTS active_selection (
    slot INTEGER PRIMARY KEY CHECK (slot = 1),
    start_date TEXT NOT NULL,
    filter_used TEXT NOT NULL,
    stocks_json TEXT NOT NULL,
    saved_at INTEGER DEFAULT (strftime('%s', 'now'))
)
"#;
