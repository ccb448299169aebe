//! Persistence layer for bist-lock
//!
//! Holds the single active selection record. Two backends share the
//! [`SelectionStore`] contract (whole-record, atomic read/replace/remove):
//! - a JSON document on disk (default)
//! - a single-row SQLite table

pub mod record;
pub mod repository;
pub mod schema;

pub use record::{SelectionRecord, SelectionSlot, StockRecord};
pub use repository::{JsonFileStore, SelectionStore, SqliteSelectionStore};
pub use sqlx::sqlite::SqlitePool;

use sqlx::sqlite::SqlitePoolOptions;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database connection error: {0}")]
    Connection(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Selection file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode selection: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// SQLite connection pool holding the `active_selection` table
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (or create) a database file
    pub async fn new(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }

        let url = format!("sqlite:{}?mode=rwc", path.display());

        let pool = SqlitePoolOptions::new()
            .max_connections(2)
            .connect(&url)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        let db = Self { pool };
        db.run_migrations().await?;
        db.configure_pragmas().await?;

        Ok(db)
    }

    /// Create an in-memory database (for testing)
    pub async fn in_memory() -> StoreResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        let db = Self { pool };
        db.run_migrations().await?;
        db.configure_pragmas().await?;

        Ok(db)
    }

    /// Execute each schema statement individually
    async fn run_migrations(&self) -> StoreResult<()> {
        for statement in schema::CREATE_TABLES.split(';') {
            let sql: String = statement
                .lines()
                .filter(|line| !line.trim().starts_with("--"))
                .collect::<Vec<_>>()
                .join("\n");
            let sql = sql.trim();
            if sql.is_empty() {
                continue;
            }
            sqlx::query(sql)
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::Migration(format!("{e}: {sql}")))?;
        }

        Ok(())
    }

    async fn configure_pragmas(&self) -> StoreResult<()> {
        sqlx::query("PRAGMA journal_mode=WAL")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Connection(format!("WAL pragma failed: {e}")))?;

        // FULL sync: the selection row is tiny and must survive a crash
        sqlx::query("PRAGMA synchronous=FULL")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Connection(format!("synchronous pragma failed: {e}")))?;

        Ok(())
    }

    /// Get the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Clone the pool for a store that outlives this handle
    pub fn pool_clone(&self) -> SqlitePool {
        self.pool.clone()
    }
}
