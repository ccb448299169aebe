//! Selection store implementations

pub mod json_file;
pub mod sqlite;

pub use json_file::JsonFileStore;
pub use sqlite::SqliteSelectionStore;

use crate::record::{SelectionRecord, SelectionSlot};
use crate::StoreResult;
use async_trait::async_trait;

/// Whole-record storage for the single active selection.
///
/// `replace` must be atomic: after it returns (or fails) a reader sees either
/// the previous record or the new one, never a mix.
#[async_trait]
pub trait SelectionStore: Send + Sync {
    /// Short backend name for logs
    fn describe(&self) -> String;

    async fn load(&self) -> StoreResult<SelectionSlot>;

    async fn replace(&self, record: &SelectionRecord) -> StoreResult<()>;

    /// Remove whatever is stored, valid or not. Removing nothing is not an error.
    async fn remove(&self) -> StoreResult<()>;
}
