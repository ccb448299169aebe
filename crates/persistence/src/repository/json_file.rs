//! JSON document store: write a sibling temp file, fsync, then rename over the target

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use super::SelectionStore;
use crate::record::{SelectionRecord, SelectionSlot};
use crate::StoreResult;

pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Same directory as the target so the rename never crosses filesystems
    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "selection.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl SelectionStore for JsonFileStore {
    fn describe(&self) -> String {
        format!("json:{}", self.path.display())
    }

    async fn load(&self) -> StoreResult<SelectionSlot> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => {
                let slot = SelectionSlot::from_json(&bytes);
                if let SelectionSlot::Corrupt { reason } = &slot {
                    warn!(path = %self.path.display(), %reason, "Stored selection is unreadable");
                }
                Ok(slot)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(SelectionSlot::Empty),
            Err(e) => Err(e.into()),
        }
    }

    async fn replace(&self, record: &SelectionRecord) -> StoreResult<()> {
        let body = serde_json::to_vec_pretty(record)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let tmp = self.temp_path();
        let written = async {
            let mut file = tokio::fs::File::create(&tmp).await?;
            file.write_all(&body).await?;
            file.sync_all().await?;
            tokio::fs::rename(&tmp, &self.path).await
        }
        .await;

        if let Err(e) = written {
            // The target is untouched; only the temp file may be left over
            tokio::fs::remove_file(&tmp).await.ok();
            return Err(e.into());
        }

        info!(
            path = %self.path.display(),
            start_date = %record.start_date,
            stocks = record.stocks.len(),
            "Selection saved"
        );
        Ok(())
    }

    async fn remove(&self) -> StoreResult<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                info!(path = %self.path.display(), "Selection removed");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No selection file to remove");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
