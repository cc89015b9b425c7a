//! On-disk dataset directory, one JSON file per table

use futures::future::try_join_all;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{MasterError, Result};

#[derive(Debug, Clone)]
pub struct DatasetStore {
    dir: PathBuf,
}

impl DatasetStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn table_path(&self, table: &str) -> PathBuf {
        self.dir.join(format!("{table}.json"))
    }

    /// Write every table as `{table}.json`, replacing existing files
    pub async fn save_tables(&self, tables: Map<String, Value>) -> Result<usize> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let encoded = tokio::task::spawn_blocking(move || {
            tables
                .into_iter()
                .map(|(name, table)| -> Result<(String, Vec<u8>)> {
                    Ok((name, serde_json::to_vec_pretty(&table)?))
                })
                .collect::<Result<Vec<_>>>()
        })
        .await
        .map_err(|e| MasterError::Worker(e.to_string()))??;

        let count = encoded.len();
        try_join_all(
            encoded
                .into_iter()
                .map(|(name, bytes)| tokio::fs::write(self.table_path(&name), bytes)),
        )
        .await?;

        info!("Saved {} tables to {}", count, self.dir.display());
        Ok(count)
    }
}
