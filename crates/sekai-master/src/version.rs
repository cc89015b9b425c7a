//! Version comparison and the persisted version record

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{MasterError, Result};

pub const CURRENT_VERSION_FILE: &str = "current_version.json";

fn components(version: &str) -> Result<Vec<u64>> {
    version
        .trim()
        .split('.')
        .map(|part| {
            part.parse::<u64>()
                .map_err(|_| MasterError::InvalidVersion(version.to_string()))
        })
        .collect()
}

/// Whether `new` is strictly newer than `current`.
///
/// Dot-separated components are compared numerically from the left over the
/// length of `new`; the first differing component decides. Components
/// missing from `current` count as zero.
pub fn compare_version(new: &str, current: &str) -> Result<bool> {
    let new = components(new)?;
    let current = components(current)?;

    for (index, part) in new.iter().enumerate() {
        let other = current.get(index).copied().unwrap_or(0);
        if *part != other {
            return Ok(*part > other);
        }
    }
    Ok(false)
}

/// Ordering key for picking the highest of several versions
pub fn version_key(version: &str) -> Option<Vec<u64>> {
    components(version).ok()
}

/// Last known server versions of a region, as stored on disk.
///
/// Unknown fields are kept and written back unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_hash: Option<String>,
    #[serde(default)]
    pub data_version: Option<String>,
    #[serde(default)]
    pub asset_version: Option<String>,
    #[serde(default)]
    pub asset_hash: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_i64",
        skip_serializing_if = "Option::is_none"
    )]
    pub cdn_version: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Accepts an integer or a numeric string
fn lenient_i64<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("cdnVersion {n} is not an integer"))),
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("cdnVersion {s:?} is not an integer"))),
        Some(other) => Err(D::Error::custom(format!("unexpected cdnVersion {other}"))),
    }
}

/// A region's version directory: the current pointer plus one immutable
/// file per data version.
///
/// Clones share one write lock, so every [`VersionStore::update`] on the
/// same region is serialized.
#[derive(Debug, Clone)]
pub struct VersionStore {
    dir: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl VersionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn current_path(&self) -> PathBuf {
        self.dir.join(CURRENT_VERSION_FILE)
    }

    pub fn snapshot_path(&self, data_version: &str) -> PathBuf {
        self.dir.join(format!("{data_version}.json"))
    }

    pub async fn load_current(&self) -> Result<VersionRecord> {
        let raw = tokio::fs::read(self.current_path()).await?;
        Ok(serde_json::from_slice(&raw)?)
    }

    /// Current record, or an empty one when none has been written yet
    pub async fn load_or_default(&self) -> Result<VersionRecord> {
        match self.load_current().await {
            Ok(record) => Ok(record),
            Err(MasterError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(VersionRecord::default())
            }
            Err(e) => Err(e),
        }
    }

    /// Load, modify and save the record under the store's lock.
    ///
    /// `apply` returns whether it changed anything; unchanged records are
    /// not written. A changed record is written as the current pointer and,
    /// with `snapshot`, also as its data version's snapshot.
    pub async fn update<F>(&self, snapshot: bool, apply: F) -> Result<Option<VersionRecord>>
    where
        F: FnOnce(&mut VersionRecord) -> Result<bool>,
    {
        let _guard = self.lock.lock().await;
        let mut record = self.load_or_default().await?;
        if !apply(&mut record)? {
            return Ok(None);
        }
        if snapshot {
            self.save(&record).await?;
        } else {
            self.save_current(&record).await?;
        }
        Ok(Some(record))
    }

    /// Write the record as the current pointer and as its data version's
    /// snapshot
    pub async fn save(&self, record: &VersionRecord) -> Result<()> {
        let bytes = self.save_current(record).await?;
        if let Some(data_version) = &record.data_version {
            tokio::fs::write(self.snapshot_path(data_version), &bytes).await?;
        }
        Ok(())
    }

    /// Replace only the current pointer, leaving snapshots alone
    pub async fn save_current(&self, record: &VersionRecord) -> Result<Vec<u8>> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let bytes = serde_json::to_vec_pretty(record)?;

        let current = self.current_path();
        let staging = self.dir.join(format!("{CURRENT_VERSION_FILE}.tmp"));
        tokio::fs::write(&staging, &bytes).await?;
        tokio::fs::rename(&staging, &current).await?;
        debug!("Saved version record to {}", current.display());
        Ok(bytes)
    }
}
