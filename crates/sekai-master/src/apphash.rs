//! App version and hash tracking.
//!
//! Each source publishes one `{REGION}.json` per region holding the latest
//! client build. The highest readable version wins and, when newer than the
//! local record, replaces the record's `appVersion` and `appHash`.

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use sekai_protocol::Region;

use crate::error::{MasterError, Result};
use crate::version::{VersionStore, compare_version, version_key};

/// Where app build information is published
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AppHashSource {
    /// Local directory holding `{REGION}.json`
    File { dir: PathBuf },
    /// URL prefix; `{REGION}.json` is appended verbatim
    Url { url: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppInfo {
    pub app_version: String,
    pub app_hash: String,
}

#[derive(Debug, Clone)]
pub struct AppHashUpdater {
    sources: Vec<AppHashSource>,
    versions: BTreeMap<Region, VersionStore>,
    http: reqwest::Client,
}

impl AppHashUpdater {
    /// `versions` should be the same stores the sync pipeline writes, so
    /// both serialize on one lock per region
    pub fn new(
        sources: Vec<AppHashSource>,
        versions: BTreeMap<Region, VersionStore>,
        http: reqwest::Client,
    ) -> Self {
        Self {
            sources,
            versions,
            http,
        }
    }

    pub fn sources(&self) -> &[AppHashSource] {
        &self.sources
    }

    async fn read_source(&self, source: &AppHashSource, region: Region) -> Result<AppInfo> {
        let file = format!("{}.json", region.tag());
        match source {
            AppHashSource::File { dir } => {
                let raw = tokio::fs::read(dir.join(file)).await?;
                Ok(serde_json::from_slice(&raw)?)
            }
            AppHashSource::Url { url } => {
                let raw = self
                    .http
                    .get(format!("{url}{file}"))
                    .send()
                    .await?
                    .error_for_status()?
                    .bytes()
                    .await?;
                Ok(serde_json::from_slice(&raw)?)
            }
        }
    }

    /// Highest app version published for a region, if any source is readable
    pub async fn latest_remote(&self, region: Region) -> Option<AppInfo> {
        let reads = self
            .sources
            .iter()
            .map(|source| self.read_source(source, region));

        join_all(reads)
            .await
            .into_iter()
            .zip(&self.sources)
            .filter_map(|(result, source)| match result {
                Ok(info) => Some(info),
                Err(e) => {
                    debug!("{} app info unavailable from {:?}: {}", region.tag(), source, e);
                    None
                }
            })
            .filter_map(|info| version_key(&info.app_version).map(|key| (key, info)))
            .max_by(|(a, _), (b, _)| a.cmp(b))
            .map(|(_, info)| info)
    }

    /// Update the region's record when a newer app build is published.
    ///
    /// Returns whether the record changed.
    pub async fn check_app_version(&self, region: Region) -> Result<bool> {
        let store = self
            .versions
            .get(&region)
            .ok_or(MasterError::UnknownRegion(region))?;

        let Some(latest) = self.latest_remote(region).await else {
            return Ok(false);
        };

        let updated = store
            .update(false, |record| {
                let newer = match &record.app_version {
                    Some(current) => compare_version(&latest.app_version, current)?,
                    None => true,
                };
                if newer {
                    info!(
                        "{} app version {} -> {}",
                        region.tag(),
                        record.app_version.as_deref().unwrap_or("none"),
                        latest.app_version
                    );
                    record.app_version = Some(latest.app_version);
                    record.app_hash = Some(latest.app_hash);
                }
                Ok(newer)
            })
            .await?;
        Ok(updated.is_some())
    }

    /// Check every configured region; failures are logged per region
    pub async fn check_all(&self) -> Vec<Region> {
        let checks = self.versions.keys().map(|&region| async move {
            (region, self.check_app_version(region).await)
        });

        join_all(checks)
            .await
            .into_iter()
            .filter_map(|(region, result)| match result {
                Ok(true) => Some(region),
                Ok(false) => None,
                Err(e) => {
                    warn!("{} app version check failed: {}", region.tag(), e);
                    None
                }
            })
            .collect()
    }
}
