//! Per-region master data synchronization.
//!
//! A check forces a login to learn the server's current version stamps and
//! compares them with the region's persisted [`VersionRecord`]:
//!
//! - credential regions compare `dataVersion` and `assetVersion` separately,
//!   each driving its own update path
//! - token regions compare the integer `cdnVersion`, and a change drives both
//!   paths together
//!
//! The record only advances after the new dataset is on disk. Any failure
//! leaves the previous record in place.

use async_trait::async_trait;
use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use sekai_protocol::{AccountFamily, AccountPool, LoginData, MasterPayload, Region};

use crate::decode::MasterDataDecoder;
use crate::error::{MasterError, Result};
use crate::notify::AssetNotifier;
use crate::store::DatasetStore;
use crate::version::{VersionRecord, VersionStore, compare_version};

/// Where a region's version stamps and master data come from
#[async_trait]
pub trait MasterSource: Send + Sync {
    fn region(&self) -> Region;

    /// Log in and return the server's login response
    async fn login_data(&self) -> Result<LoginData>;

    async fn download(&self) -> Result<MasterPayload>;
}

#[async_trait]
impl MasterSource for AccountPool {
    fn region(&self) -> Region {
        Self::region(self)
    }

    async fn login_data(&self) -> Result<LoginData> {
        Ok(self.get_login_data().await?)
    }

    async fn download(&self) -> Result<MasterPayload> {
        Ok(self.download_master().await?)
    }
}

/// Which update paths a check triggered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Triggers {
    dataset: bool,
    assets: bool,
}

struct RegionSync {
    source: Arc<dyn MasterSource>,
    store: DatasetStore,
    versions: VersionStore,
    running: Mutex<()>,
}

pub struct MasterSyncPipeline {
    regions: BTreeMap<Region, RegionSync>,
    decoder: Arc<MasterDataDecoder>,
    notifier: Option<AssetNotifier>,
}

impl std::fmt::Debug for MasterSyncPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterSyncPipeline")
            .field("regions", &self.regions.keys().collect::<Vec<_>>())
            .field("notifier", &self.notifier)
            .finish_non_exhaustive()
    }
}

impl MasterSyncPipeline {
    pub fn new(decoder: MasterDataDecoder) -> Self {
        Self {
            regions: BTreeMap::new(),
            decoder: Arc::new(decoder),
            notifier: None,
        }
    }

    #[must_use]
    pub fn with_notifier(mut self, notifier: AssetNotifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Register a region; a later registration for the same region replaces
    /// the earlier one
    pub fn add_region(
        &mut self,
        source: Arc<dyn MasterSource>,
        store: DatasetStore,
        versions: VersionStore,
    ) {
        self.regions.insert(
            source.region(),
            RegionSync {
                source,
                store,
                versions,
                running: Mutex::new(()),
            },
        );
    }

    pub fn regions(&self) -> impl Iterator<Item = Region> + '_ {
        self.regions.keys().copied()
    }

    /// Run one region's check.
    ///
    /// Returns the region's data version when its dataset or assets
    /// advanced. A check that finds the region already running returns
    /// `Ok(None)` without waiting.
    pub async fn check_update(&self, region: Region) -> Result<Option<String>> {
        let sync = self
            .regions
            .get(&region)
            .ok_or(MasterError::UnknownRegion(region))?;

        let Ok(_running) = sync.running.try_lock() else {
            info!("{} master check already running, skipping", region.tag());
            return Ok(None);
        };

        let current = sync.versions.load_or_default().await?;
        let login = sync.source.login_data().await?;
        let triggers = match region.family() {
            AccountFamily::Direct => direct_triggers(&current, &login)?,
            AccountFamily::Token => token_triggers(&current, &login)?,
        };
        debug!("{} update triggers: {:?}", region.tag(), triggers);

        if !triggers.dataset && !triggers.assets {
            debug!("{} is up to date", region.tag());
            return Ok(None);
        }

        if triggers.dataset {
            let payload = sync.source.download().await?;
            let decoder = Arc::clone(&self.decoder);
            let tables = tokio::task::spawn_blocking(move || decoder.decode(payload))
                .await
                .map_err(|e| MasterError::Worker(e.to_string()))??;
            sync.store.save_tables(tables).await?;
        }

        if triggers.assets
            && let Some(notifier) = &self.notifier
        {
            // detached; delivery failures never reach this check
            drop(notifier.notify(
                region,
                login.asset_version().map(str::to_string),
                login.asset_hash().map(str::to_string),
            ));
        }

        // reloaded under the store lock so concurrent app hash writes survive
        let record = sync
            .versions
            .update(true, |record| {
                advance_record(record, &login, region.family(), triggers);
                Ok(true)
            })
            .await?
            .unwrap_or_default();

        let data_version = record.data_version.unwrap_or_default();
        if triggers.dataset {
            info!("{} master data updated to {}", region.tag(), data_version);
        }
        if triggers.assets {
            info!(
                "{} asset version updated to {}",
                region.tag(),
                record.asset_version.as_deref().unwrap_or_default()
            );
        }
        Ok(Some(data_version))
    }

    /// Check every region concurrently and collect those that advanced,
    /// with their data version. One region's failure is logged and does
    /// not affect others.
    pub async fn check_update_all(&self) -> BTreeMap<Region, String> {
        let checks = self
            .regions
            .keys()
            .map(|&region| async move { (region, self.check_update(region).await) });

        join_all(checks)
            .await
            .into_iter()
            .filter_map(|(region, result)| match result {
                Ok(advanced) => advanced.map(|version| (region, version)),
                Err(e) => {
                    warn!("{} master check failed: {}", region.tag(), e);
                    None
                }
            })
            .collect()
    }
}

fn direct_triggers(record: &VersionRecord, login: &LoginData) -> Result<Triggers> {
    let data = login
        .data_version()
        .ok_or(MasterError::MissingVersion("dataVersion"))?;
    let asset = login
        .asset_version()
        .ok_or(MasterError::MissingVersion("assetVersion"))?;

    Ok(Triggers {
        dataset: compare_version(data, record.data_version.as_deref().unwrap_or("0"))?,
        assets: compare_version(asset, record.asset_version.as_deref().unwrap_or("0"))?,
    })
}

fn token_triggers(record: &VersionRecord, login: &LoginData) -> Result<Triggers> {
    let cdn = login
        .cdn_version()
        .ok_or(MasterError::MissingVersion("cdnVersion"))?;
    let changed = cdn > record.cdn_version.unwrap_or(0);
    Ok(Triggers {
        dataset: changed,
        assets: changed,
    })
}

/// Copy the stamps of every triggered path from the login into the record
fn advance_record(
    record: &mut VersionRecord,
    login: &LoginData,
    family: AccountFamily,
    triggers: Triggers,
) {
    if triggers.assets {
        if let Some(asset) = login.asset_version() {
            record.asset_version = Some(asset.to_string());
        }
        if let Some(hash) = login.asset_hash() {
            record.asset_hash = Some(hash.to_string());
        }
    }
    if !triggers.dataset {
        return;
    }
    match family {
        AccountFamily::Direct => {
            if let Some(data) = login.data_version() {
                record.data_version = Some(data.to_string());
            }
        }
        AccountFamily::Token => {
            let cdn = login.cdn_version();
            record.cdn_version = cdn;
            // snapshots are named by data version; fall back to the cdn stamp
            record.data_version = login
                .data_version()
                .map(str::to_string)
                .or_else(|| cdn.map(|v| v.to_string()));
        }
    }
}
