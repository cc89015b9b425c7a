//! Application context shared by the HTTP surface and the scheduler.
//!
//! Built once at startup from [`GatewayConfig`]. Holds one pool per enabled
//! region together with the master sync pipeline and its collaborators.

use futures::future::{join_all, try_join_all};
use sekai_master::{
    AppHashUpdater, AssetNotifier, DatasetPublisher, DatasetStore, GitIdentity, GitPublisher,
    MasterDataDecoder, MasterSource, MasterSyncPipeline, SchemaRegistry, VersionStore,
};
use sekai_protocol::{AccountPool, CookieHelper, Region, VersionHelper, load_accounts};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::config::{GatewayConfig, ScheduleConfig};
use crate::error::ServerError;

pub struct AppContext {
    pools: BTreeMap<Region, Arc<AccountPool>>,
    pipeline: MasterSyncPipeline,
    updater: AppHashUpdater,
    publisher: Option<Arc<dyn DatasetPublisher>>,
    auth_token: Option<String>,
    schedule: ScheduleConfig,
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("regions", &self.pools.keys().collect::<Vec<_>>())
            .field("pipeline", &self.pipeline)
            .field("publisher", &self.publisher.is_some())
            .finish_non_exhaustive()
    }
}

impl AppContext {
    /// Build pools for every enabled region and log their accounts in.
    ///
    /// # Errors
    ///
    /// Returns `ServerError` if a region profile, account directory or the
    /// bundled master schema cannot be loaded.
    pub async fn build(config: &GatewayConfig) -> Result<Self, ServerError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http.timeout_secs))
            .connect_timeout(Duration::from_secs(config.http.connect_timeout_secs))
            .build()?;
        let options = config.client_options();

        let mut pending = Vec::new();
        for (region, server) in config.enabled_regions() {
            let mut pool = AccountPool::new(
                server.profile(region)?,
                options.clone(),
                VersionHelper::new(server.version_file()),
            );
            if server.require_cookies {
                pool = pool.with_cookie_helper(CookieHelper::new(&config.cookie_url, http.clone()));
            }
            let accounts = load_accounts(&server.accounts_dir, region.family()).await?;
            info!("{} loaded {} account(s)", region.tag(), accounts.len());
            pending.push((pool, accounts));
        }

        let pools = try_join_all(pending.into_iter().map(|(mut pool, accounts)| async move {
            pool.init_all(accounts).await?;
            Ok::<_, ServerError>((pool.region(), Arc::new(pool)))
        }))
        .await?
        .into_iter()
        .collect::<BTreeMap<_, _>>();

        let decoder = MasterDataDecoder::new(Arc::new(SchemaRegistry::builtin()?));
        let mut pipeline = MasterSyncPipeline::new(decoder);
        if !config.asset_updaters.is_empty() {
            pipeline = pipeline.with_notifier(AssetNotifier::new(
                http.clone(),
                config.asset_updaters.clone(),
            ));
        }
        // one store per region, shared by the pipeline and the updater
        let versions: BTreeMap<Region, VersionStore> = config
            .enabled_regions()
            .map(|(region, server)| (region, VersionStore::new(&server.version_dir)))
            .collect();
        for (region, server) in config.enabled_regions().filter(|(_, s)| s.sync_enabled) {
            if let (Some(pool), Some(store)) = (pools.get(&region), versions.get(&region)) {
                pipeline.add_region(
                    Arc::clone(pool) as Arc<dyn MasterSource>,
                    DatasetStore::new(&server.master_dir),
                    store.clone(),
                );
            }
        }

        let updater = AppHashUpdater::new(config.app_hash_sources.clone(), versions, http);

        let publisher = config.git.enabled.then(|| {
            let repositories = config
                .enabled_regions()
                .filter_map(|(region, server)| Some((region, server.repository_dir.clone()?)))
                .collect();
            Arc::new(GitPublisher::new(
                repositories,
                GitIdentity {
                    username: config.git.username.clone(),
                    email: config.git.email.clone(),
                    password: config.git.password.clone(),
                    proxy: config.git.proxy.clone(),
                },
            )) as Arc<dyn DatasetPublisher>
        });

        info!("Gateway context ready with {} region(s)", pools.len());
        Ok(Self {
            pools,
            pipeline,
            updater,
            publisher,
            auth_token: config.auth_token.clone(),
            schedule: config.schedule,
        })
    }

    /// Pool for a region, if the region is enabled
    pub fn pool(&self, region: Region) -> Option<&Arc<AccountPool>> {
        self.pools.get(&region)
    }

    pub fn pools(&self) -> impl Iterator<Item = &Arc<AccountPool>> {
        self.pools.values()
    }

    pub const fn pipeline(&self) -> &MasterSyncPipeline {
        &self.pipeline
    }

    pub const fn updater(&self) -> &AppHashUpdater {
        &self.updater
    }

    pub fn publisher(&self) -> Option<&Arc<dyn DatasetPublisher>> {
        self.publisher.as_ref()
    }

    pub fn auth_token(&self) -> Option<&str> {
        self.auth_token.as_deref()
    }

    pub const fn schedule(&self) -> &ScheduleConfig {
        &self.schedule
    }

    /// Close every client of every pool
    pub async fn shutdown(&self) {
        join_all(self.pools.values().map(|pool| pool.shutdown_all())).await;
        info!("All pools shut down");
    }
}
