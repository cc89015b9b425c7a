//! Asset update notifications
//!
//! Notifications are detached: [`AssetNotifier::notify`] spawns one task per
//! target and returns immediately. Failures are logged and never reach the
//! caller.

use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use sekai_protocol::Region;

const NOTIFIER_AGENT: &str = concat!("sekai-gateway/", env!("CARGO_PKG_VERSION"));

/// Default wait before retrying a notification the target answered with 409
pub const DEFAULT_CONFLICT_DELAY: Duration = Duration::from_secs(60);

/// One asset updater endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetUpdaterTarget {
    pub url: String,
    /// Bearer token sent with each notification
    #[serde(default)]
    pub authorization: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateAssetRequest {
    server: Region,
    asset_version: Option<String>,
    asset_hash: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AssetNotifier {
    http: reqwest::Client,
    targets: Arc<[AssetUpdaterTarget]>,
    conflict_delay: Duration,
}

impl AssetNotifier {
    pub fn new(http: reqwest::Client, targets: Vec<AssetUpdaterTarget>) -> Self {
        Self {
            http,
            targets: targets.into(),
            conflict_delay: DEFAULT_CONFLICT_DELAY,
        }
    }

    #[must_use]
    pub const fn with_conflict_delay(mut self, delay: Duration) -> Self {
        self.conflict_delay = delay;
        self
    }

    pub fn targets(&self) -> &[AssetUpdaterTarget] {
        &self.targets
    }

    /// Fire one detached notification per target.
    ///
    /// The handles are returned for callers that want to wait; dropping them
    /// leaves the tasks running.
    pub fn notify(
        &self,
        region: Region,
        asset_version: Option<String>,
        asset_hash: Option<String>,
    ) -> Vec<JoinHandle<()>> {
        let request = UpdateAssetRequest {
            server: region,
            asset_version,
            asset_hash,
        };
        let body = match serde_json::to_vec(&request) {
            Ok(body) => body,
            Err(e) => {
                warn!("Failed to encode asset update for {}: {}", region.tag(), e);
                return Vec::new();
            }
        };

        self.targets
            .iter()
            .cloned()
            .map(|target| {
                let http = self.http.clone();
                let body = body.clone();
                let delay = self.conflict_delay;
                tokio::spawn(async move {
                    deliver(&http, &target, body, delay).await;
                })
            })
            .collect()
    }
}

async fn deliver(http: &reqwest::Client, target: &AssetUpdaterTarget, body: Vec<u8>, delay: Duration) {
    let url = format!("{}/update_asset", target.url.trim_end_matches('/'));

    for attempt in 0..2 {
        let mut request = http
            .post(&url)
            .header(USER_AGENT, NOTIFIER_AGENT)
            .header(CONTENT_TYPE, "application/json")
            .body(body.clone());
        if let Some(token) = &target.authorization {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }

        match request.send().await {
            Ok(response) if response.status() == StatusCode::OK => {
                info!("Asset updater {} accepted the update", target.url);
                return;
            }
            Ok(response) if response.status() == StatusCode::CONFLICT && attempt == 0 => {
                info!(
                    "Asset updater {} is busy, retrying in {:?}",
                    target.url, delay
                );
                tokio::time::sleep(delay).await;
            }
            Ok(response) => {
                warn!(
                    "Asset updater {} answered with status {}",
                    target.url,
                    response.status()
                );
                return;
            }
            Err(e) => {
                warn!("Asset updater {} unreachable: {}", target.url, e);
                return;
            }
        }
    }
}
