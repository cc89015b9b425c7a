//! Per-region pool of protocol clients
//!
//! Each client sits behind its own async mutex. Selection walks the clients
//! round-robin from a shared cursor and takes the first one whose mutex can be
//! locked without waiting, so picking a client and taking ownership of it are
//! the same atomic step. When every client is busy the caller gets
//! [`PoolError::Busy`] instead of queueing.

use futures::future::join_all;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, error, info, warn};

use crate::account::Account;
use crate::client::{ApiResponse, ImageResponse, LoginData, MasterPayload, ProtocolClient, status};
use crate::config::{ClientOptions, ServerProfile};
use crate::error::{ClientError, Condition, PoolError};
use crate::helper::{CookieHelper, VersionHelper};
use crate::region::Region;

type Slot = Arc<Mutex<ProtocolClient>>;

/// Exclusive handle to one pooled client; dropping it releases the client
pub type ClientGuard = OwnedMutexGuard<ProtocolClient>;

pub struct AccountPool {
    profile: Arc<ServerProfile>,
    options: Arc<ClientOptions>,
    versions: Arc<VersionHelper>,
    cookies: Option<Arc<CookieHelper>>,
    clients: Vec<Slot>,
    cursor: AtomicUsize,
}

impl std::fmt::Debug for AccountPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountPool")
            .field("region", &self.profile.region)
            .field("clients", &self.clients.len())
            .finish_non_exhaustive()
    }
}

impl AccountPool {
    pub fn new(profile: ServerProfile, options: ClientOptions, versions: VersionHelper) -> Self {
        Self {
            profile: Arc::new(profile),
            options: Arc::new(options),
            versions: Arc::new(versions),
            cookies: None,
            clients: Vec::new(),
            cursor: AtomicUsize::new(0),
        }
    }

    /// Attach the region's edge cookie source
    #[must_use]
    pub fn with_cookie_helper(mut self, helper: CookieHelper) -> Self {
        self.cookies = Some(Arc::new(helper));
        self
    }

    pub fn region(&self) -> Region {
        self.profile.region
    }

    pub fn profile(&self) -> &ServerProfile {
        &self.profile
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    fn build_clients(&mut self, accounts: Vec<Account>) -> Result<(), ClientError> {
        for account in accounts {
            let client = ProtocolClient::new(
                Arc::clone(&self.profile),
                Arc::clone(&self.options),
                account,
                Arc::clone(&self.versions),
                self.cookies.clone(),
            )?;
            self.clients.push(Arc::new(Mutex::new(client)));
        }
        Ok(())
    }

    /// Build one client per account, then initialize and log them all in
    /// concurrently.
    ///
    /// Clients that fail to initialize are dropped from the pool. Login
    /// failures are logged and the client is kept; it logs in again on its
    /// first rejected session.
    pub async fn init_all(&mut self, accounts: Vec<Account>) -> Result<(), ClientError> {
        let tag = self.profile.region.tag();
        self.build_clients(accounts)?;

        let inits = join_all(self.clients.iter().map(|slot| async move {
            let mut client = slot.lock().await;
            client.init().await
        }))
        .await;

        let mut ready = Vec::with_capacity(self.clients.len());
        for (slot, result) in self.clients.drain(..).zip(inits) {
            match result {
                Ok(()) => ready.push(slot),
                Err(e) => error!("{} client failed to initialize: {}", tag, e),
            }
        }
        self.clients = ready;

        let logins = join_all(self.clients.iter().map(|slot| async move {
            let mut client = slot.lock().await;
            client.login().await.map(|_| ())
        }))
        .await;
        let failed = logins.iter().filter(|r| r.is_err()).count();
        for e in logins.into_iter().filter_map(Result::err) {
            warn!("{} client login failed during startup: {}", tag, e);
        }

        info!(
            "{} pool ready with {} client(s), {} not logged in",
            tag,
            self.clients.len(),
            failed
        );
        Ok(())
    }

    /// Take the next free client without waiting
    pub fn try_acquire(&self) -> Result<ClientGuard, PoolError> {
        let count = self.clients.len();
        if count == 0 {
            return Err(PoolError::Empty);
        }

        let start = self.cursor.fetch_add(1, Ordering::Relaxed) % count;
        (0..count)
            .map(|offset| (start + offset) % count)
            .find_map(|index| Arc::clone(&self.clients[index]).try_lock_owned().ok())
            .ok_or(PoolError::Busy)
    }

    /// GET a game API path through a free client.
    ///
    /// Never fails: conditions the pool cannot repair come back as a
    /// `{"result": "failed", "message": ...}` body with a 5xx status.
    pub async fn api_get(&self, path: &str, params: &[(String, String)]) -> (Value, u16) {
        let result = self
            .options
            .retry
            .execute_if(PoolError::is_remediable, || self.api_get_once(path, params))
            .await;

        match result {
            Ok(response) => (response.body, response.status),
            Err(e) => self.degraded(&e),
        }
    }

    async fn api_get_once(
        &self,
        path: &str,
        params: &[(String, String)],
    ) -> Result<ApiResponse, PoolError> {
        let outcome = {
            let mut client = self.try_acquire()?;
            client.get(path, params).await
        };

        // guard is released above; broadcasts lock every client
        match outcome {
            Ok(response) => Ok(response),
            Err(e) => {
                match e.condition() {
                    Condition::CookieExpired => {
                        warn!("{} server cookies expired, refreshing", self.profile.region.tag());
                        self.refresh_cookies().await;
                    }
                    Condition::UpgradeRequired => {
                        warn!(
                            "{} server upgrade required, reloading version",
                            self.profile.region.tag()
                        );
                        self.refresh_version().await;
                    }
                    _ => {}
                }
                Err(e.into())
            }
        }
    }

    fn degraded(&self, err: &PoolError) -> (Value, u16) {
        let tag = self.profile.region.tag();
        if matches!(err.condition(), Some(Condition::UnderMaintenance)) {
            warn!("{} server is under maintenance", tag);
            return (
                json!({
                    "result": "failed",
                    "message": format!("{tag} Game server is under maintenance."),
                }),
                status::UNDER_MAINTENANCE,
            );
        }

        warn!("Failed to call {} server API: {}", tag, err);
        (
            json!({"result": "failed", "message": err.to_string()}),
            status::SERVER_ERROR,
        )
    }

    /// Fetch a raw image through a free client
    pub async fn image_get(&self, path: &str) -> ImageResponse {
        match self.try_acquire() {
            Ok(client) => client.get_image(path).await,
            Err(e) => {
                debug!("No client for image {}: {}", path, e);
                ImageResponse::failed(status::SERVER_ERROR)
            }
        }
    }

    /// Force a login on a free client and return the server's response
    pub async fn get_login_data(&self) -> Result<LoginData, PoolError> {
        let mut client = self.try_acquire()?;
        Ok(client.login().await?)
    }

    /// Download raw master data through a free client
    pub async fn download_master(&self) -> Result<MasterPayload, PoolError> {
        let mut client = self.try_acquire()?;
        Ok(client.download_master_data().await?)
    }

    /// Refresh cookies on every client concurrently
    pub async fn refresh_cookies(&self) {
        if !self.profile.require_cookies {
            return;
        }
        let results = join_all(self.clients.iter().map(|slot| async move {
            let mut client = slot.lock().await;
            client.refresh_cookies().await
        }))
        .await;
        for e in results.into_iter().filter_map(Result::err) {
            warn!("Cookie refresh failed: {}", e);
        }
    }

    /// Re-apply version stamps on every client concurrently
    pub async fn refresh_version(&self) {
        let results = join_all(self.clients.iter().map(|slot| async move {
            let mut client = slot.lock().await;
            client.refresh_version().await
        }))
        .await;
        for e in results.into_iter().filter_map(Result::err) {
            warn!("Version refresh failed: {}", e);
        }
    }

    /// Close every client, waiting for in-flight calls to finish
    pub async fn shutdown_all(&self) {
        join_all(self.clients.iter().map(|slot| async move {
            slot.lock().await.close();
        }))
        .await;
        info!("{} pool shut down", self.profile.region.tag());
    }
}
