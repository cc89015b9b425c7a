//! Protocol client bound to one game account
//!
//! A client moves through [`ClientState`] as it is initialized, logged in and
//! closed. All session header mutation happens through `&mut self`, so the
//! owner (normally an [`AccountPool`](crate::AccountPool) slot) guarantees
//! exclusive use while a call is in flight.
//!
//! Envelope work (serialization plus AES) runs on the blocking thread pool so
//! large master data payloads never stall the async scheduler.

mod response;

pub use response::{ApiResponse, ImageBody, ImageResponse, LoginData, MasterPayload, status};

use bytes::Bytes;
use reqwest::Method;
use reqwest::header::{CONTENT_TYPE, HOST, HeaderValue};
use sekai_crypto::CryptoCodec;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::account::Account;
use crate::config::{ClientOptions, ServerProfile};
use crate::error::{ClientError, Result};
use crate::helper::{CookieHelper, VersionHelper};
use crate::region::AccountFamily;
use crate::session::{self, Session};
use crate::transport::{Route, Transport};
use response::{Outcome, classify, essence};

const OCTET_STREAM: &str = "application/octet-stream";
const USER_PATH_PREFIX: &str = "/user/%user_id";

/// Lifecycle of a [`ProtocolClient`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Uninitialized,
    /// Headers populated and transport open
    Ready,
    /// Logged in; a session token is present
    Authenticated,
    Closed,
}

/// Encrypted API client for a single account
#[derive(Debug)]
pub struct ProtocolClient {
    profile: Arc<ServerProfile>,
    options: Arc<ClientOptions>,
    account: Account,
    session: Session,
    cookies: Option<Arc<CookieHelper>>,
    versions: Arc<VersionHelper>,
    transport: Option<Transport>,
    state: ClientState,
}

impl ProtocolClient {
    pub fn new(
        profile: Arc<ServerProfile>,
        options: Arc<ClientOptions>,
        account: Account,
        versions: Arc<VersionHelper>,
        cookies: Option<Arc<CookieHelper>>,
    ) -> Result<Self> {
        let session = Session::from_template(&profile.headers, account.user_id())?;
        Ok(Self {
            profile,
            options,
            account,
            session,
            cookies,
            versions,
            transport: None,
            state: ClientState::Uninitialized,
        })
    }

    pub const fn state(&self) -> ClientState {
        self.state
    }

    pub const fn account(&self) -> &Account {
        &self.account
    }

    pub const fn session(&self) -> &Session {
        &self.session
    }

    pub fn profile(&self) -> &ServerProfile {
        &self.profile
    }

    /// Resolved numeric user id, if known yet
    pub const fn user_id(&self) -> Option<i64> {
        self.session.user_id()
    }

    fn label(&self) -> String {
        self.session
            .user_id()
            .map_or_else(|| "#?".to_string(), |id| format!("#{id}"))
    }

    fn routes(&self) -> Result<&[Route]> {
        self.transport
            .as_ref()
            .map(Transport::routes)
            .ok_or(ClientError::NotInitialized)
    }

    /// Populate cookie and version headers and open the transport
    pub async fn init(&mut self) -> Result<()> {
        self.refresh_cookies().await?;
        self.refresh_version().await?;
        self.transport = Some(Transport::open(&self.options)?);
        self.state = ClientState::Ready;
        debug!(
            "{} client {} ready",
            self.profile.region.tag(),
            self.label()
        );
        Ok(())
    }

    /// Refresh edge cookies through the shared helper and apply them.
    ///
    /// No-op for regions that do not use cookies.
    pub async fn refresh_cookies(&mut self) -> Result<()> {
        if !self.profile.require_cookies {
            return Ok(());
        }
        let Some(helper) = self.cookies.clone() else {
            warn!(
                "{} requires cookies but no cookie source is configured",
                self.profile.region.tag()
            );
            return Ok(());
        };

        helper.refresh().await?;
        tokio::time::sleep(self.options.settle_delay).await;
        if let Some(cookie) = helper.cookie() {
            self.session.set(session::COOKIE, &cookie)?;
        }
        Ok(())
    }

    /// Re-read version stamps through the shared helper and apply them
    pub async fn refresh_version(&mut self) -> Result<()> {
        self.versions.refresh().await?;
        tokio::time::sleep(self.options.settle_delay).await;
        if let Some(stamps) = self.versions.current() {
            self.session.apply_version(&stamps)?;
        }
        Ok(())
    }

    /// Authenticate the account and update session headers
    pub async fn login(&mut self) -> Result<LoginData> {
        let payload = serde_json::to_value(&self.account)?;
        let body = Bytes::from(pack_blocking(self.profile.codec(), payload).await?);

        let api = &self.profile.api_url;
        let (method, url) = match &self.account {
            Account::Direct(account) => (
                Method::PUT,
                format!(
                    "{api}/api/user/{}/auth?refreshUpdatedResources=False",
                    account.user_id
                ),
            ),
            Account::Token(_) => (Method::POST, format!("{api}/api/user/auth")),
        };

        let routes = self.routes()?.to_vec();
        let mut last_error = None;
        for route in &routes {
            let sent = route
                .client()
                .request(method.clone(), &url)
                .headers(self.session.headers().clone())
                .header(CONTENT_TYPE, OCTET_STREAM)
                .timeout(self.options.login_timeout)
                .body(body.clone())
                .send()
                .await;

            let response = match sent {
                Ok(response) => response,
                Err(e) => match ClientError::from_send(e, route.label()) {
                    err @ ClientError::ProxyUnreachable { .. } => {
                        warn!("Failed to connect via {}, trying next route", route.label());
                        last_error = Some(err);
                        continue;
                    }
                    err => {
                        error!(
                            "{} login for {} failed: {}",
                            self.profile.region.tag(),
                            self.label(),
                            err
                        );
                        return Err(err);
                    }
                },
            };

            let code = response.status().as_u16();
            return match code {
                status::OK => {
                    let raw = response
                        .bytes()
                        .await
                        .map_err(|e| ClientError::from_send(e, route.label()))?;
                    let data = LoginData::new(unpack_blocking(self.profile.codec(), raw).await?);
                    self.apply_login(&data)?;
                    Ok(data)
                }
                status::GAME_UPGRADE => {
                    warn!(
                        "{} server app version might be upgraded",
                        self.profile.region.tag()
                    );
                    Err(ClientError::UpgradeRequired)
                }
                other => {
                    warn!(
                        "{} account {} login failed with status {}",
                        self.profile.region.tag(),
                        self.label(),
                        other
                    );
                    Err(ClientError::LoginFailed(other))
                }
            };
        }

        Err(last_error.unwrap_or(ClientError::NotInitialized))
    }

    fn apply_login(&mut self, data: &LoginData) -> Result<()> {
        let token = data
            .session_token()
            .ok_or(ClientError::MissingField("sessionToken"))?;
        self.session.set(session::SESSION_TOKEN, token)?;
        if let Some(version) = data.data_version() {
            self.session.set(session::DATA_VERSION, version)?;
        }
        if let Some(version) = data.asset_version() {
            self.session.set(session::ASSET_VERSION, version)?;
        }
        if self.account.family() == AccountFamily::Token {
            let user_id = data
                .registered_user_id()
                .ok_or(ClientError::MissingField("userRegistration.userId"))?;
            self.session.set_user_id(user_id);
        }

        self.state = ClientState::Authenticated;
        info!(
            "{} server account {} logged in",
            self.profile.region.tag(),
            self.label()
        );
        Ok(())
    }

    /// Issue an authenticated call, retried under the configured policy.
    ///
    /// `path` is relative to the API root; a `/user/%user_id` prefix is
    /// replaced with the account's resolved user id.
    pub async fn call(
        &mut self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        params: &[(String, String)],
    ) -> Result<ApiResponse> {
        let packed = match body {
            Some(value) => Some(Bytes::from(
                pack_blocking(self.profile.codec(), value.clone()).await?,
            )),
            None => None,
        };

        let retry = self.options.retry.clone();
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.call_once(&method, path, packed.as_ref(), params).await {
                Ok(response) => return Ok(response),
                Err(e) if !retry.can_retry(attempt, e.should_retry()) => return Err(e),
                Err(e) => {
                    warn!("Attempt {} of {} {} failed: {}", attempt, method, path, e);
                    retry.wait().await;
                }
            }
        }
    }

    /// Convenience wrapper for a GET call
    pub async fn get(&mut self, path: &str, params: &[(String, String)]) -> Result<ApiResponse> {
        self.call(Method::GET, path, None, params).await
    }

    async fn call_once(
        &mut self,
        method: &Method,
        path: &str,
        body: Option<&Bytes>,
        params: &[(String, String)],
    ) -> Result<ApiResponse> {
        let routes = self.routes()?.to_vec();
        let request_id = self.session.new_request_id();
        let api_path = rewrite_path(path, self.session.user_id())?;

        let mut url = Url::parse(&format!("{}{}", self.profile.api_url, api_path))?;
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params);
        }

        info!(
            "{} server account {} {} {} ({})",
            self.profile.region.tag(),
            self.label(),
            method,
            api_path,
            request_id
        );

        let mut last_error = None;
        for route in &routes {
            let mut request = route
                .client()
                .request(method.clone(), url.clone())
                .headers(self.session.headers().clone());
            if let Some(body) = body {
                request = request.header(CONTENT_TYPE, OCTET_STREAM).body(body.clone());
            }

            let response = match request.send().await {
                Ok(response) => response,
                Err(e) => match ClientError::from_send(e, route.label()) {
                    err @ ClientError::ProxyUnreachable { .. } => {
                        warn!("Failed to connect via {}, trying next route", route.label());
                        last_error = Some(err);
                        continue;
                    }
                    err => {
                        warn!(
                            "{} client {} request failed: {}",
                            self.profile.region.tag(),
                            self.label(),
                            err
                        );
                        return Err(err);
                    }
                },
            };

            self.session.capture_token(response.headers());
            return self.handle_response(route, response).await;
        }

        warn!("All routes failed for {}", api_path);
        Err(last_error.unwrap_or(ClientError::NotInitialized))
    }

    async fn handle_response(
        &mut self,
        route: &Route,
        response: reqwest::Response,
    ) -> Result<ApiResponse> {
        let code = response.status().as_u16();
        let content_type = essence(
            response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok()),
        );
        let raw = response
            .bytes()
            .await
            .map_err(|e| ClientError::from_send(e, route.label()))?;

        let tag = self.profile.region.tag();
        match classify(code, &content_type) {
            Outcome::Payload => Ok(ApiResponse {
                status: code,
                body: unpack_blocking(self.profile.codec(), raw).await?,
            }),
            Outcome::SessionExpired => {
                warn!(
                    "{} server client {} session expired, logging in again",
                    tag,
                    self.label()
                );
                self.login().await?;
                Err(ClientError::SessionExpired)
            }
            Outcome::CookieExpired => {
                warn!("{} server cookies expired, refreshing", tag);
                self.refresh_cookies().await?;
                Err(ClientError::CookieExpired)
            }
            Outcome::UpgradeRequired => {
                warn!("{} server app version might be upgraded", tag);
                Err(ClientError::UpgradeRequired)
            }
            Outcome::UnderMaintenance => {
                warn!("{} server is under maintenance", tag);
                Err(ClientError::UnderMaintenance)
            }
            Outcome::Unexpected => {
                let body = String::from_utf8_lossy(&raw[..raw.len().min(512)]).into_owned();
                error!(
                    "{} server returned status {} ({}): {}",
                    tag, code, content_type, body
                );
                Err(ClientError::UnexpectedResponse {
                    status: code,
                    content_type,
                    body,
                })
            }
        }
    }

    /// Fetch an unencrypted image under `{api}/image{path}`.
    ///
    /// Never fails: when every route fails the result carries status 500.
    pub async fn get_image(&self, path: &str) -> ImageResponse {
        let Ok(routes) = self.routes() else {
            return ImageResponse::failed(status::SERVER_ERROR);
        };
        let url = format!("{}/image{}", self.profile.api_url, path);

        for route in routes {
            match route
                .client()
                .get(&url)
                .headers(self.session.headers().clone())
                .send()
                .await
            {
                Ok(response) if response.status() == reqwest::StatusCode::OK => {
                    return match response.bytes().await {
                        Ok(data) => ImageResponse {
                            status: status::OK,
                            body: ImageBody::Data(data),
                        },
                        Err(e) => {
                            warn!("Image body read failed for {}: {}", path, e);
                            ImageResponse::failed(status::SERVER_ERROR)
                        }
                    };
                }
                Ok(response) => return ImageResponse::failed(response.status().as_u16()),
                Err(e) if e.is_connect() => {
                    warn!("Failed to connect via {}, trying next route", route.label());
                }
                Err(e) => {
                    warn!("Image fetch failed for {}: {}", path, e);
                    return ImageResponse::failed(status::SERVER_ERROR);
                }
            }
        }

        ImageResponse::failed(status::SERVER_ERROR)
    }

    /// Log in, then fetch the region's master data
    pub async fn download_master_data(&mut self) -> Result<MasterPayload> {
        let login = self.login().await?;
        match self.account.family() {
            AccountFamily::Token => self.download_packed(&login).await,
            AccountFamily::Direct => {
                let mut merged = Map::new();
                for shard in login.suite_master_split_path() {
                    let response = self.get(&format!("/{shard}"), &[]).await?;
                    match response.body {
                        Value::Object(tables) => merged.extend(tables),
                        _ => return Err(ClientError::UnexpectedPayload("master data shard map")),
                    }
                }
                Ok(MasterPayload::Split(merged))
            }
        }
    }

    async fn download_packed(&self, login: &LoginData) -> Result<MasterPayload> {
        let base = self
            .profile
            .master_data_url
            .as_deref()
            .ok_or(ClientError::NoMasterDataUrl)?;
        let cdn_version = login
            .cdn_version()
            .ok_or(ClientError::MissingField("cdnVersion"))?;
        let url = Url::parse(&format!("{base}/master-data-{cdn_version}.info"))?;

        let mut headers = self.session.headers().clone();
        if let Some(host) = url.host_str() {
            let value = HeaderValue::from_str(host).map_err(|e| ClientError::InvalidHeader {
                name: HOST.to_string(),
                reason: e.to_string(),
            })?;
            headers.insert(HOST, value);
        }

        let mut last_error = None;
        for route in self.routes()? {
            let response = match route
                .client()
                .get(url.clone())
                .headers(headers.clone())
                .send()
                .await
            {
                Ok(response) => response,
                Err(e) => match ClientError::from_send(e, route.label()) {
                    err @ ClientError::ProxyUnreachable { .. } => {
                        warn!("Failed to connect via {}, trying next route", route.label());
                        last_error = Some(err);
                        continue;
                    }
                    err => return Err(err),
                },
            };

            let code = response.status().as_u16();
            let raw = response
                .bytes()
                .await
                .map_err(|e| ClientError::from_send(e, route.label()))?;
            if code != status::OK {
                return Err(ClientError::UnexpectedResponse {
                    status: code,
                    content_type: String::new(),
                    body: String::from_utf8_lossy(&raw[..raw.len().min(512)]).into_owned(),
                });
            }

            info!(
                "{} downloaded master data {} ({} bytes)",
                self.profile.region.tag(),
                cdn_version,
                raw.len()
            );
            return match unpack_blocking(self.profile.codec(), raw).await? {
                Value::Object(tables) => Ok(MasterPayload::Packed(tables)),
                _ => Err(ClientError::UnexpectedPayload("master data table map")),
            };
        }

        Err(last_error.unwrap_or(ClientError::NotInitialized))
    }

    /// Release the transport
    pub fn close(&mut self) {
        self.transport = None;
        self.state = ClientState::Closed;
    }
}

/// Map a caller path onto the API root
pub(crate) fn rewrite_path(path: &str, user_id: Option<i64>) -> Result<String> {
    match path.strip_prefix(USER_PATH_PREFIX) {
        Some(rest) => {
            let user_id = user_id.ok_or(ClientError::UnresolvedUser)?;
            Ok(format!("/api/user/{user_id}{rest}"))
        }
        None => Ok(format!("/api{path}")),
    }
}

async fn pack_blocking(codec: &CryptoCodec, payload: Value) -> Result<Vec<u8>> {
    let codec = codec.clone();
    tokio::task::spawn_blocking(move || codec.pack(&payload))
        .await
        .map_err(|e| ClientError::Worker(e.to_string()))?
        .map_err(Into::into)
}

async fn unpack_blocking(codec: &CryptoCodec, raw: Bytes) -> Result<Value> {
    let codec = codec.clone();
    tokio::task::spawn_blocking(move || codec.unpack(&raw))
        .await
        .map_err(|e| ClientError::Worker(e.to_string()))?
        .map_err(Into::into)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_rewrite_user_path() {
        assert_eq!(
            rewrite_path("/user/%user_id/profile", Some(123)).unwrap(),
            "/api/user/123/profile"
        );
        assert_eq!(
            rewrite_path("/user/%user_id", Some(7)).unwrap(),
            "/api/user/7"
        );
    }

    #[test]
    fn test_rewrite_plain_path() {
        assert_eq!(
            rewrite_path("/event/12/ranking", None).unwrap(),
            "/api/event/12/ranking"
        );
    }

    #[test]
    fn test_rewrite_unresolved_user() {
        assert!(matches!(
            rewrite_path("/user/%user_id/profile", None),
            Err(ClientError::UnresolvedUser)
        ));
    }
}
