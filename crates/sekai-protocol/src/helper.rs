//! Region-wide cookie and version sources shared by all clients of a pool.
//!
//! Both helpers guard their fetch with a try-lock: when a fetch is already
//! running the caller returns immediately and later reads whatever value is
//! in place.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::Result;

/// Public signature endpoint that issues edge cookies
pub const DEFAULT_COOKIE_URL: &str = "https://issue.sekai.colorfulpalette.org/api/signature";

/// Fetches short-lived edge cookies for the region that needs them
#[derive(Debug)]
pub struct CookieHelper {
    url: String,
    http: reqwest::Client,
    cookie: RwLock<Option<String>>,
    fetch: Mutex<()>,
}

impl CookieHelper {
    pub fn new(url: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            url: url.into(),
            http,
            cookie: RwLock::new(None),
            fetch: Mutex::new(()),
        }
    }

    /// Request a new cookie unless another caller is already doing so
    pub async fn refresh(&self) -> Result<()> {
        let Ok(_guard) = self.fetch.try_lock() else {
            debug!("Cookie fetch already in progress, reusing current value");
            return Ok(());
        };

        let response = self
            .http
            .post(&self.url)
            .header("Accept", "*/*")
            .header("User-Agent", "ProductName/134 CFNetwork/1408.0.4 Darwin/22.5.0")
            .header("Connection", "keep-alive")
            .header("Accept-Language", "zh-CN,zh-Hans;q=0.9")
            .header("Accept-Encoding", "gzip, deflate, br")
            .header("X-Unity-Version", "2022.3.21f1")
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::OK {
            if let Some(cookie) = response
                .headers()
                .get(reqwest::header::SET_COOKIE)
                .and_then(|v| v.to_str().ok())
            {
                *self.cookie.write() = Some(cookie.to_string());
                info!("Edge cookies refreshed");
            }
        } else {
            warn!("Cookie endpoint returned {}", response.status());
        }

        Ok(())
    }

    /// Last cookie obtained, if any
    pub fn cookie(&self) -> Option<String> {
        self.cookie.read().clone()
    }
}

/// Version stamps the client must present
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionStamps {
    pub app_version: String,
    pub app_hash: String,
    pub data_version: String,
    pub asset_version: String,
}

/// Reads version stamps from the region's version file
#[derive(Debug)]
pub struct VersionHelper {
    path: PathBuf,
    stamps: RwLock<Option<VersionStamps>>,
    fetch: Mutex<()>,
}

impl VersionHelper {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            stamps: RwLock::new(None),
            fetch: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-read the version file unless another caller is already doing so
    pub async fn refresh(&self) -> Result<()> {
        let Ok(_guard) = self.fetch.try_lock() else {
            debug!("Version read already in progress, reusing current value");
            return Ok(());
        };

        let raw = tokio::fs::read(&self.path).await?;
        let stamps: VersionStamps = serde_json::from_slice(&raw)?;
        debug!(
            "Loaded app version {} from {}",
            stamps.app_version,
            self.path.display()
        );
        *self.stamps.write() = Some(stamps);
        Ok(())
    }

    pub fn current(&self) -> Option<VersionStamps> {
        self.stamps.read().clone()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_version_helper_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("current_version.json");
        std::fs::write(
            &file,
            r#"{"appVersion":"5.1.0","appHash":"abc","dataVersion":"5.1.0.30","assetVersion":"5.1.0.31","assetHash":"ignored"}"#,
        )
        .unwrap();

        let helper = VersionHelper::new(&file);
        assert!(helper.current().is_none());
        helper.refresh().await.unwrap();

        let stamps = helper.current().unwrap();
        assert_eq!(stamps.app_version, "5.1.0");
        assert_eq!(stamps.data_version, "5.1.0.30");
    }

    #[tokio::test]
    async fn test_version_helper_skips_when_busy() {
        let helper = VersionHelper::new("/nonexistent/current_version.json");
        let _held = helper.fetch.try_lock().unwrap();
        // would fail reading the file if it did not skip
        helper.refresh().await.unwrap();
        assert!(helper.current().is_none());
    }

    #[tokio::test]
    async fn test_cookie_helper_stores_set_cookie() {
        crate::transport::ensure_crypto_provider();
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/signature"))
            .and(header("X-Unity-Version", "2022.3.21f1"))
            .respond_with(
                ResponseTemplate::new(200).insert_header("Set-Cookie", "CloudFront-Policy=xyz"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let helper = CookieHelper::new(
            format!("{}/api/signature", server.uri()),
            reqwest::Client::new(),
        );
        helper.refresh().await.unwrap();
        assert_eq!(helper.cookie().as_deref(), Some("CloudFront-Policy=xyz"));
    }

    #[tokio::test]
    async fn test_cookie_helper_keeps_value_on_failure() {
        crate::transport::ensure_crypto_provider();
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let helper = CookieHelper::new(server.uri(), reqwest::Client::new());
        *helper.cookie.write() = Some("old".to_string());
        helper.refresh().await.unwrap();
        assert_eq!(helper.cookie().as_deref(), Some("old"));
    }
}
