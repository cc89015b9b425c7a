//! Region profiles and client options

use sekai_crypto::CryptoCodec;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::region::Region;
use crate::retry::RetryPolicy;

/// Static description of one region's deployment.
///
/// Loaded once and shared read-only by every client of the region.
#[derive(Debug, Clone)]
pub struct ServerProfile {
    /// Region this profile describes
    pub region: Region,

    /// API origin, e.g. `https://api.example.com`
    pub api_url: String,

    /// Origin serving packed master data (token regions only)
    pub master_data_url: Option<String>,

    /// Whether requests need edge cookies
    pub require_cookies: bool,

    /// Headers sent with every request before session values are applied
    pub headers: BTreeMap<String, String>,

    /// Disabled regions get no pool
    pub enabled: bool,

    codec: CryptoCodec,
}

impl ServerProfile {
    pub fn new(region: Region, api_url: impl Into<String>, codec: CryptoCodec) -> Self {
        Self {
            region,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            master_data_url: None,
            require_cookies: false,
            headers: BTreeMap::new(),
            enabled: true,
            codec,
        }
    }

    #[must_use]
    pub fn with_master_data_url(mut self, url: impl Into<String>) -> Self {
        self.master_data_url = Some(url.into().trim_end_matches('/').to_string());
        self
    }

    #[must_use]
    pub fn with_cookies(mut self, require: bool) -> Self {
        self.require_cookies = require;
        self
    }

    #[must_use]
    pub fn with_headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Envelope codec for this region's key and IV
    pub const fn codec(&self) -> &CryptoCodec {
        &self.codec
    }
}

/// Transport and retry settings shared by all clients of a pool
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Timeout for API calls
    pub timeout: Duration,

    /// Timeout for the login call
    pub login_timeout: Duration,

    /// Connect timeout per route
    pub connect_timeout: Duration,

    /// Outer retry around every API call
    pub retry: RetryPolicy,

    /// Pause after a cookie or version refresh before the values are read
    pub settle_delay: Duration,

    /// Outbound proxies tried in order; an empty entry means direct
    pub proxies: Vec<String>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            login_timeout: Duration::from_secs(20),
            connect_timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
            settle_delay: Duration::from_secs(1),
            proxies: Vec::new(),
        }
    }
}

impl ClientOptions {
    /// Defaults with the retry policy taken from the environment
    pub fn from_env() -> Self {
        Self {
            retry: RetryPolicy::from_env(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_proxies(mut self, proxies: Vec<String>) -> Self {
        self.proxies = proxies;
        self
    }
}
