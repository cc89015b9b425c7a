//! Gateway configuration.
//!
//! Two layers:
//! - process flags ([`GatewayArgs`]), from the command line or
//!   `SEKAI_GATEWAY_*` environment variables
//! - the JSON configuration file ([`GatewayConfig`]) describing regions,
//!   collaborators and schedules
//!
//! # Example
//!
//! ```no_run
//! use sekai_gateway::{GatewayArgs, GatewayConfig};
//!
//! let args = GatewayArgs::from_args();
//! let config = GatewayConfig::load(&args.config).expect("Invalid configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Gateway will bind to: {}", args.bind);
//! println!("Enabled regions: {:?}", config.enabled_regions().collect::<Vec<_>>());
//! ```

use clap::{Parser, ValueEnum};
use sekai_crypto::CryptoCodec;
use sekai_master::{AppHashSource, AssetUpdaterTarget};
use sekai_protocol::{
    AccountFamily, ClientOptions, DEFAULT_COOKIE_URL, Region, RetryPolicy, ServerProfile,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Process flags
#[derive(Debug, Clone, Parser)]
#[command(
    name = "sekai-gateway",
    about = "HTTP gateway over pooled game accounts",
    version
)]
pub struct GatewayArgs {
    /// Path to the JSON configuration file
    #[arg(long, env = "SEKAI_GATEWAY_CONFIG", default_value = "./gateway.json")]
    pub config: PathBuf,

    /// HTTP bind address
    #[arg(long, env = "SEKAI_GATEWAY_BIND", default_value = "0.0.0.0:9999")]
    pub bind: SocketAddr,

    /// Log filter used when `RUST_LOG` is not set
    #[arg(long, env = "SEKAI_GATEWAY_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format
    #[arg(long, env = "SEKAI_GATEWAY_LOG_FORMAT", value_enum, default_value = "text")]
    pub log_format: LogFormat,
}

impl GatewayArgs {
    #[must_use]
    pub fn from_args() -> Self {
        Self::parse()
    }
}

/// Contents of the JSON configuration file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Outbound proxies tried in order; `""` means a direct connection
    #[serde(default)]
    pub proxies: Vec<String>,

    #[serde(default = "default_cookie_url")]
    pub cookie_url: String,

    /// Bearer token required on the API and image routes
    #[serde(default)]
    pub auth_token: Option<String>,

    #[serde(default)]
    pub asset_updaters: Vec<AssetUpdaterTarget>,

    #[serde(default)]
    pub app_hash_sources: Vec<AppHashSource>,

    #[serde(default)]
    pub git: GitConfig,

    #[serde(default)]
    pub schedule: ScheduleConfig,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub servers: BTreeMap<Region, RegionConfig>,
}

fn default_cookie_url() -> String {
    DEFAULT_COOKIE_URL.to_string()
}

const fn default_true() -> bool {
    true
}

/// Credentials for publishing dataset repositories
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GitConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub proxy: Option<String>,
}

/// Job intervals in seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub master_check_secs: u64,
    pub cookie_refresh_secs: u64,
    pub app_hash_check_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            master_check_secs: 60,
            cookie_refresh_secs: 72_000,
            app_hash_check_secs: 600,
        }
    }
}

/// Outbound HTTP timeouts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub login_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    /// Pause after a cookie or version refresh
    pub settle_delay_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            login_timeout_secs: 20,
            connect_timeout_secs: 10,
            settle_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            backoff_ms: 1000,
        }
    }
}

/// One region's deployment and local directories
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub api_url: String,
    #[serde(default)]
    pub master_data_url: Option<String>,
    #[serde(default)]
    pub require_cookies: bool,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    pub aes_key_hex: String,
    pub aes_iv_hex: String,
    pub accounts_dir: PathBuf,
    pub master_dir: PathBuf,
    pub version_dir: PathBuf,
    #[serde(default)]
    pub repository_dir: Option<PathBuf>,
    #[serde(default)]
    pub sync_enabled: bool,
}

impl RegionConfig {
    /// Build the shared profile for this region
    pub fn profile(&self, region: Region) -> Result<ServerProfile, ConfigError> {
        let codec = CryptoCodec::from_hex(&self.aes_key_hex, &self.aes_iv_hex).map_err(|e| {
            ConfigError::InvalidKey {
                region,
                field: "aes_key_hex",
                reason: e.to_string(),
            }
        })?;

        let mut profile = ServerProfile::new(region, &self.api_url, codec)
            .with_cookies(self.require_cookies)
            .with_headers(self.headers.clone())
            .with_enabled(self.enabled);
        if let Some(url) = &self.master_data_url {
            profile = profile.with_master_data_url(url);
        }
        Ok(profile)
    }

    /// Path of the region's current version record
    pub fn version_file(&self) -> PathBuf {
        self.version_dir.join(sekai_master::CURRENT_VERSION_FILE)
    }

    fn validate(&self, region: Region) -> Result<(), ConfigError> {
        check_hex(region, "aes_key_hex", &self.aes_key_hex, &[16, 32])?;
        check_hex(region, "aes_iv_hex", &self.aes_iv_hex, &[16])?;

        if self.api_url.trim().is_empty() {
            return Err(ConfigError::MissingRequired(format!(
                "api_url for region {region}"
            )));
        }
        if self.sync_enabled
            && region.family() == AccountFamily::Token
            && self.master_data_url.is_none()
        {
            return Err(ConfigError::MissingRequired(format!(
                "master_data_url for region {region}"
            )));
        }
        Ok(())
    }
}

fn check_hex(
    region: Region,
    field: &'static str,
    value: &str,
    lengths: &[usize],
) -> Result<(), ConfigError> {
    let bytes = hex::decode(value).map_err(|e| ConfigError::InvalidKey {
        region,
        field,
        reason: e.to_string(),
    })?;
    if lengths.contains(&bytes.len()) {
        Ok(())
    } else {
        Err(ConfigError::InvalidKey {
            region,
            field,
            reason: format!("{} bytes, expected one of {:?}", bytes.len(), lengths),
        })
    }
}

impl GatewayConfig {
    /// Read and parse a configuration file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Validate configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if, for an enabled region:
    /// - the key is not 16 or 32 bytes of hex, or the IV not 16
    /// - `api_url` is empty
    /// - a token region syncs master data without `master_data_url`
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (&region, server) in &self.servers {
            if server.enabled {
                server.validate(region)?;
            }
        }
        if self.git.enabled && self.git.username.is_empty() {
            return Err(ConfigError::MissingRequired("git.username".to_string()));
        }
        Ok(())
    }

    pub fn enabled_regions(&self) -> impl Iterator<Item = (Region, &RegionConfig)> {
        self.servers
            .iter()
            .filter(|(_, server)| server.enabled)
            .map(|(&region, server)| (region, server))
    }

    /// Transport and retry settings for every pool
    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            timeout: Duration::from_secs(self.http.timeout_secs),
            login_timeout: Duration::from_secs(self.http.login_timeout_secs),
            connect_timeout: Duration::from_secs(self.http.connect_timeout_secs),
            settle_delay: Duration::from_millis(self.http.settle_delay_ms),
            retry: RetryPolicy {
                max_attempts: self.retry.max_attempts,
                backoff: Duration::from_millis(self.retry.backoff_ms),
                jitter: false,
            },
            proxies: self.proxies.clone(),
        }
    }
}
