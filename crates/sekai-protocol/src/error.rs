//! Error types for client and pool operations

use sekai_crypto::CryptoError;
use thiserror::Error;

/// Closed set of conditions a failed call can be classified into.
///
/// Callers dispatch on this tag rather than on the concrete error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Condition {
    /// Session token rejected; the client already logged in again
    SessionExpired,
    /// Edge cookie rejected; cookies must be refreshed
    CookieExpired,
    /// Server demands a newer app version
    UpgradeRequired,
    /// Server is under maintenance
    UnderMaintenance,
    /// No configured route could connect
    ProxyUnreachable,
    /// Request exceeded its timeout
    Timeout,
    /// Anything else
    Unknown,
}

impl Condition {
    /// Whether a call failing with this condition may be attempted again
    /// by the same caller.
    pub const fn is_retryable(self) -> bool {
        !matches!(
            self,
            Self::UpgradeRequired | Self::CookieExpired | Self::UnderMaintenance
        )
    }
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Session expired")]
    SessionExpired,

    #[error("Cookie expired")]
    CookieExpired,

    #[error("App upgrade required")]
    UpgradeRequired,

    #[error("Game server is under maintenance")]
    UnderMaintenance,

    #[error("Proxy {proxy} unreachable: {source}")]
    ProxyUnreachable {
        /// Route that failed, `direct` when no proxy was used
        proxy: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Timeout")]
    Timeout,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected response: status {status}, content type {content_type}")]
    UnexpectedResponse {
        status: u16,
        content_type: String,
        body: String,
    },

    #[error("Login failed with status {0}")]
    LoginFailed(u16),

    #[error("Envelope error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Invalid header {name}: {reason}")]
    InvalidHeader { name: String, reason: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Missing field in response: {0}")]
    MissingField(&'static str),

    #[error("Unexpected payload: expected {0}")]
    UnexpectedPayload(&'static str),

    #[error("Client has no resolved user id")]
    UnresolvedUser,

    #[error("Region has no master data URL configured")]
    NoMasterDataUrl,

    #[error("Client is not initialized")]
    NotInitialized,

    #[error("Unknown region: {0}")]
    UnknownRegion(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Worker task failed: {0}")]
    Worker(String),
}

impl ClientError {
    /// Classify this error
    pub const fn condition(&self) -> Condition {
        match self {
            Self::SessionExpired => Condition::SessionExpired,
            Self::CookieExpired => Condition::CookieExpired,
            Self::UpgradeRequired => Condition::UpgradeRequired,
            Self::UnderMaintenance => Condition::UnderMaintenance,
            Self::ProxyUnreachable { .. } => Condition::ProxyUnreachable,
            Self::Timeout => Condition::Timeout,
            _ => Condition::Unknown,
        }
    }

    /// Check if error is retryable
    pub const fn should_retry(&self) -> bool {
        self.condition().is_retryable()
    }

    /// Map a transport error from a send on `proxy`
    pub(crate) fn from_send(source: reqwest::Error, proxy: &str) -> Self {
        if source.is_timeout() {
            Self::Timeout
        } else if source.is_connect() {
            Self::ProxyUnreachable {
                proxy: proxy.to_string(),
                source,
            }
        } else {
            Self::Http(source)
        }
    }
}

/// Errors raised by [`AccountPool`](crate::AccountPool)
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("No client is available, please try again later.")]
    Busy,

    #[error("Pool has no clients")]
    Empty,

    #[error(transparent)]
    Client(#[from] ClientError),
}

impl PoolError {
    /// Condition of the underlying client error, if any
    pub const fn condition(&self) -> Option<Condition> {
        match self {
            Self::Client(e) => Some(e.condition()),
            Self::Busy | Self::Empty => None,
        }
    }

    /// Conditions the pool can repair region-wide before trying again
    pub const fn is_remediable(&self) -> bool {
        matches!(
            self.condition(),
            Some(Condition::CookieExpired | Condition::UpgradeRequired)
        )
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
