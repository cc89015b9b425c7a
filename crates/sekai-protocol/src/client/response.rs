//! Response types and status classification

use bytes::Bytes;
use serde_json::{Map, Value};

/// Status codes used by the game API
pub mod status {
    pub const OK: u16 = 200;
    pub const CLIENT_ERROR: u16 = 400;
    pub const SESSION_ERROR: u16 = 403;
    pub const NOT_FOUND: u16 = 404;
    pub const CONFLICT: u16 = 409;
    pub const GAME_UPGRADE: u16 = 426;
    pub const SERVER_ERROR: u16 = 500;
    pub const UNDER_MAINTENANCE: u16 = 503;
}

/// Decrypted API payload with the status it came with
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageBody {
    Data(Bytes),
    /// Fetch failed; the status says why
    Error,
}

/// Result of a raw image fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageResponse {
    pub status: u16,
    pub body: ImageBody,
}

impl ImageResponse {
    pub const fn failed(status: u16) -> Self {
        Self {
            status,
            body: ImageBody::Error,
        }
    }

    /// Body bytes, `"Error"` for a failed fetch
    pub fn bytes(&self) -> Bytes {
        match &self.body {
            ImageBody::Data(data) => data.clone(),
            ImageBody::Error => Bytes::from_static(b"Error"),
        }
    }
}

/// Decrypted login response
#[derive(Debug, Clone, PartialEq)]
pub struct LoginData(Value);

impl LoginData {
    pub const fn new(value: Value) -> Self {
        Self(value)
    }

    fn str_field(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    pub fn session_token(&self) -> Option<&str> {
        self.str_field("sessionToken")
    }

    pub fn data_version(&self) -> Option<&str> {
        self.str_field("dataVersion")
    }

    pub fn asset_version(&self) -> Option<&str> {
        self.str_field("assetVersion")
    }

    pub fn asset_hash(&self) -> Option<&str> {
        self.str_field("assetHash")
    }

    /// Combined content version; some regions send it as a string
    pub fn cdn_version(&self) -> Option<i64> {
        match self.0.get("cdnVersion")? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// User id assigned to a token account
    pub fn registered_user_id(&self) -> Option<i64> {
        self.0
            .get("userRegistration")
            .and_then(|r| r.get("userId"))
            .and_then(Value::as_i64)
    }

    /// Master data shard paths handed out to credential accounts
    pub fn suite_master_split_path(&self) -> Vec<String> {
        self.0
            .get("suiteMasterSplitPath")
            .and_then(Value::as_array)
            .map(|paths| {
                paths
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub const fn raw(&self) -> &Value {
        &self.0
    }

    pub fn into_inner(self) -> Value {
        self.0
    }
}

/// Master data as fetched, before any restoration
#[derive(Debug, Clone, PartialEq)]
pub enum MasterPayload {
    /// Single packed blob from the master data origin; tables are still in
    /// positional or columnar form
    Packed(Map<String, Value>),
    /// Shards already in record form, merged in order
    Split(Map<String, Value>),
}

/// How a response must be handled, decided from status and content type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    Payload,
    SessionExpired,
    CookieExpired,
    UpgradeRequired,
    UnderMaintenance,
    Unexpected,
}

pub(crate) fn is_binary(content_type: &str) -> bool {
    matches!(
        content_type,
        "application/octet-stream" | "binary/octet-stream"
    )
}

/// Media type without parameters, lowercased
pub(crate) fn essence(content_type: Option<&str>) -> String {
    content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase())
        .unwrap_or_default()
}

pub(crate) fn classify(status_code: u16, content_type: &str) -> Outcome {
    if is_binary(content_type) {
        match status_code {
            status::OK | status::CLIENT_ERROR | status::NOT_FOUND | status::CONFLICT => {
                Outcome::Payload
            }
            status::SESSION_ERROR => Outcome::SessionExpired,
            status::GAME_UPGRADE => Outcome::UpgradeRequired,
            status::UNDER_MAINTENANCE => Outcome::UnderMaintenance,
            _ => Outcome::Unexpected,
        }
    } else if status_code == status::SESSION_ERROR && content_type == "text/xml" {
        Outcome::CookieExpired
    } else {
        Outcome::Unexpected
    }
}
