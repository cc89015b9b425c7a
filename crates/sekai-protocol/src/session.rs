//! Per-client session headers
//!
//! Header names are kept lowercase; HTTP treats them case-insensitively.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::collections::BTreeMap;

use crate::error::{ClientError, Result};
use crate::helper::VersionStamps;

pub const SESSION_TOKEN: &str = "x-session-token";
pub const REQUEST_ID: &str = "x-request-id";
pub const DATA_VERSION: &str = "x-data-version";
pub const ASSET_VERSION: &str = "x-asset-version";
pub const APP_VERSION: &str = "x-app-version";
pub const APP_HASH: &str = "x-app-hash";
pub const COOKIE: &str = "cookie";

/// Mutable header state owned by one client
#[derive(Debug, Clone, Default)]
pub struct Session {
    headers: HeaderMap,
    user_id: Option<i64>,
}

impl Session {
    /// Start a session from the region's header template
    pub fn from_template(template: &BTreeMap<String, String>, user_id: Option<i64>) -> Result<Self> {
        let mut session = Self {
            headers: HeaderMap::with_capacity(template.len() + 8),
            user_id,
        };
        for (name, value) in template {
            session.set(name, value)?;
        }
        Ok(session)
    }

    /// Insert or overwrite a header
    pub fn set(&mut self, name: &str, value: &str) -> Result<()> {
        let header = HeaderName::from_bytes(name.as_bytes()).map_err(|e| invalid(name, &e))?;
        let value = HeaderValue::from_str(value).map_err(|e| invalid(name, &e))?;
        self.headers.insert(header, value);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn session_token(&self) -> Option<&str> {
        self.get(SESSION_TOKEN)
    }

    /// Stamp a fresh correlation id and return it
    pub fn new_request_id(&mut self) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        if let Ok(value) = HeaderValue::from_str(&id) {
            self.headers.insert(REQUEST_ID, value);
        }
        id
    }

    /// Copy a session token returned by the server
    pub fn capture_token(&mut self, headers: &HeaderMap) {
        if let Some(token) = headers.get(SESSION_TOKEN) {
            self.headers.insert(SESSION_TOKEN, token.clone());
        }
    }

    pub fn apply_version(&mut self, stamps: &VersionStamps) -> Result<()> {
        self.set(APP_VERSION, &stamps.app_version)?;
        self.set(APP_HASH, &stamps.app_hash)?;
        self.set(DATA_VERSION, &stamps.data_version)?;
        self.set(ASSET_VERSION, &stamps.asset_version)
    }

    pub const fn user_id(&self) -> Option<i64> {
        self.user_id
    }

    pub fn set_user_id(&mut self, user_id: i64) {
        self.user_id = Some(user_id);
    }
}

fn invalid(name: &str, reason: &dyn std::fmt::Display) -> ClientError {
    ClientError::InvalidHeader {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}
