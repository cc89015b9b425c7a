//! Shared fixtures for protocol integration tests

#![allow(dead_code, clippy::unwrap_used)]

use sekai_crypto::CryptoCodec;
use sekai_protocol::{
    Account, ClientOptions, DirectAccount, Region, RetryPolicy, ServerProfile, TokenAccount,
    VersionHelper,
};
use serde_json::Value;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::ResponseTemplate;

pub const KEY_HEX: &str = "6732666343305a637a4e394d544a3631";
pub const IV_HEX: &str = "6d737833495630693958453575595a31";

pub fn codec() -> CryptoCodec {
    CryptoCodec::from_hex(KEY_HEX, IV_HEX).unwrap()
}

/// Encrypted binary response carrying `payload`
pub fn sealed(status: u16, payload: &Value) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_raw(codec().pack(payload).unwrap(), "application/octet-stream")
}

pub fn profile(region: Region, uri: &str) -> ServerProfile {
    ServerProfile::new(region, uri, codec())
}

/// Options with no settle delay and a 1 ms retry backoff
pub fn fast_options() -> ClientOptions {
    ClientOptions {
        settle_delay: Duration::ZERO,
        retry: RetryPolicy {
            max_attempts: 4,
            backoff: Duration::from_millis(1),
            jitter: false,
        },
        ..ClientOptions::default()
    }
}

/// Version file in a fresh temp dir
pub fn version_file() -> (TempDir, VersionHelper) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("current_version.json");
    std::fs::write(
        &path,
        r#"{"appVersion":"5.0.0","appHash":"apphash","dataVersion":"5.0.0.10","assetVersion":"5.0.0.20"}"#,
    )
    .unwrap();
    (dir, VersionHelper::new(path))
}

pub fn direct(user_id: i64) -> Account {
    Account::Direct(DirectAccount {
        user_id,
        credential: format!("credential-{user_id}"),
        device_id: None,
    })
}

pub fn token(access_token: &str) -> Account {
    Account::Token(TokenAccount {
        access_token: access_token.to_string(),
        user_id: 0,
        device_id: None,
    })
}
