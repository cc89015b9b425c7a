//! # sekai-protocol - Encrypted game API client and account pooling
//!
//! This crate talks to the regional game servers on behalf of a set of game
//! accounts. Every request and response body is a MessagePack document
//! sealed with [`sekai_crypto::CryptoCodec`].
//!
//! ## Architecture Overview
//!
//! 1. **Protocol client** ([`ProtocolClient`]): one account's session. It
//!    handles login, header bookkeeping, response classification, proxy
//!    failover and the bounded retry around each call.
//! 2. **Account pool** ([`AccountPool`]): a region's clients behind per-client
//!    mutexes. Callers borrow one free client at a time; the pool repairs
//!    region-wide conditions (expired cookies, stale app version) before
//!    trying again and turns everything else into a degraded JSON response.
//! 3. **Shared helpers** ([`CookieHelper`], [`VersionHelper`]): region-wide
//!    sources that collapse concurrent refreshes into a single fetch.
//!
//! ## Response Classification
//!
//! | Status | Binary body | Result |
//! |---|---|---|
//! | 200, 400, 404, 409 | yes | decrypted payload with its status |
//! | 403 | yes | [`Condition::SessionExpired`], after logging in again |
//! | 403 | `text/xml` | [`Condition::CookieExpired`], after refreshing cookies |
//! | 426 | yes | [`Condition::UpgradeRequired`] |
//! | 503 | yes | [`Condition::UnderMaintenance`] |
//! | anything else | | [`Condition::Unknown`] |
//!
//! Calls are retried up to four times with a one second pause, except for
//! upgrade, cookie and maintenance conditions which go straight back to the
//! caller.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use sekai_protocol::{
//!     AccountPool, ClientOptions, Region, ServerProfile, VersionHelper, load_accounts,
//! };
//! use sekai_crypto::CryptoCodec;
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let codec = CryptoCodec::from_hex(
//!         "000102030405060708090a0b0c0d0e0f",
//!         "0f0e0d0c0b0a09080706050403020100",
//!     )?;
//!     let profile = ServerProfile::new(Region::Tw, "https://api.example.com", codec);
//!
//!     let mut pool = AccountPool::new(
//!         profile,
//!         ClientOptions::from_env(),
//!         VersionHelper::new("versions/tw/current_version.json"),
//!     );
//!     let accounts = load_accounts(Path::new("accounts/tw"), Region::Tw.family()).await?;
//!     pool.init_all(accounts).await?;
//!
//!     let (body, status) = pool.api_get("/system", &[]).await;
//!     println!("{status}: {body}");
//!
//!     pool.shutdown_all().await;
//!     Ok(())
//! }
//! ```

pub mod account;
pub mod client;
pub mod config;
pub mod error;
pub mod helper;
pub mod pool;
pub mod region;
pub mod retry;
pub mod session;
pub mod transport;

pub use account::{Account, DirectAccount, TokenAccount, load_accounts};
pub use client::{
    ApiResponse, ClientState, ImageBody, ImageResponse, LoginData, MasterPayload, ProtocolClient,
};
pub use config::{ClientOptions, ServerProfile};
pub use error::{ClientError, Condition, PoolError, Result};
pub use helper::{CookieHelper, DEFAULT_COOKIE_URL, VersionHelper, VersionStamps};
pub use pool::{AccountPool, ClientGuard};
pub use region::{AccountFamily, Region};
pub use retry::RetryPolicy;
pub use transport::ensure_crypto_provider;
