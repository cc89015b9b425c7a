//! HTTP gateway over pooled game accounts.
//!
//! The gateway keeps one [`sekai_protocol::AccountPool`] per enabled region,
//! exposes it over plain HTTP and keeps each region's master data in sync on
//! a schedule.
//!
//! # Architecture
//!
//! - `config`: process flags and the JSON configuration file
//! - `context`: the application context built once at startup
//! - `http`: axum router and handlers
//! - `scheduler`: master check, cookie refresh and app hash jobs
//! - `server`: bootstrap and shutdown
//!
//! # Routes
//!
//! | Route | Result |
//! |---|---|
//! | `GET /api/{region}/{*path}` | pool JSON body with the pool's status |
//! | `GET /image/{region}/{*path}` | `image/jpeg` bytes, or `Error` with the status |
//! | `GET /health` | `{"status":"ok"}` |
//!
//! # Example
//!
//! ```no_run
//! use sekai_gateway::{Gateway, GatewayArgs, GatewayConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     tracing_subscriber::fmt::init();
//!
//!     let args = GatewayArgs::from_args();
//!     let config = GatewayConfig::load(&args.config)?;
//!     config.validate()?;
//!
//!     Gateway::new(&config, args.bind).await?.run().await?;
//!     Ok(())
//! }
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod config;
pub mod context;
pub mod error;
pub mod http;
pub mod scheduler;
pub mod server;

pub use config::{GatewayArgs, GatewayConfig, LogFormat, RegionConfig};
pub use context::AppContext;
pub use error::{AppError, ConfigError, ServerError};
pub use server::Gateway;
