//! Gateway binary entry point.
//!
//! Parses flags, installs logging, loads and validates the configuration
//! file, then runs the gateway until interrupted.

use anyhow::{Context, Result};
use sekai_gateway::{Gateway, GatewayArgs, GatewayConfig, LogFormat};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let args = GatewayArgs::from_args();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    match args.log_format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
    }

    sekai_protocol::ensure_crypto_provider();
    tracing::info!("Sekai gateway starting...");

    let config = GatewayConfig::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    config.validate()?;

    tracing::info!(
        "Configuration loaded: bind={}, regions={:?}",
        args.bind,
        config.enabled_regions().map(|(r, _)| r).collect::<Vec<_>>()
    );

    let gateway = Gateway::new(&config, args.bind).await?;
    gateway.run().await?;

    Ok(())
}
