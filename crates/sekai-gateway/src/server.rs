//! Process orchestration: context bootstrap, HTTP surface, scheduler and
//! shutdown.

use crate::config::GatewayConfig;
use crate::context::AppContext;
use crate::error::ServerError;
use std::net::SocketAddr;
use std::sync::Arc;

pub struct Gateway {
    ctx: Arc<AppContext>,
    bind: SocketAddr,
}

impl Gateway {
    /// Build the application context and log every pool in.
    ///
    /// # Errors
    ///
    /// Returns `ServerError` if the context cannot be built.
    pub async fn new(config: &GatewayConfig, bind: SocketAddr) -> Result<Self, ServerError> {
        let ctx = AppContext::build(config).await?;
        Ok(Self {
            ctx: Arc::new(ctx),
            bind,
        })
    }

    pub const fn context(&self) -> &Arc<AppContext> {
        &self.ctx
    }

    /// Serve HTTP and run the scheduler until interrupted.
    ///
    /// # Errors
    ///
    /// Returns `ServerError` if binding fails or the shutdown signal cannot
    /// be installed.
    pub async fn run(self) -> Result<(), ServerError> {
        let listener = crate::http::bind(self.bind).await?;

        let http_ctx = Arc::clone(&self.ctx);
        let http_server = tokio::spawn(async move {
            if let Err(e) = crate::http::serve(listener, http_ctx).await {
                tracing::error!("HTTP server failed: {e}");
            }
        });
        let jobs = crate::scheduler::spawn(&self.ctx);

        tokio::signal::ctrl_c().await.map_err(|e| {
            ServerError::Shutdown(format!("Failed to listen for shutdown signal: {e}"))
        })?;

        tracing::info!("Shutdown signal received, stopping gateway");

        http_server.abort();
        for job in jobs {
            job.abort();
        }
        self.ctx.shutdown().await;

        Ok(())
    }
}
