//! HTTP surface using axum.

use crate::context::AppContext;
use crate::error::ServerError;
use axum::Router;
use axum::routing::get;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod handlers;

/// Create HTTP router with all endpoints.
///
/// The API and image routes require the bearer token when one is configured;
/// `/health` is always open.
pub fn create_router(ctx: Arc<AppContext>) -> Router {
    let protected = Router::new()
        .route("/api/{region}/{*path}", get(handlers::handle_api))
        .route("/image/{region}/{*path}", get(handlers::handle_image))
        .route_layer(axum::middleware::from_fn_with_state(
            Arc::clone(&ctx),
            handlers::require_bearer,
        ));

    Router::new()
        .route("/health", get(handlers::handle_health))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

/// Bind the listener for the HTTP surface.
///
/// # Errors
///
/// Returns `ServerError` if the address cannot be bound.
pub async fn bind(addr: SocketAddr) -> Result<tokio::net::TcpListener, ServerError> {
    tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::HttpBindFailed { addr, source })
}

/// Serve the router on an already bound listener.
///
/// # Errors
///
/// Returns `ServerError` if the server stops with an error.
pub async fn serve(listener: tokio::net::TcpListener, ctx: Arc<AppContext>) -> Result<(), ServerError> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("HTTP server listening on {}", addr);
    }

    axum::serve(listener, create_router(ctx))
        .await
        .map_err(|e| ServerError::Shutdown(format!("HTTP server error: {e}")))
}
