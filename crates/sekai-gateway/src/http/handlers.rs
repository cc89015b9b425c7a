//! HTTP request handlers.

use crate::context::AppContext;
use crate::error::AppError;
use axum::{
    Json,
    extract::{Path, Query, Request, State},
    http::{StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use sekai_protocol::{AccountPool, ImageBody, Region};
use serde_json::json;
use std::sync::Arc;

fn pool(ctx: &AppContext, region: &str) -> Result<Arc<AccountPool>, AppError> {
    region
        .parse::<Region>()
        .ok()
        .and_then(|region| ctx.pool(region).cloned())
        .ok_or_else(|| AppError::RegionNotFound(region.to_string()))
}

/// Handle GET /api/{region}/{*path}.
///
/// Forwards to the region's pool and returns its JSON body and status.
///
/// # Errors
///
/// Returns `AppError` if the region is unknown or not enabled.
pub async fn handle_api(
    Path((region, path)): Path<(String, String)>,
    Query(params): Query<Vec<(String, String)>>,
    State(ctx): State<Arc<AppContext>>,
) -> Result<Response, AppError> {
    let pool = pool(&ctx, &region)?;
    tracing::debug!("{} GET /{}", pool.region().tag(), path);

    let (body, status) = pool.api_get(&format!("/{path}"), &params).await;
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    Ok((status, Json(body)).into_response())
}

/// Handle GET /image/{region}/{*path}.
///
/// # Errors
///
/// Returns `AppError` if the region is unknown or not enabled.
pub async fn handle_image(
    Path((region, path)): Path<(String, String)>,
    State(ctx): State<Arc<AppContext>>,
) -> Result<Response, AppError> {
    let pool = pool(&ctx, &region)?;
    let image = pool.image_get(&format!("/{path}")).await;
    let status = StatusCode::from_u16(image.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    Ok(match image.body {
        ImageBody::Data(bytes) => {
            (status, [(header::CONTENT_TYPE, "image/jpeg")], bytes).into_response()
        }
        ImageBody::Error => (status, "Error").into_response(),
    })
}

/// Handle GET /health.
pub async fn handle_health() -> Json<serde_json::Value> {
    Json(json!({"status": "ok"}))
}

/// Reject requests without the configured bearer token.
///
/// # Errors
///
/// Returns `AppError::Unauthorized` on a missing or wrong token.
pub async fn require_bearer(
    State(ctx): State<Arc<AppContext>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if let Some(expected) = ctx.auth_token() {
        let presented = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "));
        if presented != Some(expected) {
            return Err(AppError::Unauthorized);
        }
    }
    Ok(next.run(request).await)
}
