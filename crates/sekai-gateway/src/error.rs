//! Error types for the gateway.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use sekai_master::MasterError;
use sekai_protocol::{ClientError, Region};
use serde_json::json;
use std::path::PathBuf;
use thiserror::Error;

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file could not be read
    #[error("Failed to read configuration from {path}: {source}")]
    ReadFailed {
        /// Path to the configuration file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Configuration file is not valid JSON for the expected shape
    #[error("Invalid configuration: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// Region key or IV has the wrong format or length
    #[error("Invalid {field} for region {region}: {reason}")]
    InvalidKey {
        region: Region,
        field: &'static str,
        reason: String,
    },

    /// Missing required configuration value
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

/// Server runtime errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind HTTP server
    #[error("Failed to bind HTTP server to {addr}: {source}")]
    HttpBindFailed {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Client error: {0}")]
    Client(#[from] ClientError),

    #[error("Master data error: {0}")]
    Master(#[from] MasterError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server shutdown error: {0}")]
    Shutdown(String),
}

/// Errors surfaced by HTTP handlers.
#[derive(Debug, Error)]
pub enum AppError {
    /// Region unknown or not enabled (404)
    #[error("Region {0} is not available")]
    RegionNotFound(String),

    /// Bearer token missing or wrong (401)
    #[error("Unauthorized")]
    Unauthorized,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            Self::RegionNotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
        };
        let body = json!({"result": "failed", "message": self.to_string()});
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_status() {
        assert_eq!(
            AppError::RegionNotFound("us".to_string())
                .into_response()
                .status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Unauthorized.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn test_server_error_conversion() {
        let err: ServerError = ConfigError::MissingRequired("servers".to_string()).into();
        assert!(err.to_string().contains("servers"));
    }
}
