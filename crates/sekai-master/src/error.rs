//! Error types for master data handling

use sekai_protocol::{PoolError, Region};
use thiserror::Error;

/// Structural problem found while restoring one table
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("expected an array for {0}")]
    NotAnArray(String),

    #[error("expected an object for {0}")]
    NotAnObject(String),

    #[error("column {column} has no enum entry at index {index}")]
    EnumIndex { column: String, index: String },

    #[error("record has no identity field {0}")]
    MissingIdentity(String),
}

#[derive(Debug, Error)]
pub enum MasterError {
    #[error("Failed to decode table {table}: {source}")]
    Decode {
        table: String,
        #[source]
        source: DecodeError,
    },

    #[error("Invalid schema: {0}")]
    Schema(String),

    #[error("Invalid version string {0:?}")]
    InvalidVersion(String),

    #[error("Server did not report {0}")]
    MissingVersion(&'static str),

    #[error("Region {0} is not configured")]
    UnknownRegion(Region),

    #[error("Region {0} has no repository")]
    NoRepository(Region),

    #[error("git {command} failed: {stderr}")]
    Git { command: String, stderr: String },

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Worker task failed: {0}")]
    Worker(String),
}

impl MasterError {
    pub(crate) fn decode(table: &str, source: DecodeError) -> Self {
        Self::Decode {
            table: table.to_string(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, MasterError>;
