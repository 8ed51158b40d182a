//! Log store error types.

use std::path::PathBuf;

use crate::pool::PoolError;

/// Errors that can occur during log store operations.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// No pooled connection could be obtained.
    #[error("Connection pool error: {0}")]
    Pool(#[from] PoolError),

    /// Failed to open or create database.
    #[error("Failed to open database at {path}: {source}")]
    DatabaseOpen {
        path: PathBuf,
        #[source]
        source: PoolError,
    },

    /// Failed to execute SQL.
    #[error("Database query failed: {0}")]
    Query(#[from] rusqlite::Error),

    /// A record field could not be encoded for its JSON column.
    #[error("Failed to encode {field}: {source}")]
    Encode {
        field: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// Blocking task was cancelled.
    #[error("Blocking task cancelled")]
    TaskCancelled,

    /// Failed to create parent directory.
    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
