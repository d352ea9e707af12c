//! Error types for repscore-core

use thiserror::Error;

/// Main error type for the repscore-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Business id is not present in the raw business table
    #[error("business not found: {0}")]
    BusinessNotFound(i64),

    /// Industry has no benchmark row
    #[error("benchmark not found for industry: {0}")]
    BenchmarkNotFound(String),

    /// A recompute stage failed; nothing was swapped in
    #[error("recompute aborted during {stage}: {message}")]
    ComputationAborted { stage: String, message: String },
}

impl Error {
    /// Whether this error means "the requested entity does not exist".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::BusinessNotFound(_) | Error::BenchmarkNotFound(_))
    }
}

/// Result type alias for repscore-core
pub type Result<T> = std::result::Result<T, Error>;
