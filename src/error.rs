//! Error types for the Pilum library.
//!
//! All fallible operations return [`PilumError`] through the crate-wide [`Result`]
//! alias. The variants follow the failure taxonomy of query evaluation:
//!
//! - configuration errors (unsupported operator/model pairs, malformed operator
//!   parameters, bad parameter files) are fatal and never retried;
//! - lookup errors (unknown or ambiguous document ids) are fatal for the request
//!   that triggered them;
//! - store errors surface failures of the posting store to the caller.
//!
//! "Not applicable" results (for example a feature computed over an empty term
//! vector) are not errors; they are reported as `None`.
//!
//! # Examples
//!
//! ```
//! use pilum::error::{PilumError, Result};
//!
//! fn check_distance(distance: u32) -> Result<()> {
//!     if distance < 1 {
//!         return Err(PilumError::configuration("distance must be at least 1"));
//!     }
//!     Ok(())
//! }
//!
//! assert!(check_distance(0).unwrap_err().is_configuration());
//! ```

use std::io;

use thiserror::Error;

/// The main error type for Pilum operations.
#[derive(Error, Debug)]
pub enum PilumError {
    /// I/O errors (parameter files, query files, run output)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Invalid configuration: unsupported operator/model pairs, bad operator
    /// parameters, missing or malformed run parameters.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Query text could not be parsed.
    #[error("Query error: {0}")]
    Query(String),

    /// A document id could not be resolved.
    #[error("Lookup error: {0}")]
    Lookup(String),

    /// The posting store failed to answer a request.
    #[error("Store error: {0}")]
    Store(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error for other cases
    #[error("Error: {0}")]
    Other(String),

    /// Generic anyhow error
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Result type alias for operations that may fail with PilumError.
pub type Result<T> = std::result::Result<T, PilumError>;

impl PilumError {
    /// Create a new configuration error.
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        PilumError::Configuration(msg.into())
    }

    /// Create a configuration error for an operator the model cannot score.
    pub fn unsupported(operator: &str, model: &str) -> Self {
        PilumError::Configuration(format!("{model} doesn't support the {operator} operator"))
    }

    /// Create a new query error.
    pub fn query<S: Into<String>>(msg: S) -> Self {
        PilumError::Query(msg.into())
    }

    /// Create a new parse error.
    pub fn parse<S: Into<String>>(msg: S) -> Self {
        PilumError::Query(msg.into()) // Parse errors are treated as query errors
    }

    /// Create a new lookup error.
    pub fn lookup<S: Into<String>>(msg: S) -> Self {
        PilumError::Lookup(msg.into())
    }

    /// Create a new store error.
    pub fn store<S: Into<String>>(msg: S) -> Self {
        PilumError::Store(msg.into())
    }

    /// Create a new generic error.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        PilumError::Other(msg.into())
    }

    /// Whether this error is a configuration error.
    pub fn is_configuration(&self) -> bool {
        matches!(self, PilumError::Configuration(_))
    }

    /// Whether this error is a lookup error.
    pub fn is_lookup(&self) -> bool {
        matches!(self, PilumError::Lookup(_))
    }
}
