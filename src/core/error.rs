//! Error types for pokedb
//!
//! This module provides structured error handling using thiserror.
//! The taxonomy distinguishes transient fetch failures (retried inside the
//! client), terminal per-entity failures (collected by the runner), fatal
//! discovery failures (abort the run) and internal contract violations.

use thiserror::Error;

/// Result type alias for pokedb operations
pub type Result<T> = std::result::Result<T, PokedbError>;

/// Errors that can occur while building a generation snapshot
#[derive(Error, Debug)]
pub enum PokedbError {
    /// IO error during cache or output file operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON decoding error (malformed payload)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP transport error (connection, TLS, timeout)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Terminal non-2xx response
    #[error("request to {url} failed with status {status}")]
    Status { url: String, status: u16 },

    /// All retry attempts were exhausted for a transient failure
    #[error("request to {url} failed after {attempts} attempt(s)")]
    RetriesExhausted { url: String, attempts: u32 },

    /// Invalid configuration
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Resource discovery failed; no meaningful partial work is possible
    #[error("discovery failed: {message}")]
    Discovery { message: String },

    /// A payload was missing a field the pipeline depends on
    #[error("missing field '{field}' in {resource}")]
    MissingField { resource: String, field: String },

    /// Internal contract violation (programming error, surfaced loudly)
    #[error("contract violation: {message}")]
    Contract { message: String },
}

impl PokedbError {
    /// Create an invalid config error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        PokedbError::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create a discovery error
    pub fn discovery(message: impl Into<String>) -> Self {
        PokedbError::Discovery {
            message: message.into(),
        }
    }

    /// Create a missing-field error
    pub fn missing_field(resource: impl Into<String>, field: impl Into<String>) -> Self {
        PokedbError::MissingField {
            resource: resource.into(),
            field: field.into(),
        }
    }

    /// Create a contract violation error
    pub fn contract(message: impl Into<String>) -> Self {
        PokedbError::Contract {
            message: message.into(),
        }
    }
}
