//! Error types for the image registry configuration API

use thiserror::Error;

use crate::validation::ValidationErrors;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while decoding, validating or serving registry configuration
#[derive(Error, Debug)]
pub enum Error {
    /// The configuration object violates one or more field rules
    #[error("invalid configuration: {0}")]
    Validation(#[from] ValidationErrors),

    /// JSON encode/decode error (includes union decode failures)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An object failed to decode at a known field path
    #[error("{path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// YAML encode/decode error (includes union decode failures)
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A manifest file does not hold what the caller expects
    #[error("Manifest error: {0}")]
    Manifest(String),

    /// Duration parse error
    #[error("Failed to parse duration: {0}")]
    DurationParse(String),

    // =========================================================================
    // Admission Server Errors
    // =========================================================================
    /// TLS material could not be loaded
    #[error("TLS configuration error: {0}")]
    Tls(String),

    /// Metric registration or encoding error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
