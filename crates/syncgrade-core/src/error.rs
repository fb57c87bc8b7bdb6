//! Configuration errors.

use std::{io, path::PathBuf};

use thiserror::Error;

/// Errors raised while loading or validating a topology.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Topology file could not be read
    #[error("failed to read '{}': {source}", .path.display())]
    Io {
        /// File that failed
        path: PathBuf,
        /// Underlying I/O error
        source: io::Error,
    },

    /// Content was neither JSON nor base64-wrapped JSON
    #[error("invalid base64 topology: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Decoded base64 was not UTF-8
    #[error("topology is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// JSON did not match either topology layout
    #[error("invalid topology JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A field held something other than an integer
    #[error("field '{field}' is not an integer: {value}")]
    NotAnInteger {
        /// Field name
        field: String,
        /// Offending value
        value: String,
    },

    /// Topology parsed but is inconsistent
    #[error("invalid topology: {0}")]
    Invalid(String),
}
