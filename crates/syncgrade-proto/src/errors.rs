//! Protocol decoding errors.

use thiserror::Error;

/// Errors raised while decoding wire messages.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Fewer bytes than a full report were supplied
    #[error("report too short: expected {expected} bytes, got {actual}")]
    ReportTooShort {
        /// Bytes required for a report
        expected: usize,
        /// Bytes actually available
        actual: usize,
    },

    /// Fewer bytes than a full reply were supplied
    #[error("reply too short: expected {expected} bytes, got {actual}")]
    ReplyTooShort {
        /// Bytes required for a reply
        expected: usize,
        /// Bytes actually available
        actual: usize,
    },
}

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;
