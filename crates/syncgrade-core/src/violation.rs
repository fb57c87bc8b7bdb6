//! Protocol violations recorded during a run.

use syncgrade_proto::EntityKey;
use thiserror::Error;

/// A breach of the BEGIN/END reporting protocol.
///
/// Violations are data, not failures of the verifier: the recorder logs them
/// and keeps accepting events. Any violation zeroes the scenario's score.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolViolation {
    /// Kind was neither BEGIN nor END
    #[error("unknown message type {kind} for {key}")]
    UnknownKind {
        /// Raw kind value received
        kind: i32,
        /// Entity the report named
        key: EntityKey,
    },

    /// END arrived for an entity that never began
    #[error("END before BEGIN for {0}")]
    EndBeforeBegin(EntityKey),

    /// Second BEGIN for the same entity
    #[error("more than one BEGIN for {0}")]
    DuplicateBegin(EntityKey),

    /// Second END for the same entity
    #[error("more than one END for {0}")]
    DuplicateEnd(EntityKey),

    /// Connection closed, timed out or sent a short report
    #[error("malformed report: {0}")]
    Malformed(String),
}
