//! Reporter errors.

use std::{io, net::SocketAddr};

use syncgrade_proto::ProtocolError;
use thiserror::Error;

/// Errors raised while reporting an event.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Verifier could not be reached
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        /// Verifier address
        addr: SocketAddr,
        /// Underlying I/O error
        source: io::Error,
    },

    /// Connection broke while sending or receiving
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Reply could not be decoded
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}
