//! Server error types.

use std::{fmt, io};

use syncgrade_core::ConfigError;

/// Errors that can occur in the server.
#[derive(Debug)]
pub enum ServerError {
    /// Topology could not be loaded.
    ///
    /// Fatal before any scenario runs. Fix the topology file and restart.
    Config(ConfigError),

    /// Transport error (invalid bind address, listener failure).
    ///
    /// Fatal at startup. Errors on individual connections never surface here;
    /// they are recorded as protocol violations instead.
    Transport(String),

    /// Program under test could not be started or waited on.
    ///
    /// Fatal for that scenario only. The runner scores it 0 and continues.
    Launch(String),

    /// I/O error (writing the grade report).
    Io(io::Error),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(err) => write!(f, "configuration error: {err}"),
            Self::Transport(msg) => write!(f, "transport error: {msg}"),
            Self::Launch(msg) => write!(f, "launch error: {msg}"),
            Self::Io(err) => write!(f, "I/O error: {err}"),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::Io(err) => Some(err),
            Self::Transport(_) | Self::Launch(_) => None,
        }
    }
}

impl From<ConfigError> for ServerError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}

impl From<io::Error> for ServerError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}
