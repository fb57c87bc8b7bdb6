//! Wire protocol for syncgrade event reports.
//!
//! Every tracked unit of work in the program under test opens one TCP
//! connection per event, writes a fixed 24-byte [`EventReport`] and reads back
//! a 4-byte [`Reply`] carrying the delay it should sleep before continuing.
//!
//! All integers travel in native byte order. Reporters always run on the same
//! host as the verifier, so no byte swapping is done on either side.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod errors;
mod reply;
mod report;

pub use errors::{ProtocolError, Result};
pub use reply::Reply;
pub use report::{EntityKey, EventKind, EventReport, OsIds};

/// Port the verifier listens on unless configured otherwise.
pub const DEFAULT_PORT: u16 = 1988;
