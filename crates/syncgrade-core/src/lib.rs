//! Synchronization verification engine.
//!
//! Records BEGIN/END reports from the program under test in a single total
//! order, injects configured delays, and checks timing/topology invariants over
//! the finished run.
//!
//! # Architecture
//!
//! Everything here is synchronous and free of I/O. The server crate owns the
//! sockets and the child process; it feeds decoded reports into a [`Recorder`]
//! and, once the program exits, hands a frozen [`RunSnapshot`] to the
//! [`CheckerSuite`].
//!
//! # Components
//!
//! - [`Recorder`]: logical clock, entity records and violation log
//! - [`DelayTable`]: per-entity delay handed out on BEGIN
//! - [`CheckerSuite`]: hierarchy, nesting, concurrency-bound and hand-off checks
//! - [`Topology`]: expected process tree and thread roles
//! - [`Scenario`]: one delay configuration to run the program under

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod checks;
mod delay;
mod error;
mod recorder;
pub mod scenario;
mod snapshot;
pub mod topology;
mod violation;

pub use checks::{CheckOutcome, Checker, CheckerSuite, SuiteOutcome, Verdict};
pub use delay::DelayTable;
pub use error::ConfigError;
pub use recorder::Recorder;
pub use scenario::Scenario;
pub use snapshot::{EntityRecord, RunSnapshot};
pub use syncgrade_proto::{EntityKey, EventKind, EventReport, OsIds};
pub use topology::Topology;
pub use violation::ProtocolViolation;
