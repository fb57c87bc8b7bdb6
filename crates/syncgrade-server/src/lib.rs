//! Syncgrade verification server.
//!
//! Wraps [`syncgrade_core`]'s synchronous recorder and checkers with real I/O:
//! a TCP listener that feeds event reports into the recorder, and a runner
//! that launches the program under test once per scenario and scores it.
//!
//! # Components
//!
//! - [`EventTransport`]: TCP listener, one connection per event
//! - [`ScenarioRunner`]: reset, launch, time limit, scoring
//! - [`ProcessProgram`]: program under test as an OS process
//! - [`GradeReport`]: per-scenario results and totals

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod report;
mod runner;
mod transport;

use std::sync::Arc;

pub use error::ServerError;
pub use report::{GradeReport, ScenarioOutcome, ScenarioReport};
pub use runner::{ProcessProgram, Program, ScenarioRunner};
use syncgrade_core::Recorder;
use tokio::sync::Mutex;
pub use transport::{EventTransport, TransportConfig, TransportHandle};

/// Recorder shared between connection tasks and the runner.
///
/// Every recorder call goes through this one mutex, which is what puts all
/// accepted events in a single order.
pub type SharedRecorder = Arc<Mutex<Recorder>>;

/// Fresh recorder with no delays installed.
pub fn shared_recorder() -> SharedRecorder {
    Arc::new(Mutex::new(Recorder::new()))
}
