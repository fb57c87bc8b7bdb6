//! Reporter for programs under test.
//!
//! Opens one TCP connection per event, sends a 24-byte
//! [`EventReport`](syncgrade_proto::EventReport) and reads back the
//! microsecond delay the verifier wants the unit of work to sleep.
//!
//! ```no_run
//! # async fn demo() -> Result<(), syncgrade_client::ClientError> {
//! use syncgrade_client::Reporter;
//! use syncgrade_proto::EntityKey;
//!
//! let reporter = Reporter::new("127.0.0.1:1988".parse().unwrap());
//! let key = EntityKey::new(2, 1);
//! reporter.begin(key).await?;
//! // ... work ...
//! reporter.end(key).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod reporter;

pub use error::ClientError;
pub use reporter::{Reporter, current_os_ids};
