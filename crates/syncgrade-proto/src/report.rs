//! Event report with zero-copy parsing.
//!
//! An `EventReport` is six native-endian `i32` values:
//! `[kind, process, thread, pid, ppid, tid]`. The layout is fixed so the
//! transport can read exactly [`EventReport::SIZE`] bytes and cast them.

use std::fmt;

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::errors::{ProtocolError, Result};

/// Kind of event carried by a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A unit of work started
    Begin,
    /// A unit of work finished
    End,
}

impl EventKind {
    /// Wire value of `Begin`.
    pub const BEGIN: i32 = 1;

    /// Wire value of `End`.
    pub const END: i32 = 2;

    /// Decode a wire value. `None` if the value names no known kind.
    #[must_use]
    pub fn from_i32(raw: i32) -> Option<Self> {
        match raw {
            Self::BEGIN => Some(Self::Begin),
            Self::END => Some(Self::End),
            _ => None,
        }
    }

    /// Wire value for this kind.
    #[must_use]
    pub fn to_i32(self) -> i32 {
        match self {
            Self::Begin => Self::BEGIN,
            Self::End => Self::END,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Begin => f.write_str("BEGIN"),
            Self::End => f.write_str("END"),
        }
    }
}

/// Identity of a tracked entity: one thread of one process.
///
/// Process indices are assigned by the scenario topology (1..N). Thread index
/// 0 is the process's main thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityKey {
    /// Process index from the topology
    pub process: i32,
    /// Thread index within the process (0 = main thread)
    pub thread: i32,
}

impl EntityKey {
    /// Create a key.
    #[must_use]
    pub const fn new(process: i32, thread: i32) -> Self {
        Self { process, thread }
    }

    /// Key of a process's main thread.
    #[must_use]
    pub const fn main_thread(process: i32) -> Self {
        Self { process, thread: 0 }
    }

    /// Whether this key names a main thread.
    #[must_use]
    pub const fn is_main_thread(&self) -> bool {
        self.thread == 0
    }

    /// Short `T<process>.<thread>` label used in diagnostics.
    #[must_use]
    pub fn label(&self) -> String {
        format!("T{}.{}", self.process, self.thread)
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "process {}, thread {}", self.process, self.thread)
    }
}

/// OS-level identifiers supplied by the reporter.
///
/// Only used when checking a finished run, never for ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct OsIds {
    /// Process id of the reporter
    pub pid: i32,
    /// Parent process id of the reporter
    pub ppid: i32,
    /// Thread id of the reporter
    pub tid: i32,
}

/// Fixed 24-byte event report.
///
/// Fields are stored as raw byte arrays so any 24-byte pattern is a valid
/// value; the `kind` is kept raw so unknown kinds reach the recorder and can
/// be reported there.
#[repr(C)]
#[derive(Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct EventReport {
    kind: [u8; 4],
    process: [u8; 4],
    thread: [u8; 4],
    pid: [u8; 4],
    ppid: [u8; 4],
    tid: [u8; 4],
}

impl EventReport {
    /// Size of a serialized report (six `i32`).
    pub const SIZE: usize = 24;

    /// Build a report for a known event kind.
    #[must_use]
    pub fn new(kind: EventKind, key: EntityKey, os: OsIds) -> Self {
        Self::with_raw_kind(kind.to_i32(), key, os)
    }

    /// Build a report with an arbitrary kind value.
    #[must_use]
    pub fn with_raw_kind(kind: i32, key: EntityKey, os: OsIds) -> Self {
        Self {
            kind: kind.to_ne_bytes(),
            process: key.process.to_ne_bytes(),
            thread: key.thread.to_ne_bytes(),
            pid: os.pid.to_ne_bytes(),
            ppid: os.ppid.to_ne_bytes(),
            tid: os.tid.to_ne_bytes(),
        }
    }

    /// Parse a report from the start of `bytes`.
    ///
    /// Trailing bytes beyond [`Self::SIZE`] are ignored.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let (report, _rest) = Self::ref_from_prefix(bytes).map_err(|_| {
            ProtocolError::ReportTooShort { expected: Self::SIZE, actual: bytes.len() }
        })?;

        Ok(*report)
    }

    /// Serialize to wire bytes.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut arr = [0u8; Self::SIZE];
        arr.copy_from_slice(self.as_bytes());
        arr
    }

    /// Raw kind value as sent.
    #[must_use]
    pub fn raw_kind(&self) -> i32 {
        i32::from_ne_bytes(self.kind)
    }

    /// Decoded kind. `None` if unrecognized.
    #[must_use]
    pub fn kind(&self) -> Option<EventKind> {
        EventKind::from_i32(self.raw_kind())
    }

    /// Entity the report is about.
    #[must_use]
    pub fn key(&self) -> EntityKey {
        EntityKey {
            process: i32::from_ne_bytes(self.process),
            thread: i32::from_ne_bytes(self.thread),
        }
    }

    /// OS identifiers of the reporter.
    #[must_use]
    pub fn os_ids(&self) -> OsIds {
        OsIds {
            pid: i32::from_ne_bytes(self.pid),
            ppid: i32::from_ne_bytes(self.ppid),
            tid: i32::from_ne_bytes(self.tid),
        }
    }
}

impl fmt::Debug for EventReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let os = self.os_ids();
        f.debug_struct("EventReport")
            .field("kind", &self.raw_kind())
            .field("key", &self.key())
            .field("pid", &os.pid)
            .field("ppid", &os.ppid)
            .field("tid", &os.tid)
            .finish()
    }
}
