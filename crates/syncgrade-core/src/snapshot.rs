//! Frozen view of a finished run.
//!
//! Checkers operate on snapshots rather than the live recorder so every check
//! sees the same state, and so records iterate in key order regardless of how
//! the recorder stores them.

use std::collections::BTreeMap;

use syncgrade_proto::{EntityKey, OsIds};

use crate::violation::ProtocolViolation;

/// Lifetime of one entity in logical time.
///
/// Created by a valid BEGIN. `end` stays `None` until the matching END is
/// accepted; after that neither timestamp changes for the rest of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityRecord {
    /// Entity this record tracks
    pub key: EntityKey,
    /// Identifiers reported with the BEGIN
    pub os: OsIds,
    /// Logical timestamp of the BEGIN
    pub start: u64,
    /// Logical timestamp of the END, if one was accepted
    pub end: Option<u64>,
}

impl EntityRecord {
    /// Record for an entity that has begun but not ended.
    pub fn started(key: EntityKey, os: OsIds, start: u64) -> Self {
        Self { key, os, start, end: None }
    }

    /// Whether the matching END was accepted.
    pub fn is_finished(&self) -> bool {
        self.end.is_some()
    }
}

/// Snapshot of the recorder after a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSnapshot {
    /// Every entity that reported a valid BEGIN
    pub records: BTreeMap<EntityKey, EntityRecord>,
    /// Violations in the order they were detected
    pub violations: Vec<ProtocolViolation>,
    /// Final value of the logical clock
    pub clock: u64,
}

impl RunSnapshot {
    /// Build a snapshot directly from records.
    ///
    /// The clock is set to the largest timestamp present.
    pub fn from_records(records: impl IntoIterator<Item = EntityRecord>) -> Self {
        let records: BTreeMap<_, _> = records.into_iter().map(|r| (r.key, r)).collect();
        let clock = records.values().map(|r| r.end.unwrap_or(r.start)).max().unwrap_or(0);

        Self { records, violations: Vec::new(), clock }
    }

    /// Record for `key`, if it began.
    pub fn record(&self, key: EntityKey) -> Option<&EntityRecord> {
        self.records.get(&key)
    }

    /// All records of one process, in thread order.
    pub fn process_records(&self, process: i32) -> impl Iterator<Item = &EntityRecord> {
        self.records
            .range(EntityKey::new(process, i32::MIN)..=EntityKey::new(process, i32::MAX))
            .map(|(_, r)| r)
    }

    /// Main-thread records of every process, in process order.
    pub fn main_threads(&self) -> impl Iterator<Item = &EntityRecord> {
        self.records.values().filter(|r| r.key.is_main_thread())
    }

    /// Whether the run finished without protocol violations.
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finished(process: i32, thread: i32, start: u64, end: u64) -> EntityRecord {
        let key = EntityKey::new(process, thread);
        EntityRecord { end: Some(end), ..EntityRecord::started(key, OsIds::default(), start) }
    }

    #[test]
    fn process_records_are_scoped_and_ordered() {
        let snapshot = RunSnapshot::from_records([
            finished(2, 1, 3, 4),
            finished(1, 0, 1, 9),
            finished(2, 0, 2, 8),
            finished(3, 0, 5, 6),
        ]);

        let keys: Vec<_> = snapshot.process_records(2).map(|r| r.key).collect();
        assert_eq!(keys, vec![EntityKey::new(2, 0), EntityKey::new(2, 1)]);
        assert_eq!(snapshot.clock, 9);
    }

    #[test]
    fn main_threads_skip_workers() {
        let snapshot = RunSnapshot::from_records([finished(1, 0, 1, 4), finished(1, 1, 2, 3)]);

        let keys: Vec<_> = snapshot.main_threads().map(|r| r.key).collect();
        assert_eq!(keys, vec![EntityKey::main_thread(1)]);
    }
}
