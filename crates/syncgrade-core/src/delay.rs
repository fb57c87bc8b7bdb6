//! Delay injection table.
//!
//! Maps an entity to the time it should sleep after its BEGIN is accepted,
//! widening or narrowing concurrency windows in the program under test without
//! modifying it. The reporter is expected to honor the delay, but nothing here
//! verifies that it does.

use std::{collections::HashMap, time::Duration};

use syncgrade_proto::EntityKey;

/// Per-entity delays for one scenario.
///
/// Installed wholesale into the recorder at scenario start and never mutated
/// while the scenario runs. Entities without an entry get no delay.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DelayTable {
    delays: HashMap<EntityKey, Duration>,
}

impl DelayTable {
    /// Empty table (every lookup returns zero).
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: EntityKey, delay: Duration) -> Self {
        self.insert(key, delay);
        self
    }

    /// Set the delay for `key`, replacing any earlier entry.
    pub fn insert(&mut self, key: EntityKey, delay: Duration) {
        self.delays.insert(key, delay);
    }

    /// Delay for `key`, zero if none is configured.
    pub fn lookup(&self, key: EntityKey) -> Duration {
        self.delays.get(&key).copied().unwrap_or(Duration::ZERO)
    }

    /// Number of configured entities.
    pub fn len(&self) -> usize {
        self.delays.len()
    }

    /// Whether no entity has a delay.
    pub fn is_empty(&self) -> bool {
        self.delays.is_empty()
    }

    /// Entries sorted by key.
    pub fn entries(&self) -> Vec<(EntityKey, Duration)> {
        let mut entries: Vec<_> = self.delays.iter().map(|(k, d)| (*k, *d)).collect();
        entries.sort_unstable_by_key(|(k, _)| *k);
        entries
    }
}

impl FromIterator<(EntityKey, Duration)> for DelayTable {
    fn from_iter<I: IntoIterator<Item = (EntityKey, Duration)>>(iter: I) -> Self {
        Self { delays: iter.into_iter().collect() }
    }
}
