//! Expected process tree and thread roles of the program under test.
//!
//! The topology is read-only input shared by every scenario: checkers compare
//! the recorded run against it, and the standard scenario plan derives its
//! delay tables from it.
//!
//! Two JSON layouts are accepted. The native layout mirrors [`Topology`]
//! directly. The legacy layout is the flat key set used by older grading data
//! files (`nrProcs`, `procs`, `threads1_proc`, ...), where values may be numbers
//! or numeric strings. Either layout may be base64-wrapped.

use std::{collections::BTreeMap, fs, path::Path};

use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use syncgrade_proto::EntityKey;

use crate::error::ConfigError;

/// Index of the process every other process descends from.
pub const ROOT_PROCESS: i32 = 1;

/// Thread roles for the same-process nesting check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NestingRoles {
    /// Process whose threads are checked
    pub process: i32,
    /// Threads 1..=count must all report
    pub thread_count: i32,
    /// Thread that must start before and end after `inner`
    pub outer: i32,
    /// Thread that must run inside `outer`
    pub inner: i32,
}

/// Thread roles for the concurrency-bound check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarrierRoles {
    /// Process whose threads are checked
    pub process: i32,
    /// Threads 1..=count must all report
    pub thread_count: i32,
    /// Thread that may only end while exactly `bound` threads run
    pub waiter: i32,
    /// Maximum number of threads running at once
    pub bound: usize,
}

/// Thread roles for the cross-process hand-off check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandoffRoles {
    /// Process whose threads bracket the peer
    pub process: i32,
    /// Threads 1..=count must all report
    pub thread_count: i32,
    /// Thread that must end before the peer starts
    pub before: i32,
    /// Thread that may only start after the peer ends
    pub after: i32,
    /// Process of the peer thread
    pub peer_process: i32,
    /// Thread index of the peer within `peer_process`
    pub peer_thread: i32,
}

impl HandoffRoles {
    /// Key of the peer thread.
    pub fn peer(&self) -> EntityKey {
        EntityKey::new(self.peer_process, self.peer_thread)
    }
}

/// Full expected topology.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topology {
    /// Processes are numbered 1..=count
    pub process_count: i32,
    /// Parent of every non-root process
    pub parents: BTreeMap<i32, i32>,
    /// Same-process nesting roles
    pub nesting: NestingRoles,
    /// Concurrency-bound roles
    pub barrier: BarrierRoles,
    /// Cross-process hand-off roles
    pub handoff: HandoffRoles,
}

impl Topology {
    /// Read and validate a topology file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;

        let topology = Self::parse(&content)?;
        tracing::info!(
            path = %path.display(),
            processes = topology.process_count,
            "Loaded topology"
        );
        Ok(topology)
    }

    /// Parse and validate topology text in any accepted layout.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let trimmed = content.trim();
        let json = if trimmed.starts_with('{') {
            trimmed.to_string()
        } else {
            let compact: String = trimmed.split_whitespace().collect();
            String::from_utf8(STANDARD.decode(compact)?)?
        };

        let value: serde_json::Value = serde_json::from_str(&json)?;
        let topology = if value.get("nrProcs").is_some() {
            let legacy: LegacyTopology = serde_json::from_value(value)?;
            Self::try_from(legacy)?
        } else {
            serde_json::from_value(value)?
        };

        topology.validate()?;
        Ok(topology)
    }

    /// Configured parent of `process`. `None` for the root.
    pub fn parent_of(&self, process: i32) -> Option<i32> {
        self.parents.get(&process).copied()
    }

    /// Process indices 1..=count.
    pub fn processes(&self) -> impl Iterator<Item = i32> {
        ROOT_PROCESS..=self.process_count
    }

    /// Whether `process` is expected in this topology.
    pub fn contains(&self, process: i32) -> bool {
        (ROOT_PROCESS..=self.process_count).contains(&process)
    }

    /// Non-root processes that have no children, in index order.
    pub fn leaf_processes(&self) -> Vec<i32> {
        self.parents.keys().copied().filter(|p| !self.parents.values().any(|v| v == p)).collect()
    }

    /// Check internal consistency.
    ///
    /// Every non-root process needs a parent inside the topology and must reach
    /// the root by following parents. Role threads must lie within their
    /// process's thread count.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.process_count < ROOT_PROCESS {
            return Err(invalid(format!("process count {} is below 1", self.process_count)));
        }

        if self.parents.contains_key(&ROOT_PROCESS) {
            return Err(invalid(format!("root process {ROOT_PROCESS} cannot have a parent")));
        }

        for (&child, &parent) in &self.parents {
            if !self.contains(child) || !self.contains(parent) {
                return Err(invalid(format!("parent link {child} -> {parent} is out of range")));
            }
        }

        for process in self.processes().skip(1) {
            let mut current = process;
            for _ in 0..self.process_count {
                match self.parent_of(current) {
                    Some(parent) => current = parent,
                    None => break,
                }
            }
            if current != ROOT_PROCESS {
                return Err(invalid(format!("process {process} does not descend from the root")));
            }
        }

        let nesting = &self.nesting;
        self.check_role_process("nesting", nesting.process, nesting.thread_count)?;
        check_role_thread("nesting.outer", nesting.outer, nesting.thread_count)?;
        check_role_thread("nesting.inner", nesting.inner, nesting.thread_count)?;
        if nesting.outer == nesting.inner {
            return Err(invalid("nesting outer and inner threads must differ".to_string()));
        }

        let barrier = &self.barrier;
        self.check_role_process("barrier", barrier.process, barrier.thread_count)?;
        check_role_thread("barrier.waiter", barrier.waiter, barrier.thread_count)?;
        if barrier.bound == 0 || barrier.bound > barrier.thread_count as usize {
            return Err(invalid(format!(
                "barrier bound {} must be within 1..={}",
                barrier.bound, barrier.thread_count
            )));
        }

        let handoff = &self.handoff;
        self.check_role_process("handoff", handoff.process, handoff.thread_count)?;
        check_role_thread("handoff.before", handoff.before, handoff.thread_count)?;
        check_role_thread("handoff.after", handoff.after, handoff.thread_count)?;
        if !self.contains(handoff.peer_process) || handoff.peer_process == handoff.process {
            return Err(invalid(format!(
                "hand-off peer process {} must be another process of the topology",
                handoff.peer_process
            )));
        }
        if handoff.peer_thread < 1 {
            return Err(invalid(format!("hand-off peer thread {} is below 1", handoff.peer_thread)));
        }

        Ok(())
    }

    fn check_role_process(&self, role: &str, process: i32, count: i32) -> Result<(), ConfigError> {
        if !self.contains(process) {
            return Err(invalid(format!("{role} process {process} is not in the topology")));
        }
        if count < 1 {
            return Err(invalid(format!("{role} thread count {count} is below 1")));
        }
        Ok(())
    }
}

fn check_role_thread(role: &str, thread: i32, count: i32) -> Result<(), ConfigError> {
    if (1..=count).contains(&thread) {
        Ok(())
    } else {
        Err(invalid(format!("{role} thread {thread} is outside 1..={count}")))
    }
}

fn invalid(message: String) -> ConfigError {
    ConfigError::Invalid(message)
}

/// Integer that older data files sometimes store as a string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum LooseInt {
    Number(i64),
    Text(String),
}

impl LooseInt {
    fn to_i32(&self, field: &str) -> Result<i32, ConfigError> {
        let not_an_integer = || ConfigError::NotAnInteger {
            field: field.to_string(),
            value: match self {
                Self::Number(n) => n.to_string(),
                Self::Text(s) => s.clone(),
            },
        };

        match self {
            Self::Number(n) => i32::try_from(*n).map_err(|_| not_an_integer()),
            Self::Text(s) => s.trim().parse().map_err(|_| not_an_integer()),
        }
    }
}

/// Flat key layout of older grading data files.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyTopology {
    nr_procs: LooseInt,
    #[serde(default)]
    procs: BTreeMap<String, LooseInt>,
    #[serde(rename = "threads1_proc")]
    nesting_proc: LooseInt,
    #[serde(rename = "threads1_count")]
    nesting_count: LooseInt,
    #[serde(rename = "threads1_outer")]
    nesting_outer: LooseInt,
    #[serde(rename = "threads1_inner")]
    nesting_inner: LooseInt,
    #[serde(rename = "threads1_3")]
    peer_thread: LooseInt,
    #[serde(rename = "threads2_proc")]
    barrier_proc: LooseInt,
    #[serde(rename = "threads2_count")]
    barrier_count: LooseInt,
    #[serde(rename = "threads2_waiter")]
    barrier_waiter: LooseInt,
    #[serde(rename = "threads2_max")]
    barrier_max: LooseInt,
    #[serde(rename = "threads3_proc")]
    handoff_proc: LooseInt,
    #[serde(rename = "threads3_count")]
    handoff_count: LooseInt,
    #[serde(rename = "threads3_before")]
    handoff_before: LooseInt,
    #[serde(rename = "threads3_after")]
    handoff_after: LooseInt,
}

impl TryFrom<LegacyTopology> for Topology {
    type Error = ConfigError;

    fn try_from(legacy: LegacyTopology) -> Result<Self, Self::Error> {
        let mut parents = BTreeMap::new();
        for (child, parent) in &legacy.procs {
            let child = LooseInt::Text(child.clone()).to_i32("procs")?;
            parents.insert(child, parent.to_i32("procs")?);
        }

        let nesting_process = legacy.nesting_proc.to_i32("threads1_proc")?;
        let bound = legacy.barrier_max.to_i32("threads2_max")?;

        Ok(Self {
            process_count: legacy.nr_procs.to_i32("nrProcs")?,
            parents,
            nesting: NestingRoles {
                process: nesting_process,
                thread_count: legacy.nesting_count.to_i32("threads1_count")?,
                outer: legacy.nesting_outer.to_i32("threads1_outer")?,
                inner: legacy.nesting_inner.to_i32("threads1_inner")?,
            },
            barrier: BarrierRoles {
                process: legacy.barrier_proc.to_i32("threads2_proc")?,
                thread_count: legacy.barrier_count.to_i32("threads2_count")?,
                waiter: legacy.barrier_waiter.to_i32("threads2_waiter")?,
                bound: usize::try_from(bound).map_err(|_| ConfigError::NotAnInteger {
                    field: "threads2_max".to_string(),
                    value: bound.to_string(),
                })?,
            },
            handoff: HandoffRoles {
                process: legacy.handoff_proc.to_i32("threads3_proc")?,
                thread_count: legacy.handoff_count.to_i32("threads3_count")?,
                before: legacy.handoff_before.to_i32("threads3_before")?,
                after: legacy.handoff_after.to_i32("threads3_after")?,
                peer_process: nesting_process,
                peer_thread: legacy.peer_thread.to_i32("threads1_3")?,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEGACY: &str = r#"{
        "nrProcs": "5",
        "procs": {"2": "1", "3": "1", "4": "2", "5": 2},
        "threads1_proc": "2", "threads1_count": 4, "threads1_outer": "1",
        "threads1_inner": "3", "threads1_3": "2",
        "threads2_proc": "3", "threads2_count": "6", "threads2_waiter": "4",
        "threads2_max": "3",
        "threads3_proc": "4", "threads3_count": "3", "threads3_before": "1",
        "threads3_after": "3"
    }"#;

    #[test]
    fn parses_legacy_layout() {
        let topology = Topology::parse(LEGACY).unwrap();

        assert_eq!(topology.process_count, 5);
        assert_eq!(topology.parent_of(5), Some(2));
        assert_eq!(topology.parent_of(1), None);
        assert_eq!(topology.nesting.inner, 3);
        assert_eq!(topology.barrier.bound, 3);
        assert_eq!(topology.handoff.peer(), EntityKey::new(2, 2));
        assert_eq!(topology.leaf_processes(), vec![3, 4, 5]);
    }

    #[test]
    fn parses_base64_wrapped_layout() {
        let wrapped = STANDARD.encode(LEGACY);

        assert_eq!(Topology::parse(&wrapped).unwrap(), Topology::parse(LEGACY).unwrap());
    }

    #[test]
    fn native_layout_round_trips_through_json() {
        let topology = Topology::parse(LEGACY).unwrap();
        let json = serde_json::to_string(&topology).unwrap();

        assert_eq!(Topology::parse(&json).unwrap(), topology);
    }

    #[test]
    fn rejects_non_numeric_field() {
        let broken = LEGACY.replace(r#""threads1_outer": "1""#, r#""threads1_outer": "one""#);

        let err = Topology::parse(&broken).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::NotAnInteger { ref field, .. } if field == "threads1_outer"
        ));
    }

    #[test]
    fn rejects_orphan_process() {
        let mut topology = Topology::parse(LEGACY).unwrap();
        topology.parents.remove(&4);

        let err = topology.validate().unwrap_err();
        assert_eq!(err.to_string(), "invalid topology: process 4 does not descend from the root");
    }

    #[test]
    fn rejects_parent_cycle() {
        let mut topology = Topology::parse(LEGACY).unwrap();
        topology.parents.insert(2, 4);

        assert!(topology.validate().is_err());
    }

    #[test]
    fn rejects_bound_above_thread_count() {
        let mut topology = Topology::parse(LEGACY).unwrap();
        topology.barrier.bound = 7;

        let err = topology.validate().unwrap_err();
        assert_eq!(err.to_string(), "invalid topology: barrier bound 7 must be within 1..=6");
    }

    #[test]
    fn load_reports_missing_file() {
        let err = Topology::load("/nonexistent/topology.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("topology.json");
        fs::write(&path, LEGACY).unwrap();

        assert_eq!(Topology::load(&path).unwrap().process_count, 5);
    }
}
