//! Process hierarchy check.
//!
//! Every configured process must report its main thread exactly once, and each
//! non-root process must have been forked by its configured parent and live
//! inside the parent's lifetime.

use std::collections::BTreeMap;

use super::{CheckOutcome, CheckScore, Checker};
use crate::{
    snapshot::{EntityRecord, RunSnapshot},
    topology::{ROOT_PROCESS, Topology},
};

/// Checks the process tree against the topology's parent map.
#[derive(Debug, Clone, Copy, Default)]
pub struct HierarchyCheck;

impl Checker for HierarchyCheck {
    fn name(&self) -> &'static str {
        "process hierarchy"
    }

    fn check(&self, run: &RunSnapshot, topology: &Topology) -> CheckOutcome {
        let mut score = CheckScore::new(self.name(), 5);

        let mut processes: BTreeMap<i32, &EntityRecord> = BTreeMap::new();
        for record in run.main_threads() {
            let process = record.key.process;
            if !topology.contains(process) {
                return score.stop(format!("found unrequired process {process}"));
            }
            if !record.is_finished() {
                return score.stop(format!("missing END for main thread of process {process}"));
            }
            processes.insert(process, record);
        }

        let missing: Vec<_> = topology
            .processes()
            .filter(|p| !processes.contains_key(p))
            .map(|p| p.to_string())
            .collect();
        if !missing.is_empty() {
            return score.stop(format!("missing main thread for processes: {}", missing.join(" ")));
        }
        score.award(2);

        for (&process, record) in &processes {
            if process == ROOT_PROCESS {
                continue;
            }
            let Some(parent) = topology.parent_of(process) else {
                continue;
            };
            let Some(parent_record) = processes.get(&parent) else {
                continue;
            };

            if record.os.ppid != parent_record.os.pid {
                score.error(format!("the parent for process {process} is not {parent}"));
            }
            if record.start < parent_record.start {
                score.error(format!("process {process} starts before its parent {parent}"));
            }
            if record.end > parent_record.end {
                score.error(format!("process {process} ends after its parent {parent}"));
            }
        }

        if !score.has_errors() {
            score.award(3);
        }
        score.finish()
    }
}
