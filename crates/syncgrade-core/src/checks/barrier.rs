//! Concurrency-bound check.
//!
//! At no logical tick may more than `bound` threads of the barrier process be
//! running, and the waiter thread may only end while exactly `bound` threads
//! (itself included) are running.

use std::collections::{BTreeMap, BTreeSet};

use super::{
    CheckOutcome, CheckScore, Checker,
    threads::{ProcessThreads, label},
};
use crate::{snapshot::RunSnapshot, topology::Topology};

/// Checks the barrier process against its concurrency bound.
#[derive(Debug, Clone, Copy, Default)]
pub struct BarrierCheck;

impl Checker for BarrierCheck {
    fn name(&self) -> &'static str {
        "threads barrier"
    }

    fn check(&self, run: &RunSnapshot, topology: &Topology) -> CheckOutcome {
        let roles = &topology.barrier;
        let mut score = CheckScore::new(self.name(), 3);

        let threads = match ProcessThreads::collect(run, roles.process, roles.thread_count) {
            Ok(threads) => threads,
            Err(error) => return score.stop(error),
        };
        if let Some(missing) = threads.missing_list() {
            return score.stop(format!("missing thread(s) {missing} in process {}", roles.process));
        }
        score.award(1);

        // Ticks are inclusive on both ends: a thread is running at its own
        // BEGIN and END timestamps.
        let mut running: BTreeMap<u64, BTreeSet<i32>> = BTreeMap::new();
        for (&thread, record) in &threads.found {
            let end = record.end.unwrap_or(record.start);
            for tick in record.start..=end {
                running.entry(tick).or_default().insert(thread);
            }
        }

        let crowded = running.values().find(|set| set.len() > roles.bound);
        score.require(crowded.is_none(), || {
            format!(
                "the following threads are running at the same time: {}",
                join(crowded.into_iter().flatten())
            )
        });

        let Some(waiter_end) = threads.get(roles.waiter).and_then(|r| r.end) else {
            return score.finish();
        };
        let at_end = running.get(&waiter_end).cloned().unwrap_or_default();
        score.require(at_end.len() == roles.bound, || {
            format!(
                "the following threads are running while ending thread {}: {}",
                label(roles.process, roles.waiter),
                join(&at_end)
            )
        });

        score.finish()
    }
}

fn join<'a>(threads: impl IntoIterator<Item = &'a i32>) -> String {
    threads.into_iter().map(ToString::to_string).collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use syncgrade_proto::{EntityKey, OsIds};

    use super::*;
    use crate::{
        snapshot::EntityRecord,
        topology::{BarrierRoles, HandoffRoles, NestingRoles},
    };

    fn topology(thread_count: i32, waiter: i32, bound: usize) -> Topology {
        Topology {
            process_count: 2,
            parents: BTreeMap::from([(2, 1)]),
            nesting: NestingRoles { process: 1, thread_count: 2, outer: 1, inner: 2 },
            barrier: BarrierRoles { process: 2, thread_count, waiter, bound },
            handoff: HandoffRoles {
                process: 1,
                thread_count: 1,
                before: 1,
                after: 1,
                peer_process: 2,
                peer_thread: 1,
            },
        }
    }

    fn thread(thread: i32, start: u64, end: u64) -> EntityRecord {
        let os = OsIds { pid: 200, ppid: 100, tid: 2000 + thread };
        let key = EntityKey::new(2, thread);
        EntityRecord { end: Some(end), ..EntityRecord::started(key, os, start) }
    }

    #[test]
    fn bounded_run_with_waiter_at_capacity_earns_bonus() {
        // 1 overlaps 2, then 3 overlaps 4.
        let run = RunSnapshot::from_records([
            thread(0, 1, 20),
            thread(1, 2, 5),
            thread(2, 3, 4),
            thread(3, 6, 9),
            thread(4, 7, 8),
        ]);

        let outcome = BarrierCheck.check(&run, &topology(4, 2, 2));

        assert!(outcome.errors.is_empty(), "{:?}", outcome.errors);
        assert_eq!(outcome.score, 5);
    }

    #[test]
    fn three_overlapping_threads_exceed_bound() {
        let run = RunSnapshot::from_records([
            thread(0, 1, 20),
            thread(1, 2, 5),
            thread(2, 3, 8),
            thread(3, 4, 6),
        ]);

        let outcome = BarrierCheck.check(&run, &topology(3, 3, 2));

        insta::assert_snapshot!(
            outcome.errors.join("\n"),
            @"the following threads are running at the same time: 1 2 3"
        );
        assert_eq!(outcome.score, 2);
    }

    #[test]
    fn waiter_ending_alone_loses_point() {
        let run = RunSnapshot::from_records([
            thread(0, 1, 20),
            thread(1, 2, 3),
            thread(2, 4, 5),
            thread(3, 6, 7),
        ]);

        let outcome = BarrierCheck.check(&run, &topology(3, 3, 2));

        assert_eq!(
            outcome.errors,
            vec!["the following threads are running while ending thread T2.3: 3".to_string()]
        );
        assert_eq!(outcome.score, 2);
    }

    #[test]
    fn missing_thread_scores_zero() {
        let run = RunSnapshot::from_records([thread(0, 1, 20), thread(1, 2, 3)]);

        let outcome = BarrierCheck.check(&run, &topology(2, 1, 1));

        assert_eq!(outcome.errors, vec!["missing thread(s) 2 in process 2".to_string()]);
        assert_eq!(outcome.score, 0);
    }
}
