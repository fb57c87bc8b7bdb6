//! Scenario plan.
//!
//! A scenario is one execution of the program under test with a particular
//! delay table. Delays stretch selected threads so that a program which only
//! synchronizes by luck shows its ordering bugs in at least one scenario.

use std::time::Duration;

use syncgrade_proto::EntityKey;

use crate::{delay::DelayTable, topology::Topology};

/// One delay configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scenario {
    /// Name used in logs and reports
    pub name: String,
    /// Delays installed in the recorder before the program starts
    pub delays: DelayTable,
}

impl Scenario {
    /// Create a scenario.
    pub fn new(name: impl Into<String>, delays: DelayTable) -> Self {
        Self { name: name.into(), delays }
    }
}

/// The five standard scenarios for `topology`.
///
/// 1. No delays.
/// 2. Leaf main threads, the nesting inner thread and the barrier waiter are
///    slowed down.
/// 3. Leaf main threads, both hand-off threads and every barrier thread except
///    the waiter are slowed down.
/// 4. Leaf main threads, the nesting inner thread and both hand-off threads are
///    slowed down.
/// 5. Every barrier thread is slowed down by `2 * time_limit / thread_count`.
///    With `bound` threads running at once the barrier alone takes about
///    `2 * time_limit / bound`.
///
/// Delays scale with the scenario number `nr`. When two rules name the same
/// entity the later rule wins.
pub fn standard_scenarios(topology: &Topology, time_limit: Duration) -> Vec<Scenario> {
    (1..=5)
        .map(|nr| {
            let delays = scenario_delays(topology, nr, time_limit);
            Scenario::new(format!("scenario {nr}"), delays)
        })
        .collect()
}

fn scenario_delays(topology: &Topology, nr: u64, time_limit: Duration) -> DelayTable {
    let mut delays = DelayTable::new();
    if nr == 1 {
        return delays;
    }

    if nr <= 4 {
        for process in topology.leaf_processes() {
            delays.insert(EntityKey::main_thread(process), micros(40_000 * nr));
        }
    }

    let nesting = &topology.nesting;
    if nr == 2 || nr == 4 {
        delays.insert(EntityKey::new(nesting.process, nesting.inner), micros(100_000 * nr));
    }

    let handoff = &topology.handoff;
    if nr == 3 || nr == 4 {
        delays.insert(EntityKey::new(handoff.process, handoff.before), micros(50_000 * nr));
        delays.insert(handoff.peer(), micros(70_000 * nr));
    }

    let barrier = &topology.barrier;
    match nr {
        2 => delays.insert(EntityKey::new(barrier.process, barrier.waiter), micros(250_000)),
        3 => {
            for thread in (1..=barrier.thread_count).filter(|t| *t != barrier.waiter) {
                delays.insert(EntityKey::new(barrier.process, thread), micros(10_000));
            }
        },
        5 => {
            let count = u128::from(barrier.thread_count.unsigned_abs().max(1));
            let share = 2 * time_limit.as_micros() / count;
            let share = Duration::from_micros(u64::try_from(share).unwrap_or(u64::MAX));
            for thread in 1..=barrier.thread_count {
                delays.insert(EntityKey::new(barrier.process, thread), share);
            }
        },
        _ => {},
    }

    delays
}

fn micros(value: u64) -> Duration {
    Duration::from_micros(value)
}
