//! End-to-end checks over recorded runs.
//!
//! Drives a [`Recorder`] with a full BEGIN/END sequence for a four-process
//! program and runs the standard suite over the snapshot.

use std::collections::BTreeMap;

use syncgrade_core::{
    CheckerSuite, EntityKey, EventKind, EventReport, OsIds, Recorder, Topology, Verdict,
    topology::{BarrierRoles, HandoffRoles, NestingRoles},
};

fn topology() -> Topology {
    Topology {
        process_count: 4,
        parents: BTreeMap::from([(2, 1), (3, 1), (4, 2)]),
        nesting: NestingRoles { process: 2, thread_count: 3, outer: 1, inner: 2 },
        barrier: BarrierRoles { process: 3, thread_count: 3, waiter: 3, bound: 2 },
        handoff: HandoffRoles {
            process: 4,
            thread_count: 2,
            before: 1,
            after: 2,
            peer_process: 2,
            peer_thread: 3,
        },
    }
}

fn os_ids(process: i32, thread: i32) -> OsIds {
    let pid = process * 100;
    let ppid = match process {
        1 => 1,
        2 | 3 => 100,
        _ => 200,
    };
    OsIds { pid, ppid, tid: pid * 10 + thread }
}

fn event(kind: EventKind, process: i32, thread: i32) -> EventReport {
    EventReport::new(kind, EntityKey::new(process, thread), os_ids(process, thread))
}

/// A correctly synchronized run: every check passes.
fn valid_run() -> Vec<EventReport> {
    use EventKind::{Begin as B, End as E};

    [
        (B, 1, 0),
        (B, 2, 0),
        (B, 3, 0),
        (B, 4, 0),
        (B, 2, 1),
        (B, 2, 2),
        (E, 2, 2),
        (E, 2, 1),
        (B, 4, 1),
        (E, 4, 1),
        (B, 2, 3),
        (E, 2, 3),
        (B, 4, 2),
        (E, 4, 2),
        (B, 3, 1),
        (E, 3, 1),
        (B, 3, 2),
        (B, 3, 3),
        (E, 3, 3),
        (E, 3, 2),
        (E, 4, 0),
        (E, 3, 0),
        (E, 2, 0),
        (E, 1, 0),
    ]
    .into_iter()
    .map(|(kind, process, thread)| event(kind, process, thread))
    .collect()
}

fn replay(recorder: &mut Recorder, events: &[EventReport]) {
    for report in events {
        let _ = recorder.accept(report);
    }
}

#[test]
fn valid_run_scores_full_marks() {
    let mut recorder = Recorder::new();
    replay(&mut recorder, &valid_run());

    let snapshot = recorder.snapshot();
    let outcome = CheckerSuite::standard().run(&snapshot, &topology());

    assert!(snapshot.is_clean());
    assert_eq!(snapshot.clock, 24);
    for check in &outcome.checks {
        assert!(check.errors.is_empty(), "{}: {:?}", check.name, check.errors);
        assert_eq!(check.verdict(), Verdict::Correct);
    }
    assert_eq!(outcome.score(), 20);
    assert_eq!(outcome.max(), 20);
}

#[test]
fn rerun_after_reset_is_deterministic() {
    let topology = topology();
    let suite = CheckerSuite::standard();
    let mut recorder = Recorder::new();

    replay(&mut recorder, &valid_run());
    let first = suite.run(&recorder.snapshot(), &topology);

    recorder.reset(Default::default());
    replay(&mut recorder, &valid_run());
    let second = suite.run(&recorder.snapshot(), &topology);

    assert_eq!(first, second);
    assert!(recorder.violations().is_empty());
}

#[test]
fn peer_running_early_breaks_handoff_only() {
    let mut events = valid_run();
    // Move B2.3/E2.3 in front of B4.1/E4.1.
    let peer: Vec<_> = events.drain(10..12).collect();
    events.splice(8..8, peer);

    let mut recorder = Recorder::new();
    replay(&mut recorder, &events);
    let outcome = CheckerSuite::standard().run(&recorder.snapshot(), &topology());

    let handoff = &outcome.checks[3];
    assert_eq!(handoff.errors, vec!["thread T2.3 starts before T4.1 ended".to_string()]);
    assert_eq!(handoff.score, 2);
    assert_eq!(outcome.score(), 17);
}

#[test]
fn overlapping_barrier_threads_lose_bound_point() {
    let mut events = valid_run();
    // Start T3.2 and T3.3 before T3.1 ends.
    let end_first = events.remove(15);
    events.insert(17, end_first);

    let mut recorder = Recorder::new();
    replay(&mut recorder, &events);
    let outcome = CheckerSuite::standard().run(&recorder.snapshot(), &topology());

    let barrier = &outcome.checks[2];
    assert_eq!(barrier.name, "threads barrier");
    assert_eq!(
        barrier.errors.first().map(String::as_str),
        Some("the following threads are running at the same time: 1 2 3")
    );
    assert!(barrier.score < 5);
}

#[test]
fn child_outliving_parent_fails_hierarchy_relations() {
    let mut events = valid_run();
    // Swap E2.0 and E1.0 so process 2 ends after process 1.
    events.swap(22, 23);

    let mut recorder = Recorder::new();
    replay(&mut recorder, &events);
    let outcome = CheckerSuite::standard().run(&recorder.snapshot(), &topology());

    let hierarchy = &outcome.checks[0];
    assert_eq!(hierarchy.errors, vec!["process 2 ends after its parent 1".to_string()]);
    assert_eq!(hierarchy.score, 2);
}

#[test]
fn suite_outcome_serializes_to_json() {
    let mut recorder = Recorder::new();
    replay(&mut recorder, &valid_run()[..4]);

    let outcome = CheckerSuite::standard().run(&recorder.snapshot(), &topology());
    let json = serde_json::to_value(&outcome).unwrap();

    assert_eq!(json["checks"][0]["name"], "process hierarchy");
    assert_eq!(json["checks"][0]["errors"][0], "missing END for main thread of process 1");
    assert_eq!(json["checks"][0]["score"], 0);
}

#[test]
fn topology_loads_from_base64_file() {
    use base64::{Engine as _, engine::general_purpose::STANDARD};

    let native = serde_json::to_string(&topology()).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("topology.b64");
    std::fs::write(&path, STANDARD.encode(native)).unwrap();

    assert_eq!(Topology::load(&path).unwrap(), topology());
}
