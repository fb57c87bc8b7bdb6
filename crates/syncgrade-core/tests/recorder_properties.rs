//! Property-based tests for the recorder's logical clock.

use std::{collections::HashSet, time::Duration};

use proptest::prelude::*;
use syncgrade_core::{
    DelayTable, EntityKey, EventKind, EventReport, OsIds, ProtocolViolation, Recorder,
};

fn arbitrary_event() -> impl Strategy<Value = EventReport> {
    (prop_oneof![Just(1), Just(2), -1i32..5], 1i32..4, 0i32..4).prop_map(
        |(kind, process, thread)| {
            EventReport::with_raw_kind(kind, EntityKey::new(process, thread), OsIds::default())
        },
    )
}

proptest! {
    /// Each accepted event advances the clock by exactly one; each rejected
    /// event leaves it alone and is logged.
    #[test]
    fn prop_clock_advances_once_per_accepted_event(
        events in prop::collection::vec(arbitrary_event(), 0..64)
    ) {
        let mut recorder = Recorder::new();
        let mut timestamps = HashSet::new();

        for (i, report) in events.iter().enumerate() {
            let before = recorder.clock();
            let rejected = recorder.violations().len();

            match recorder.accept(report) {
                Ok(_) => {
                    prop_assert_eq!(recorder.clock(), before + 1);
                    prop_assert!(timestamps.insert(recorder.clock()), "event {} reused a tick", i);
                },
                Err(violation) => {
                    prop_assert_eq!(recorder.clock(), before);
                    prop_assert_eq!(recorder.violations().len(), rejected + 1);
                    prop_assert_eq!(recorder.violations().last(), Some(&violation));
                },
            }
        }

        prop_assert_eq!(recorder.clock() as usize, timestamps.len());
    }

    /// A second BEGIN is rejected whether or not the entity has ended.
    #[test]
    fn prop_second_begin_rejected(
        process in 1i32..8,
        thread in 0i32..8,
        end_first in any::<bool>(),
    ) {
        let key = EntityKey::new(process, thread);
        let mut recorder = Recorder::new();
        recorder.accept(&EventReport::new(EventKind::Begin, key, OsIds::default()))?;
        if end_first {
            recorder.accept(&EventReport::new(EventKind::End, key, OsIds::default()))?;
        }
        let clock = recorder.clock();

        let result = recorder.accept(&EventReport::new(EventKind::Begin, key, OsIds::default()));

        prop_assert_eq!(result, Err(ProtocolViolation::DuplicateBegin(key)));
        prop_assert_eq!(recorder.clock(), clock);
    }

    /// END without a BEGIN is always rejected.
    #[test]
    fn prop_end_before_begin_rejected(process in any::<i32>(), thread in any::<i32>()) {
        let key = EntityKey::new(process, thread);
        let mut recorder = Recorder::new();

        let result = recorder.accept(&EventReport::new(EventKind::End, key, OsIds::default()));

        prop_assert_eq!(result, Err(ProtocolViolation::EndBeforeBegin(key)));
        prop_assert_eq!(recorder.clock(), 0);
    }

    /// BEGIN returns exactly the configured delay, END always returns zero.
    #[test]
    fn prop_begin_returns_table_delay(micros in 0u64..10_000_000, thread in 1i32..5) {
        let delayed = EntityKey::new(3, 1);
        let key = EntityKey::new(3, thread);
        let delays = DelayTable::new().with(delayed, Duration::from_micros(micros));
        let mut recorder = Recorder::with_delays(delays);

        let begin = recorder.accept(&EventReport::new(EventKind::Begin, key, OsIds::default()))?;
        let end = recorder.accept(&EventReport::new(EventKind::End, key, OsIds::default()))?;

        let expected = if key == delayed { Duration::from_micros(micros) } else { Duration::ZERO };
        prop_assert_eq!(begin, expected);
        prop_assert_eq!(end, Duration::ZERO);
    }
}
