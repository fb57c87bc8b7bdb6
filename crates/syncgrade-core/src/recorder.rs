//! Logical clock and event recorder.
//!
//! Assigns every accepted BEGIN/END report a position in a single total order.
//! The order is the order in which reports reach the recorder; callers must
//! serialize access (the server holds the recorder behind one mutex), which is
//! what makes the order total. It says nothing about wall-clock order beyond
//! that point.
//!
//! Flow: validate kind, look up the entity, either reject with a
//! [`ProtocolViolation`] or advance the clock and stamp the record, then hand
//! back the BEGIN delay from the installed [`DelayTable`].

use std::{collections::HashMap, time::Duration};

use syncgrade_proto::{EntityKey, EventKind, EventReport};

use crate::{
    delay::DelayTable,
    snapshot::{EntityRecord, RunSnapshot},
    violation::ProtocolViolation,
};

/// Single source of truth for entity state and ordering during a scenario.
///
/// Owns the logical clock, the entity records, the violation log and the delay
/// table of the current scenario. [`Recorder::reset`] starts the next scenario
/// from a clean state.
#[derive(Debug, Default)]
pub struct Recorder {
    /// Last timestamp handed out (0 = nothing accepted yet)
    clock: u64,
    /// Entity records keyed by (process, thread)
    records: HashMap<EntityKey, EntityRecord>,
    /// Append-only log of rejected reports
    violations: Vec<ProtocolViolation>,
    /// Delays for the current scenario
    delays: DelayTable,
    /// Bumped by every reset; events from older epochs are dropped
    epoch: u64,
}

impl Recorder {
    /// Recorder with no delays installed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorder with `delays` installed.
    pub fn with_delays(delays: DelayTable) -> Self {
        Self { delays, ..Self::default() }
    }

    /// Discard all state from the previous scenario and install `delays`.
    ///
    /// # Invariants
    ///
    /// - Post: clock is 0, no records, no violations
    /// - Post: epoch advanced by one
    pub fn reset(&mut self, delays: DelayTable) {
        tracing::debug!(
            previous_clock = self.clock,
            discarded_records = self.records.len(),
            delayed_entities = delays.len(),
            "Resetting recorder"
        );

        self.clock = 0;
        self.records.clear();
        self.violations.clear();
        self.delays = delays;
        self.epoch += 1;
    }

    /// Scenario epoch, advanced by every [`Recorder::reset`].
    ///
    /// The transport captures it when a connection is accepted and hands it
    /// back with the report, so a connection that outlives its scenario cannot
    /// touch the next one.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// [`Recorder::accept`] for a report read under `epoch`.
    ///
    /// A stale report is dropped without touching the clock or the violation
    /// log, and gets a zero delay.
    pub fn accept_in(
        &mut self,
        epoch: u64,
        report: &EventReport,
    ) -> Result<Duration, ProtocolViolation> {
        if epoch != self.epoch {
            let key = report.key();
            tracing::debug!(epoch, current = self.epoch, %key, "Dropping stale report");
            return Ok(Duration::ZERO);
        }
        self.accept(report)
    }

    /// [`Recorder::record_malformed`] for a connection accepted under `epoch`.
    pub fn record_malformed_in(&mut self, epoch: u64, reason: impl Into<String>) {
        if epoch != self.epoch {
            let reason = reason.into();
            tracing::debug!(
                epoch,
                current = self.epoch,
                %reason,
                "Dropping stale malformed report"
            );
            return;
        }
        self.record_malformed(reason);
    }

    /// Accept one report and return the delay the reporter should sleep.
    ///
    /// # Invariants
    ///
    /// - Post: on `Ok`, the clock advanced by exactly one and the entity's
    ///   record carries the new timestamp
    /// - Post: on `Err`, the clock is unchanged and the violation was appended
    ///   to the log
    pub fn accept(&mut self, report: &EventReport) -> Result<Duration, ProtocolViolation> {
        let key = report.key();

        let Some(kind) = report.kind() else {
            return self.reject(ProtocolViolation::UnknownKind { kind: report.raw_kind(), key });
        };

        // Some(None) = begun, not ended; Some(Some(_)) = finished
        let state = self.records.get(&key).map(|r| r.end);

        match (kind, state) {
            (EventKind::Begin, None) => {
                self.clock += 1;
                let start = self.clock;
                self.records.insert(key, EntityRecord::started(key, report.os_ids(), start));

                let delay = self.delays.lookup(key);
                tracing::trace!(%key, start, ?delay, "BEGIN accepted");
                Ok(delay)
            },
            (EventKind::Begin, Some(_)) => self.reject(ProtocolViolation::DuplicateBegin(key)),
            (EventKind::End, None) => self.reject(ProtocolViolation::EndBeforeBegin(key)),
            (EventKind::End, Some(Some(_))) => self.reject(ProtocolViolation::DuplicateEnd(key)),
            (EventKind::End, Some(None)) => {
                self.clock += 1;
                let end = self.clock;
                if let Some(record) = self.records.get_mut(&key) {
                    debug_assert!(end > record.start);
                    record.end = Some(end);
                }

                tracing::trace!(%key, end, "END accepted");
                Ok(Duration::ZERO)
            },
        }
    }

    /// Log a report that never made it to [`Recorder::accept`].
    ///
    /// Used by the transport for short reads, closed connections and read
    /// timeouts. The clock is not touched.
    pub fn record_malformed(&mut self, reason: impl Into<String>) {
        self.log_violation(ProtocolViolation::Malformed(reason.into()));
    }

    /// Current clock value (timestamp of the last accepted event).
    pub fn clock(&self) -> u64 {
        self.clock
    }

    /// Violations detected so far.
    pub fn violations(&self) -> &[ProtocolViolation] {
        &self.violations
    }

    /// Record for `key`, if it began.
    pub fn record(&self, key: EntityKey) -> Option<&EntityRecord> {
        self.records.get(&key)
    }

    /// Freeze the current state for checking.
    pub fn snapshot(&self) -> RunSnapshot {
        RunSnapshot {
            records: self.records.iter().map(|(k, r)| (*k, *r)).collect(),
            violations: self.violations.clone(),
            clock: self.clock,
        }
    }

    fn reject<T>(&mut self, violation: ProtocolViolation) -> Result<T, ProtocolViolation> {
        self.log_violation(violation.clone());
        Err(violation)
    }

    fn log_violation(&mut self, violation: ProtocolViolation) {
        tracing::warn!(clock = self.clock, %violation, "Protocol violation");
        self.violations.push(violation);
    }
}

#[cfg(test)]
mod tests {
    use syncgrade_proto::OsIds;

    use super::*;

    fn report(kind: EventKind, process: i32, thread: i32) -> EventReport {
        let os = OsIds { pid: process * 100, ppid: 1, tid: process * 100 + thread };
        EventReport::new(kind, EntityKey::new(process, thread), os)
    }

    #[test]
    fn begin_then_end_stamps_record() {
        let mut recorder = Recorder::new();

        recorder.accept(&report(EventKind::Begin, 1, 0)).unwrap();
        recorder.accept(&report(EventKind::Begin, 1, 1)).unwrap();
        recorder.accept(&report(EventKind::End, 1, 1)).unwrap();

        let record = recorder.record(EntityKey::new(1, 1)).unwrap();
        assert_eq!(record.start, 2);
        assert_eq!(record.end, Some(3));
        assert_eq!(record.os.tid, 101);
        assert_eq!(recorder.clock(), 3);
        assert!(recorder.violations().is_empty());
    }

    #[test]
    fn duplicate_begin_leaves_clock() {
        let mut recorder = Recorder::new();
        recorder.accept(&report(EventKind::Begin, 2, 0)).unwrap();

        let err = recorder.accept(&report(EventKind::Begin, 2, 0)).unwrap_err();

        assert_eq!(err, ProtocolViolation::DuplicateBegin(EntityKey::new(2, 0)));
        assert_eq!(recorder.clock(), 1);
        assert_eq!(recorder.violations(), &[err]);
    }

    #[test]
    fn end_before_begin_leaves_clock() {
        let mut recorder = Recorder::new();

        let err = recorder.accept(&report(EventKind::End, 4, 2)).unwrap_err();

        assert_eq!(err.to_string(), "END before BEGIN for process 4, thread 2");
        assert_eq!(recorder.clock(), 0);
        assert!(recorder.record(EntityKey::new(4, 2)).is_none());
    }

    #[test]
    fn duplicate_end_keeps_first_timestamp() {
        let mut recorder = Recorder::new();
        recorder.accept(&report(EventKind::Begin, 1, 0)).unwrap();
        recorder.accept(&report(EventKind::End, 1, 0)).unwrap();

        let err = recorder.accept(&report(EventKind::End, 1, 0)).unwrap_err();

        assert_eq!(err, ProtocolViolation::DuplicateEnd(EntityKey::main_thread(1)));
        assert_eq!(recorder.record(EntityKey::main_thread(1)).unwrap().end, Some(2));
        assert_eq!(recorder.clock(), 2);
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let mut recorder = Recorder::new();
        let bogus = EventReport::with_raw_kind(3, EntityKey::new(5, 1), OsIds::default());

        let err = recorder.accept(&bogus).unwrap_err();

        assert_eq!(err.to_string(), "unknown message type 3 for process 5, thread 1");
        assert_eq!(recorder.clock(), 0);
    }

    #[test]
    fn recorder_keeps_accepting_after_violation() {
        let mut recorder = Recorder::new();
        recorder.accept(&report(EventKind::End, 1, 0)).unwrap_err();

        recorder.accept(&report(EventKind::Begin, 1, 0)).unwrap();
        recorder.accept(&report(EventKind::End, 1, 0)).unwrap();

        assert_eq!(recorder.clock(), 2);
        assert_eq!(recorder.violations().len(), 1);
    }

    #[test]
    fn begin_returns_configured_delay() {
        let delays = DelayTable::new().with(EntityKey::new(3, 1), Duration::from_micros(40_000));
        let mut recorder = Recorder::with_delays(delays);

        assert_eq!(
            recorder.accept(&report(EventKind::Begin, 3, 1)).unwrap(),
            Duration::from_micros(40_000)
        );
        assert_eq!(recorder.accept(&report(EventKind::Begin, 3, 2)).unwrap(), Duration::ZERO);
        assert_eq!(recorder.accept(&report(EventKind::End, 3, 1)).unwrap(), Duration::ZERO);
    }

    #[test]
    fn malformed_report_is_logged_without_tick() {
        let mut recorder = Recorder::new();

        recorder.record_malformed("short read");

        assert_eq!(recorder.clock(), 0);
        assert_eq!(recorder.violations(), &[ProtocolViolation::Malformed("short read".into())]);
    }

    #[test]
    fn reset_clears_state_and_swaps_delays() {
        let delays = DelayTable::new().with(EntityKey::new(1, 0), Duration::from_micros(5));
        let mut recorder = Recorder::with_delays(delays);
        recorder.accept(&report(EventKind::Begin, 1, 0)).unwrap();
        recorder.accept(&report(EventKind::Begin, 1, 0)).unwrap_err();

        recorder.reset(DelayTable::new());

        assert_eq!(recorder.clock(), 0);
        assert!(recorder.violations().is_empty());
        assert!(recorder.record(EntityKey::new(1, 0)).is_none());
        assert_eq!(recorder.accept(&report(EventKind::Begin, 1, 0)).unwrap(), Duration::ZERO);
        assert_eq!(recorder.clock(), 1);
    }

    #[test]
    fn stale_epoch_reports_are_dropped() {
        let mut recorder = Recorder::new();
        let stale = recorder.epoch();
        recorder.reset(DelayTable::new());

        let reply = recorder.accept_in(stale, &report(EventKind::End, 1, 0));
        recorder.record_malformed_in(stale, "connection closed before a full report");

        assert_eq!(reply, Ok(Duration::ZERO));
        assert_eq!(recorder.clock(), 0);
        assert!(recorder.violations().is_empty());
    }

    #[test]
    fn current_epoch_reports_are_recorded() {
        let delays = DelayTable::new().with(EntityKey::new(1, 0), Duration::from_micros(7));
        let mut recorder = Recorder::new();
        recorder.reset(delays);
        let epoch = recorder.epoch();

        let reply = recorder.accept_in(epoch, &report(EventKind::Begin, 1, 0));
        recorder.record_malformed_in(epoch, "short read");

        assert_eq!(reply, Ok(Duration::from_micros(7)));
        assert_eq!(recorder.clock(), 1);
        assert_eq!(recorder.violations().len(), 1);
    }
}
