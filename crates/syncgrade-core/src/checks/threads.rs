//! Thread collection shared by the per-process checks.

use std::collections::BTreeMap;

use syncgrade_proto::EntityKey;

use crate::snapshot::{EntityRecord, RunSnapshot};

/// Finished worker threads of one process, keyed by thread index.
#[derive(Debug)]
pub(crate) struct ProcessThreads<'a> {
    pub(crate) process: i32,
    pub(crate) found: BTreeMap<i32, &'a EntityRecord>,
    pub(crate) missing: Vec<i32>,
}

impl<'a> ProcessThreads<'a> {
    /// Collect threads 1..=`count` of `process`.
    ///
    /// Fails on the first record that disqualifies the process: a missing main
    /// thread, an index outside 1..=`count`, a thread without END, or a thread
    /// that reused the main thread's OS thread id.
    pub(crate) fn collect(run: &'a RunSnapshot, process: i32, count: i32) -> Result<Self, String> {
        let Some(main) = run.record(EntityKey::main_thread(process)) else {
            return Err(format!("main thread is missing for process {process}"));
        };

        let mut found = BTreeMap::new();
        for record in run.process_records(process).filter(|r| !r.key.is_main_thread()) {
            let thread = record.key.thread;
            if !(1..=count).contains(&thread) {
                return Err(format!("found unrequired thread {thread} in process {process}"));
            }
            if !record.is_finished() {
                return Err(format!("missing END for thread {thread} in process {process}"));
            }
            if record.os.tid == main.os.tid {
                return Err(format!(
                    "thread {} is the same as the main thread of the process",
                    record.key.label()
                ));
            }
            found.insert(thread, record);
        }

        let missing = (1..=count).filter(|t| !found.contains_key(t)).collect();
        Ok(Self { process, found, missing })
    }

    /// Diagnostic for absent threads, if any.
    pub(crate) fn missing_error(&self) -> Option<String> {
        let process = self.process;
        self.missing_list().map(|missing| format!("missing threads {missing} in process {process}"))
    }

    /// Absent thread indices joined by spaces, if any.
    pub(crate) fn missing_list(&self) -> Option<String> {
        if self.missing.is_empty() {
            return None;
        }

        let missing: Vec<_> = self.missing.iter().map(ToString::to_string).collect();
        Some(missing.join(" "))
    }

    /// Record of `thread`, present once [`ProcessThreads::missing_error`] is `None`.
    pub(crate) fn get(&self, thread: i32) -> Option<&'a EntityRecord> {
        self.found.get(&thread).copied()
    }
}

/// Label of `thread` in `process`, `TP.T`.
pub(crate) fn label(process: i32, thread: i32) -> String {
    EntityKey::new(process, thread).label()
}
