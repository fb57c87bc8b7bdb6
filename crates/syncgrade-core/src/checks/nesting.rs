//! Same-process nesting check.
//!
//! The outer thread must start before and end after the inner thread of the
//! same process.

use super::{
    CheckOutcome, CheckScore, Checker,
    threads::{ProcessThreads, label},
};
use crate::{snapshot::RunSnapshot, topology::Topology};

/// Checks that the nesting process's inner thread runs inside its outer one.
#[derive(Debug, Clone, Copy, Default)]
pub struct NestingCheck;

impl Checker for NestingCheck {
    fn name(&self) -> &'static str {
        "threads from the same process"
    }

    fn check(&self, run: &RunSnapshot, topology: &Topology) -> CheckOutcome {
        let roles = &topology.nesting;
        let mut score = CheckScore::new(self.name(), 4);

        let threads = match ProcessThreads::collect(run, roles.process, roles.thread_count) {
            Ok(threads) => threads,
            Err(error) => return score.stop(error),
        };

        if !threads.found.is_empty() {
            score.award(1);
        }
        if let Some(error) = threads.missing_error() {
            return score.stop(error);
        }
        score.award(1);

        let (Some(outer), Some(inner)) = (threads.get(roles.outer), threads.get(roles.inner)) else {
            return score.finish();
        };
        let outer_label = label(roles.process, roles.outer);
        let inner_label = label(roles.process, roles.inner);

        score.require(outer.start < inner.start, || {
            format!("thread {outer_label} starts after {inner_label}")
        });
        score.require(outer.end > inner.end, || {
            format!("thread {outer_label} ends before {inner_label}")
        });

        score.finish()
    }
}
