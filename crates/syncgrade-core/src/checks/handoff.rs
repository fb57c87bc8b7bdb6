//! Cross-process hand-off check.
//!
//! The peer thread lives in another process and must run strictly between the
//! `before` thread's END and the `after` thread's BEGIN.

use super::{
    CheckOutcome, CheckScore, Checker,
    threads::{ProcessThreads, label},
};
use crate::{snapshot::RunSnapshot, topology::Topology};

/// Checks ordering between the hand-off process and the peer thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct HandoffCheck;

impl Checker for HandoffCheck {
    fn name(&self) -> &'static str {
        "threads from different processes"
    }

    fn check(&self, run: &RunSnapshot, topology: &Topology) -> CheckOutcome {
        let roles = &topology.handoff;
        let mut score = CheckScore::new(self.name(), 3);

        let threads = match ProcessThreads::collect(run, roles.process, roles.thread_count) {
            Ok(threads) => threads,
            Err(error) => return score.stop(error),
        };
        if let Some(error) = threads.missing_error() {
            return score.stop(error);
        }
        score.award(1);

        let Some(peer) = run.record(roles.peer()) else {
            return score.stop(format!(
                "thread {} is missing from process {}",
                roles.peer_thread, roles.peer_process
            ));
        };
        let Some(peer_end) = peer.end else {
            return score.stop(format!(
                "missing END for thread {} in process {}",
                roles.peer_thread, roles.peer_process
            ));
        };

        let (Some(before), Some(after)) = (threads.get(roles.before), threads.get(roles.after))
        else {
            return score.finish();
        };
        let peer_label = label(roles.peer_process, roles.peer_thread);

        score.require(before.end.is_some_and(|end| peer.start > end), || {
            format!(
                "thread {peer_label} starts before {} ended",
                label(roles.process, roles.before)
            )
        });
        score.require(peer_end < after.start, || {
            format!("thread {peer_label} ends after {} started", label(roles.process, roles.after))
        });

        score.finish()
    }
}
