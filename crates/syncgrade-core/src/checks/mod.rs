//! Invariant checkers.
//!
//! Each checker is a pure function of a finished run and the expected
//! topology. Checkers award partial credit per sub-condition, up to
//! [`MAX_SCORE`] each, and stop at the first missing entity they need.
//!
//! # Scoring
//!
//! A checker that earns every one of its sub-points is rounded up to
//! [`MAX_SCORE`]. `CheckScore::finish` applies that rule, so individual
//! checkers only count sub-points.

mod barrier;
mod handoff;
mod hierarchy;
mod nesting;
mod threads;

use serde::Serialize;

pub use self::{
    barrier::BarrierCheck, handoff::HandoffCheck, hierarchy::HierarchyCheck,
    nesting::NestingCheck,
};
use crate::{snapshot::RunSnapshot, topology::Topology};

/// Maximum score of a single checker.
pub const MAX_SCORE: u32 = 5;

/// One invariant over a finished run.
pub trait Checker: Send + Sync {
    /// Name used in reports.
    fn name(&self) -> &'static str;

    /// Check `run` against `topology`.
    fn check(&self, run: &RunSnapshot, topology: &Topology) -> CheckOutcome;
}

/// Coarse classification of a [`CheckOutcome`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Full score
    Correct,
    /// Some credit
    Partial,
    /// No credit
    Fail,
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Correct => f.write_str("CORRECT"),
            Self::Partial => f.write_str("PARTIAL CORRECT"),
            Self::Fail => f.write_str("FAIL"),
        }
    }
}

/// Result of one checker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckOutcome {
    /// Checker name
    pub name: &'static str,
    /// Diagnostics in detection order
    pub errors: Vec<String>,
    /// Points earned
    pub score: u32,
    /// Points available
    pub max: u32,
}

impl CheckOutcome {
    /// Classify the score.
    pub fn verdict(&self) -> Verdict {
        if self.score >= self.max {
            Verdict::Correct
        } else if self.score > 0 {
            Verdict::Partial
        } else {
            Verdict::Fail
        }
    }
}

/// Running tally of one checker.
#[derive(Debug)]
pub(crate) struct CheckScore {
    name: &'static str,
    /// Sub-points that together earn the completion bonus
    full_points: u32,
    points: u32,
    errors: Vec<String>,
}

impl CheckScore {
    pub(crate) fn new(name: &'static str, full_points: u32) -> Self {
        debug_assert!(full_points <= MAX_SCORE);
        Self { name, full_points, points: 0, errors: Vec::new() }
    }

    pub(crate) fn award(&mut self, points: u32) {
        self.points += points;
    }

    /// Award one point when `passed`, otherwise log `error`.
    pub(crate) fn require(&mut self, passed: bool, error: impl FnOnce() -> String) {
        if passed {
            self.points += 1;
        } else {
            self.errors.push(error());
        }
    }

    pub(crate) fn error(&mut self, error: String) {
        self.errors.push(error);
    }

    pub(crate) fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Log `error` and stop with the points earned so far.
    pub(crate) fn stop(mut self, error: String) -> CheckOutcome {
        self.errors.push(error);
        self.finish()
    }

    /// Apply the completion bonus and produce the outcome.
    pub(crate) fn finish(self) -> CheckOutcome {
        let score = if self.points >= self.full_points { MAX_SCORE } else { self.points };
        CheckOutcome { name: self.name, errors: self.errors, score, max: MAX_SCORE }
    }
}

/// Outcomes of every checker in a suite, in registration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuiteOutcome {
    /// Per-checker outcomes
    pub checks: Vec<CheckOutcome>,
}

impl SuiteOutcome {
    /// Sum of checker scores.
    pub fn score(&self) -> u32 {
        self.checks.iter().map(|c| c.score).sum()
    }

    /// Sum of checker maxima.
    pub fn max(&self) -> u32 {
        self.checks.iter().map(|c| c.max).sum()
    }
}

/// Ordered set of checkers run against every scenario.
pub struct CheckerSuite {
    checkers: Vec<Box<dyn Checker>>,
}

impl CheckerSuite {
    /// Empty suite.
    pub fn new() -> Self {
        Self { checkers: Vec::new() }
    }

    /// Hierarchy, nesting, concurrency-bound and hand-off checks, in that order.
    pub fn standard() -> Self {
        Self::new()
            .with(HierarchyCheck)
            .with(NestingCheck)
            .with(BarrierCheck)
            .with(HandoffCheck)
    }

    /// Builder-style [`CheckerSuite::add`].
    #[must_use]
    pub fn with(mut self, checker: impl Checker + 'static) -> Self {
        self.add(checker);
        self
    }

    /// Register a checker after the existing ones.
    pub fn add(&mut self, checker: impl Checker + 'static) {
        self.checkers.push(Box::new(checker));
    }

    /// Number of registered checkers.
    pub fn len(&self) -> usize {
        self.checkers.len()
    }

    /// Whether no checker is registered.
    pub fn is_empty(&self) -> bool {
        self.checkers.is_empty()
    }

    /// Score available from the whole suite.
    pub fn max_score(&self) -> u32 {
        MAX_SCORE * u32::try_from(self.checkers.len()).unwrap_or(u32::MAX / MAX_SCORE)
    }

    /// Run every checker against `run`.
    pub fn run(&self, run: &RunSnapshot, topology: &Topology) -> SuiteOutcome {
        let checks = self
            .checkers
            .iter()
            .map(|checker| {
                let outcome = checker.check(run, topology);
                tracing::debug!(
                    check = outcome.name,
                    score = outcome.score,
                    errors = outcome.errors.len(),
                    "Check finished"
                );
                outcome
            })
            .collect();

        SuiteOutcome { checks }
    }
}

impl Default for CheckerSuite {
    fn default() -> Self {
        Self::standard()
    }
}

impl std::fmt::Debug for CheckerSuite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<_> = self.checkers.iter().map(|c| c.name()).collect();
        f.debug_struct("CheckerSuite").field("checkers", &names).finish()
    }
}
