//! Grade reports.

use std::path::Path;

use serde::Serialize;
use syncgrade_core::{CheckOutcome, SuiteOutcome};

use crate::error::ServerError;

/// How a scenario ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioOutcome {
    /// Program exited within the time limit
    Completed,
    /// Program was killed at the time limit
    TimedOut,
    /// Program could not be started
    LaunchFailed,
}

/// Result of one scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScenarioReport {
    /// Scenario name
    pub name: String,
    /// How the run ended
    pub outcome: ScenarioOutcome,
    /// Points earned
    pub score: u32,
    /// Points available, the same whatever the outcome
    pub max: u32,
    /// Protocol violations, in detection order
    pub violations: Vec<String>,
    /// Per-check outcomes; empty unless the checks ran
    pub checks: Vec<CheckOutcome>,
    /// Launch error, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScenarioReport {
    /// Checks ran over a clean run.
    pub(crate) fn checked(name: &str, suite: SuiteOutcome) -> Self {
        Self {
            name: name.to_string(),
            outcome: ScenarioOutcome::Completed,
            score: suite.score(),
            max: suite.max(),
            violations: Vec::new(),
            checks: suite.checks,
            error: None,
        }
    }

    /// Run completed but broke the reporting protocol.
    pub(crate) fn rejected(name: &str, max: u32, violations: Vec<String>) -> Self {
        Self::zero(name, ScenarioOutcome::Completed, max, violations)
    }

    /// Run hit the time limit.
    pub(crate) fn timed_out(name: &str, max: u32, violations: Vec<String>) -> Self {
        Self::zero(name, ScenarioOutcome::TimedOut, max, violations)
    }

    /// Program never ran.
    pub(crate) fn launch_failed(name: &str, max: u32, error: &ServerError) -> Self {
        let report = Self::zero(name, ScenarioOutcome::LaunchFailed, max, Vec::new());
        Self { error: Some(error.to_string()), ..report }
    }

    fn zero(name: &str, outcome: ScenarioOutcome, max: u32, violations: Vec<String>) -> Self {
        Self {
            name: name.to_string(),
            outcome,
            score: 0,
            max,
            violations,
            checks: Vec::new(),
            error: None,
        }
    }
}

/// Results of every scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GradeReport {
    /// Per-scenario results, in run order
    pub scenarios: Vec<ScenarioReport>,
    /// Sum of scenario scores
    pub score: u32,
    /// Sum of scenario maxima
    pub max: u32,
}

impl GradeReport {
    /// Aggregate scenario results.
    pub fn from_scenarios(scenarios: Vec<ScenarioReport>) -> Self {
        let score = scenarios.iter().map(|s| s.score).sum();
        let max = scenarios.iter().map(|s| s.max).sum();
        Self { scenarios, score, max }
    }

    /// Score as a percentage of the maximum. 0 when nothing was available.
    pub fn percentage(&self) -> f64 {
        if self.max == 0 {
            return 0.0;
        }
        100.0 * f64::from(self.score) / f64::from(self.max)
    }

    /// Pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, ServerError> {
        serde_json::to_string_pretty(self).map_err(|e| ServerError::Io(std::io::Error::other(e)))
    }

    /// Write the report as JSON to `path`.
    pub fn write(&self, path: &Path) -> Result<(), ServerError> {
        std::fs::write(path, self.to_json()?)?;
        tracing::info!(path = %path.display(), "Wrote grade report");
        Ok(())
    }
}
