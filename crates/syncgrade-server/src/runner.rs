//! Scenario runner.
//!
//! For each scenario: reset the shared recorder with the scenario's delays,
//! run the program under test once under a wall-clock limit, then score the
//! frozen run. The transport keeps listening across scenarios; only the
//! recorder state is per scenario.

use std::{future::Future, path::PathBuf, process::Stdio, time::Duration};

use syncgrade_core::{CheckerSuite, Scenario, Topology};
use tokio::process::Command;

use crate::{
    SharedRecorder,
    error::ServerError,
    report::{GradeReport, ScenarioReport},
};

/// Program under test.
///
/// `run` completes when the program exits. Dropping the future before then
/// must stop the program and everything it started; the runner relies on
/// that to enforce its time limit and to keep scenarios apart.
pub trait Program: Send + Sync {
    /// Run the program once to completion.
    fn run(&self) -> impl Future<Output = Result<(), ServerError>> + Send;
}

/// Program started as an OS process.
#[derive(Debug, Clone)]
pub struct ProcessProgram {
    program: PathBuf,
    args: Vec<String>,
    inherit_output: bool,
}

impl ProcessProgram {
    /// Program at `program` run with `args`.
    pub fn new(
        program: impl Into<PathBuf>,
        args: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            inherit_output: false,
        }
    }

    /// Pass the child's stdout and stderr through instead of discarding them.
    #[must_use]
    pub fn inherit_output(mut self, inherit: bool) -> Self {
        self.inherit_output = inherit;
        self
    }
}

impl Program for ProcessProgram {
    fn run(&self) -> impl Future<Output = Result<(), ServerError>> + Send {
        let mut command = Command::new(&self.program);
        command.args(&self.args).stdin(Stdio::null()).kill_on_drop(true);
        if !self.inherit_output {
            command.stdout(Stdio::null()).stderr(Stdio::null());
        }
        #[cfg(unix)]
        command.process_group(0);
        let program = self.program.display().to_string();

        async move {
            let mut child = command
                .spawn()
                .map_err(|e| ServerError::Launch(format!("failed to start {program}: {e}")))?;
            // Dropped before `child`, so the group goes down first
            #[cfg(unix)]
            let _group = group::ProcessGroup::of(&child);

            let status = child
                .wait()
                .await
                .map_err(|e| ServerError::Launch(format!("failed to wait for {program}: {e}")))?;

            if !status.success() {
                tracing::debug!(%program, %status, "Program exited unsuccessfully");
            }
            Ok(())
        }
    }
}

#[cfg(unix)]
mod group {
    use nix::{
        errno::Errno,
        sys::signal::{Signal, killpg},
        unistd::Pid,
    };
    use tokio::process::Child;

    /// Process group of a spawned program, killed as a whole on drop.
    ///
    /// The program is started as its own group leader, so this also reaches
    /// every process it forked. Runs on timeout and after a normal exit alike,
    /// so nothing the program left behind reports into the next scenario.
    pub(super) struct ProcessGroup {
        pgid: Option<Pid>,
    }

    impl ProcessGroup {
        pub(super) fn of(child: &Child) -> Self {
            let pgid = child.id().and_then(|id| i32::try_from(id).ok()).map(Pid::from_raw);
            Self { pgid }
        }
    }

    impl Drop for ProcessGroup {
        fn drop(&mut self) {
            let Some(pgid) = self.pgid else {
                return;
            };

            match killpg(pgid, Signal::SIGKILL) {
                Ok(()) => tracing::debug!(%pgid, "Killed program process group"),
                Err(Errno::ESRCH) => {},
                Err(e) => tracing::warn!(%pgid, "Failed to kill program process group: {e}"),
            }
        }
    }
}

/// Runs scenarios against one shared recorder.
#[derive(Debug)]
pub struct ScenarioRunner {
    recorder: SharedRecorder,
    suite: CheckerSuite,
    topology: Topology,
    time_limit: Duration,
}

impl ScenarioRunner {
    /// Runner with the standard checker suite.
    pub fn new(recorder: SharedRecorder, topology: Topology, time_limit: Duration) -> Self {
        Self { recorder, suite: CheckerSuite::standard(), topology, time_limit }
    }

    /// Replace the checker suite.
    #[must_use]
    pub fn with_suite(mut self, suite: CheckerSuite) -> Self {
        self.suite = suite;
        self
    }

    /// Run every scenario in order.
    pub async fn run_all<P: Program>(&self, program: &P, scenarios: &[Scenario]) -> GradeReport {
        let mut reports = Vec::with_capacity(scenarios.len());
        for scenario in scenarios {
            reports.push(self.run_scenario(program, scenario).await);
        }
        GradeReport::from_scenarios(reports)
    }

    /// Run one scenario and score it.
    pub async fn run_scenario<P: Program>(
        &self,
        program: &P,
        scenario: &Scenario,
    ) -> ScenarioReport {
        let name = scenario.name.as_str();
        let max = self.suite.max_score();

        self.recorder.lock().await.reset(scenario.delays.clone());
        tracing::info!(scenario = name, delayed = scenario.delays.len(), "Starting scenario");
        for (key, delay) in scenario.delays.entries() {
            tracing::debug!(scenario = name, %key, ?delay, "Delay installed");
        }

        let result = tokio::time::timeout(self.time_limit, program.run()).await;
        let snapshot = self.recorder.lock().await.snapshot();
        let violations: Vec<String> = snapshot.violations.iter().map(ToString::to_string).collect();

        let report = match result {
            Err(_) => {
                tracing::warn!(
                    scenario = name,
                    limit_ms = self.time_limit.as_millis() as u64,
                    "Program exceeded time limit"
                );
                ScenarioReport::timed_out(name, max, violations)
            },
            Ok(Err(e)) => {
                tracing::error!(scenario = name, "Launch failed: {e}");
                ScenarioReport::launch_failed(name, max, &e)
            },
            Ok(Ok(())) if !violations.is_empty() => {
                tracing::warn!(
                    scenario = name,
                    violations = violations.len(),
                    "Protocol violations, skipping checks"
                );
                ScenarioReport::rejected(name, max, violations)
            },
            Ok(Ok(())) => ScenarioReport::checked(name, self.suite.run(&snapshot, &self.topology)),
        };

        tracing::info!(
            scenario = name,
            events = snapshot.clock,
            score = report.score,
            max = report.max,
            "Scenario finished"
        );
        report
    }
}
