//! Syncgrade binary.
//!
//! # Usage
//!
//! ```bash
//! # Grade ./a.out against the five standard scenarios
//! syncgrade --topology topology.json -- ./a.out
//!
//! # Keep the program's output and write a JSON report
//! syncgrade --topology data.b64 --verbose --report grade.json -- ./a.out arg1
//! ```

use std::{path::PathBuf, sync::Arc, time::Duration};

use clap::Parser;
use syncgrade_core::{Topology, scenario::standard_scenarios};
use syncgrade_server::{
    EventTransport, ProcessProgram, ScenarioRunner, ServerError, TransportConfig,
    shared_recorder,
};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Synchronization verifier
#[derive(Parser, Debug)]
#[command(name = "syncgrade")]
#[command(about = "Runs a multi-process program under injected delays and checks its ordering")]
#[command(version)]
struct Args {
    /// Address to listen on for event reports
    #[arg(short, long, default_value = "127.0.0.1:1988")]
    bind: String,

    /// Topology file (JSON, legacy flat JSON, or base64 of either)
    #[arg(short, long)]
    topology: PathBuf,

    /// Wall-clock limit per scenario, in seconds
    #[arg(long, default_value = "3")]
    time_limit_secs: u64,

    /// How long a connection may take to deliver its report, in milliseconds
    #[arg(long, default_value = "1000")]
    read_timeout_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Write the grade report as JSON to this file
    #[arg(long)]
    report: Option<PathBuf>,

    /// Pass the program's output through
    #[arg(short, long)]
    verbose: bool,

    /// Program under test and its arguments
    #[arg(required = true, trailing_var_arg = true)]
    command: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let topology = Topology::load(&args.topology).map_err(ServerError::from)?;
    let (program, program_args) =
        args.command.split_first().ok_or("missing program under test")?;
    let program = ProcessProgram::new(program, program_args).inherit_output(args.verbose);

    let recorder = shared_recorder();
    let config = TransportConfig {
        bind_address: args.bind,
        read_timeout: Duration::from_millis(args.read_timeout_ms),
    };
    let transport = EventTransport::bind(&config, Arc::clone(&recorder)).await?.spawn()?;
    tracing::info!("Listening for event reports on {}", transport.local_addr());

    let time_limit = Duration::from_secs(args.time_limit_secs);
    let scenarios = standard_scenarios(&topology, time_limit);
    let runner = ScenarioRunner::new(recorder, topology, time_limit);
    let report = runner.run_all(&program, &scenarios).await;

    transport.shutdown().await?;

    for scenario in &report.scenarios {
        tracing::info!(
            scenario = %scenario.name,
            outcome = ?scenario.outcome,
            "Score {} / {}",
            scenario.score,
            scenario.max
        );
        for violation in &scenario.violations {
            tracing::info!(scenario = %scenario.name, "Violation: {violation}");
        }
        for check in &scenario.checks {
            tracing::info!(
                scenario = %scenario.name,
                check = check.name,
                "{}: {} / {}",
                check.verdict(),
                check.score,
                check.max
            );
            for error in &check.errors {
                tracing::info!(scenario = %scenario.name, check = check.name, "{error}");
            }
        }
    }
    tracing::info!("Total score: {} / {} ({:.2}%)", report.score, report.max, report.percentage());

    if let Some(path) = &args.report {
        report.write(path)?;
    }

    Ok(())
}
