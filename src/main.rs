//! Command-line entry point.
//!
//! Without `--simulate` the tool is a planner: it loads and validates the
//! configuration and prints the planned field and angle sequences. With
//! `--simulate` it executes the full campaign against the bundled mock
//! hardware, appending samples to a CSV under the configured file root.
//! Wiring real drivers is a deployment concern and happens outside this
//! binary.

use anyhow::{Context, Result};
use clap::Parser;
use hallsweep::hardware::mock::{MockCurrentSource, MockLockin, MockRotationStage};
use hallsweep::{
    CancelToken, CsvSink, FieldCalibration, InstrumentBundle, MeasurementConfig, RetryPolicy,
    RunQueue, SweepPlan,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "hallsweep", about = "Angle-resolved second-harmonic measurement control")]
struct Cli {
    /// Path to the measurement configuration (TOML).
    #[arg(short, long, default_value = "measurement.toml")]
    config: PathBuf,

    /// Execute the campaign against simulated hardware instead of only
    /// printing the plan.
    #[arg(long)]
    simulate: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let config = MeasurementConfig::from_file(&cli.config)
        .with_context(|| format!("loading configuration from {}", cli.config.display()))?;

    let plan = SweepPlan::from_config(&config)?;
    println!(
        "planned {} field value(s), {} angle(s) per run",
        plan.fields.len(),
        plan.angles.len()
    );
    for field in &plan.fields {
        println!("  field {field} T");
    }

    if !cli.simulate {
        println!("dry run only; pass --simulate to execute against mock hardware");
        return Ok(());
    }

    let csv_path = config
        .file_root
        .join(format!("{}.csv", config.file_prefix));
    let sink = Arc::new(
        CsvSink::create(&csv_path)
            .with_context(|| format!("creating result file {}", csv_path.display()))?,
    );

    let bench = InstrumentBundle::new(
        Arc::new(MockCurrentSource::new()),
        Arc::new(MockLockin::noisy(1.0e-4, 2.0e-5, 1.0e-6)),
        Arc::new(MockLockin::noisy(5.0e-5, -1.0e-5, 1.0e-6)),
    );
    let queue = RunQueue::new(
        config,
        FieldCalibration::default(),
        Arc::new(MockRotationStage::with_settle_polls(2)),
        bench,
        sink,
        CancelToken::new(),
        RetryPolicy::default(),
    );

    let results = queue.run_all().await?;
    for result in &results {
        println!(
            "field {:.4} T: {} ({} samples)",
            result.field_tesla,
            result.status,
            result.samples.len()
        );
    }
    println!("results written to {}", csv_path.display());
    Ok(())
}
