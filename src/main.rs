//! # Workload Trace - Main Entry Point
//!
//! Command-line front end for the trace analysis library:
//!
//! - `process`: join raw start/finish logs, analyze, write the results file
//! - `analyze`: analyze a saved replay trace
//! - `regen`: rebuild every results file of an experiment directory
//!
//! The report is printed to stdout; logs go to stderr (and optionally a
//! file).

use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use tracing::{debug, error, info};
use workload_trace::{
    analysis::{regenerate, AnalysisConfig, TraceAnalyzer},
    cli::{AnalyzeArgs, Args, Command, ExperimentArgs, ProcessArgs, RegenArgs},
    flags::WorkloadFlags,
    logging,
    results::ResultsWriter,
};

fn main() -> Result<()> {
    let args = Args::parse();

    // Held until exit so the file writer flushes.
    let _log_guard = logging::init(args.verbose, args.log_file.as_deref())?;

    info!("Starting workload-trace {}", workload_trace::VERSION);
    debug!("Configuration: {:?}", args);

    match args.command {
        Command::Process(process) => run_process(&process),
        Command::Analyze(analyze) => run_analyze(&analyze),
        Command::Regen(regen) => run_regen(&regen),
    }
}

fn load_flags(experiment: &ExperimentArgs) -> Result<WorkloadFlags> {
    let flags = match &experiment.flags {
        Some(path) => WorkloadFlags::load(path)
            .with_context(|| format!("Failed to load workload flags from {:?}", path))?,
        None => WorkloadFlags::new(),
    };
    if !flags.is_empty() {
        debug!("Workload driver arguments: {}", flags.to_command_args().join(" "));
    }
    Ok(flags)
}

fn run_process(args: &ProcessArgs) -> Result<()> {
    // Resolve window, trim and workload flags into one configuration
    let flags = load_flags(&args.experiment)?;
    let name = args.experiment.name.clone();
    let config = AnalysisConfig::from_args(&args.window, &args.trim, flags, name)?;
    let analyzer = TraceAnalyzer::new(config);

    // Join the raw logs, then trim, aggregate and summarize
    let outcome = analyzer
        .analyze_records(&args.starts, &args.finishes)
        .with_context(|| format!("Failed to analyze {:?} and {:?}", args.starts, args.finishes))?;

    // Save the joined trace so it can be analyzed again without the raw logs
    if let Some(trace_out) = &args.trace_out {
        outcome
            .trace
            .write_replay(trace_out)
            .with_context(|| format!("Failed to save trace to {:?}", trace_out))?;
        info!("Trace saved to: {:?}", trace_out);
    }

    finish(&outcome, &args.output_file)
}

fn run_analyze(args: &AnalyzeArgs) -> Result<()> {
    let flags = load_flags(&args.experiment)?;
    let name = args.experiment.name.clone();
    let config = AnalysisConfig::from_args(&args.window, &args.trim, flags, name)?;

    // Replay traces are already joined; only trim and aggregate
    let outcome = TraceAnalyzer::new(config)
        .analyze_replay(&args.trace)
        .with_context(|| format!("Failed to analyze {:?}", args.trace))?;

    finish(&outcome, &args.output_file)
}

fn finish(outcome: &workload_trace::AnalysisOutcome, output_file: &Path) -> Result<()> {
    // Write the results file before printing the report
    ResultsWriter::new(output_file).write(&outcome.results)?;
    print!("{}", outcome);
    Ok(())
}

fn run_regen(args: &RegenArgs) -> Result<()> {
    // Each experiment is rebuilt independently; failures are collected
    let outcome = regenerate(&args.dir, &args.window)?;

    info!(
        "Regenerated {} experiments into {:?}",
        outcome.regenerated.len(),
        outcome.output_dir
    );

    // Any failed experiment fails the run
    if !outcome.failed.is_empty() {
        error!("{} experiments failed; see errors above", outcome.failed.len());
        anyhow::bail!(
            "{} of {} experiments failed to regenerate",
            outcome.failed.len(),
            outcome.failed.len() + outcome.regenerated.len()
        );
    }
    Ok(())
}
