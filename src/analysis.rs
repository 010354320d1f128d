//! # Experiment Analysis
//!
//! Ties the pipeline together: build or load a [`Trace`], aggregate it into
//! windows, summarize, and package the result as an [`ExperimentResults`]
//! artifact. Also hosts the batch `regen` workflow that rebuilds every
//! artifact of an experiment directory from its saved traces.

use crate::cli::{TrimArgs, WindowArgs};
use crate::error::{Result, TraceError};
use crate::flags::WorkloadFlags;
use crate::metrics::{summarize, LoadProfile};
use crate::results::{ExperimentHeader, ExperimentResults, ResultsWriter};
use crate::trace::{BuildReport, Trace, TraceBuilder, TrimWindow};
use crate::utils::{
    format_duration_ns, format_latency_ms, format_request_rate, format_table_row,
    format_table_separator,
};
use crate::window::{aggregate, WindowConfig};
use anyhow::Context;
use rayon::prelude::*;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info, warn};

fn duration_ns(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

/// Everything needed to analyze one experiment.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisConfig {
    pub window: WindowConfig,
    pub trim: TrimWindow,
    pub name: Option<String>,
    pub flags: WorkloadFlags,
}

impl AnalysisConfig {
    /// Resolve command-line options against the workload flags.
    ///
    /// The duration comes from `--duration`, falling back to the flags'
    /// `duration` entry. `--ignore-end` defaults to that duration.
    pub fn from_args(
        window: &WindowArgs,
        trim: &TrimArgs,
        flags: WorkloadFlags,
        name: Option<String>,
    ) -> Result<Self> {
        let duration = match window.duration {
            Some(duration) => duration,
            None => flags.duration()?.ok_or(TraceError::MissingDuration)?,
        };

        let window = WindowConfig::new(duration_ns(window.window_width), duration_ns(duration))?;
        let ignore_end = trim.ignore_end.unwrap_or_else(|| duration.as_secs_f64());
        let trim = TrimWindow::new(trim.ignore_start, Some(ignore_end))?;

        Ok(Self {
            window,
            trim,
            name,
            flags,
        })
    }
}

/// A finished analysis: the artifact plus the context used to print a
/// report.
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub results: ExperimentResults,
    pub trace: Trace,
    /// Join statistics; present only when built from raw logs.
    pub report: Option<BuildReport>,
    pub load: Option<LoadProfile>,
    pub observed_windows: usize,
}

pub struct TraceAnalyzer {
    config: AnalysisConfig,
}

impl TraceAnalyzer {
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    /// Join raw start/finish logs, trim, and analyze.
    pub fn analyze_records(&self, starts: &Path, finishes: &Path) -> Result<AnalysisOutcome> {
        info!("Building trace from {:?} and {:?}", starts, finishes);
        let built = TraceBuilder::new()
            .with_trim(self.config.trim)
            .build_from_files(starts, finishes)?;
        self.summarize(built.trace, Some(built.report))
    }

    /// Load a replay file, trim, and analyze.
    pub fn analyze_replay(&self, path: &Path) -> Result<AnalysisOutcome> {
        info!("Loading trace replay {:?}", path);
        let trace = Trace::read_replay(path)?;
        self.analyze_trace(trace)
    }

    /// Trim an already built trace and analyze it.
    pub fn analyze_trace(&self, trace: Trace) -> Result<AnalysisOutcome> {
        let (trace, leading, trailing) = trace.trim(&self.config.trim)?;
        if leading + trailing > 0 {
            debug!("Trimmed {} leading and {} trailing requests", leading, trailing);
        }
        self.summarize(trace, None)
    }

    fn summarize(&self, trace: Trace, report: Option<BuildReport>) -> Result<AnalysisOutcome> {
        let window = &self.config.window;
        debug!(
            "Aggregating {} requests into {} windows of {}",
            trace.len(),
            window.window_count(),
            format_duration_ns(window.window_width_ns)
        );

        let aggregation = aggregate(&trace, window)?;
        let summary = summarize(&aggregation.latencies_ms, &aggregation.timeseries)?;

        let load = LoadProfile::from_trace(&trace);
        match &load {
            Some(load) => info!(
                "Offered load {}, provided load {}, utilization {:.2} erlangs",
                format_request_rate(load.offered_load_rps),
                format_request_rate(load.provided_load_rps),
                load.utilization
            ),
            None => warn!("Too few distinct start times to compute a load profile"),
        }

        Ok(AnalysisOutcome {
            results: ExperimentResults {
                name: self.config.name.clone(),
                flags: self.config.flags.clone(),
                aggregate: summary,
                ts: aggregation.timeseries,
            },
            trace,
            report,
            load,
            observed_windows: aggregation.observed_windows,
        })
    }
}

const TABLE_WIDTHS: [usize; 2] = [24, 18];

fn write_row(f: &mut fmt::Formatter<'_>, label: &str, value: String) -> fmt::Result {
    writeln!(f, "{}", format_table_row(&[label, &value], &TABLE_WIDTHS))
}

impl fmt::Display for AnalysisOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let results = &self.results;
        let aggregate = &results.aggregate;
        let separator = format_table_separator(&TABLE_WIDTHS);

        writeln!(f, "Experiment: {}", results.name.as_deref().unwrap_or("(unnamed)"))?;
        writeln!(
            f,
            "Requests: {}  Windows: {} ({} observed)",
            self.trace.len(),
            results.ts.len(),
            self.observed_windows
        )?;

        writeln!(f, "{}", separator)?;
        write_row(f, "latency p50", format_latency_ms(aggregate.latency.p50))?;
        write_row(f, "latency p90", format_latency_ms(aggregate.latency.p90))?;
        write_row(f, "latency p99", format_latency_ms(aggregate.latency.p99))?;
        writeln!(f, "{}", separator)?;
        write_row(f, "throughput p50", format_request_rate(aggregate.throughput.p50))?;
        write_row(f, "throughput p10", format_request_rate(aggregate.throughput.p10))?;
        write_row(f, "throughput p1", format_request_rate(aggregate.throughput.p1))?;
        writeln!(f, "{}", separator)?;
        write_row(f, "outstanding p50", format!("{:.1}", aggregate.outstanding.p50))?;
        write_row(f, "outstanding p90", format!("{:.1}", aggregate.outstanding.p90))?;
        write_row(f, "outstanding p99", format!("{:.1}", aggregate.outstanding.p99))?;
        writeln!(f, "{}", separator)?;

        if let Some(report) = &self.report {
            write_row(f, "start records", report.start_records.to_string())?;
            write_row(f, "finish records", report.finish_records.to_string())?;
            write_row(f, "duplicate records", report.duplicate_records.to_string())?;
            write_row(f, "conflicting records", report.conflicting_records.to_string())?;
            write_row(f, "duplicate spans", report.duplicate_spans.to_string())?;
            write_row(f, "unfinished requests", report.unfinished.to_string())?;
            write_row(f, "orphan finishes", report.orphan_finishes.to_string())?;
            write_row(
                f,
                "trimmed (lead/trail)",
                format!("{}/{}", report.trimmed_leading, report.trimmed_trailing),
            )?;
            writeln!(f, "{}", separator)?;
        }

        if let Some(load) = &self.load {
            write_row(f, "offered load", format_request_rate(load.offered_load_rps))?;
            write_row(f, "provided load", format_request_rate(load.provided_load_rps))?;
            write_row(
                f,
                "mean latency",
                format!(
                    "{} ± {}",
                    format_latency_ms(load.mean_latency_ms),
                    format_latency_ms(load.latency_std_dev_ms)
                ),
            )?;
            write_row(f, "utilization", format!("{:.2} erlangs", load.utilization))?;
            writeln!(f, "{}", separator)?;
        }

        Ok(())
    }
}

/// Result of a batch regeneration.
#[derive(Debug, Default)]
pub struct RegenOutcome {
    pub output_dir: PathBuf,
    pub regenerated: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
}

/// Directory regenerated artifacts go to: `<dir><REGEN_SUFFIX>` next to `dir`.
pub fn regen_output_dir(dir: &Path) -> anyhow::Result<PathBuf> {
    let dir = if dir.file_name().is_some() {
        dir.to_path_buf()
    } else {
        dir.canonicalize()
            .with_context(|| format!("Failed to resolve experiment directory {:?}", dir))?
    };
    let name = dir
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("Experiment directory {:?} has no name", dir))?;

    let mut regen_name = name.to_os_string();
    regen_name.push(crate::defaults::REGEN_SUFFIX);
    Ok(dir.with_file_name(regen_name))
}

fn is_artifact(path: &Path) -> bool {
    path.is_file()
        && matches!(
            path.extension().and_then(|ext| ext.to_str()),
            Some("yaml") | Some("yml")
        )
}

/// Rebuild every YAML artifact in `dir` from `dir/traces/<stem>.txt`,
/// writing the new artifacts to [`regen_output_dir`]. Experiments are
/// independent: a failure is logged and recorded and the rest still run.
pub fn regenerate(dir: &Path, window: &WindowArgs) -> anyhow::Result<RegenOutcome> {
    let output_dir = regen_output_dir(dir)?;
    let traces_dir = dir.join(crate::defaults::TRACE_DIR);

    let mut artifacts: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read experiment directory {:?}", dir))?
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| is_artifact(path))
        .collect();
    artifacts.sort();

    if artifacts.is_empty() {
        warn!("No results files found in {:?}", dir);
    }
    info!(
        "Regenerating {} experiments from {:?} into {:?}",
        artifacts.len(),
        dir,
        output_dir
    );

    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create output directory {:?}", output_dir))?;

    let results: Vec<(PathBuf, anyhow::Result<PathBuf>)> = artifacts
        .into_par_iter()
        .map(|artifact| {
            let result = regenerate_one(&artifact, &traces_dir, &output_dir, window);
            (artifact, result)
        })
        .collect();

    let mut outcome = RegenOutcome {
        output_dir,
        ..Default::default()
    };
    for (artifact, result) in results {
        match result {
            Ok(written) => outcome.regenerated.push(written),
            Err(e) => {
                error!("Failed to regenerate {:?}: {:#}", artifact, e);
                outcome.failed.push((artifact, format!("{:#}", e)));
            }
        }
    }

    Ok(outcome)
}

fn regenerate_one(
    artifact: &Path,
    traces_dir: &Path,
    output_dir: &Path,
    window: &WindowArgs,
) -> anyhow::Result<PathBuf> {
    let header = ExperimentHeader::load(artifact)?;
    let stem = artifact
        .file_stem()
        .ok_or_else(|| anyhow::anyhow!("Results file {:?} has no name", artifact))?;
    let file_name = artifact
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("Results file {:?} has no name", artifact))?;

    let mut trace_name = stem.to_os_string();
    trace_name.push(".txt");
    let trace_path = traces_dir.join(trace_name);

    let config = AnalysisConfig::from_args(window, &TrimArgs::default(), header.flags, header.name)
        .with_context(|| format!("Invalid configuration in {:?}", artifact))?;
    let outcome = TraceAnalyzer::new(config).analyze_replay(&trace_path)?;

    let output = output_dir.join(file_name);
    ResultsWriter::new(&output).write(&outcome.results)?;
    debug!("Regenerated {:?} -> {:?}", artifact, output);
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::FlagValue;
    use crate::trace::Span;
    use tempfile::TempDir;

    fn window_args(duration: Option<Duration>) -> WindowArgs {
        WindowArgs {
            duration,
            ..Default::default()
        }
    }

    fn three_requests() -> Trace {
        Trace::from_spans(vec![
            Span { start_ns: 0, finish_ns: 50_000_000 },
            Span { start_ns: 10_000_000, finish_ns: 60_000_000 },
            Span { start_ns: 200_000_000, finish_ns: 210_000_000 },
        ])
        .unwrap()
    }

    #[test]
    fn test_duration_from_arguments() {
        let config = AnalysisConfig::from_args(
            &window_args(Some(Duration::from_millis(300))),
            &TrimArgs::default(),
            WorkloadFlags::new(),
            None,
        )
        .unwrap();

        assert_eq!(config.window.duration_ns, 300_000_000);
        assert_eq!(config.window.window_width_ns, 100_000_000);
        assert_eq!(config.trim.ignore_end_s, Some(0.3));
        assert_eq!(config.trim.ignore_start_s, 0.0);
    }

    #[test]
    fn test_duration_falls_back_to_flags() {
        let mut flags = WorkloadFlags::new();
        flags.insert("duration", FlagValue::Str("2m".to_string()));

        let config =
            AnalysisConfig::from_args(&window_args(None), &TrimArgs::default(), flags, None)
                .unwrap();
        assert_eq!(config.window.duration_ns, 120_000_000_000);
        assert_eq!(config.trim.ignore_end_s, Some(120.0));
    }

    #[test]
    fn test_missing_duration() {
        let err = AnalysisConfig::from_args(
            &window_args(None),
            &TrimArgs::default(),
            WorkloadFlags::new(),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, TraceError::MissingDuration));
    }

    #[test]
    fn test_invalid_trim_rejected() {
        let trim = TrimArgs {
            ignore_start: 5.0,
            ignore_end: Some(1.0),
        };
        let err = AnalysisConfig::from_args(
            &window_args(Some(Duration::from_secs(10))),
            &trim,
            WorkloadFlags::new(),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, TraceError::InvalidTrim { .. }));
    }

    #[test]
    fn test_analyze_trace_produces_artifact() {
        let config = AnalysisConfig::from_args(
            &window_args(Some(Duration::from_millis(300))),
            &TrimArgs::default(),
            WorkloadFlags::new(),
            Some("three".to_string()),
        )
        .unwrap();

        let outcome = TraceAnalyzer::new(config).analyze_trace(three_requests()).unwrap();
        assert_eq!(outcome.results.name.as_deref(), Some("three"));
        assert_eq!(outcome.results.ts.len(), 4);
        assert_eq!(outcome.results.ts.throughput(), vec![0.0, 20.0, 0.0, 10.0]);
        assert_eq!(outcome.results.aggregate.latency.p50, 50.0);
        assert!(outcome.report.is_none());
        assert!(outcome.load.is_some());

        let report = outcome.to_string();
        assert!(report.contains("Experiment: three"));
        assert!(report.contains("latency p50"));
        assert!(report.contains("offered load"));
    }

    #[test]
    fn test_regen_output_dir() {
        assert_eq!(
            regen_output_dir(Path::new("runs/open-loop")).unwrap(),
            PathBuf::from("runs/open-loop_regen")
        );
    }

    #[test]
    fn test_regenerate_continues_past_failures() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("exp");
        std::fs::create_dir_all(dir.join("traces")).unwrap();

        std::fs::write(dir.join("good.yaml"), "name: good\nflags:\n  duration: 300ms\n").unwrap();
        std::fs::write(
            dir.join("traces/good.txt"),
            "0\t50000000\n10000000\t60000000\n200000000\t210000000\n",
        )
        .unwrap();
        // No trace file for this one.
        std::fs::write(dir.join("missing.yaml"), "flags:\n  duration: 1s\n").unwrap();
        std::fs::write(dir.join("notes.txt"), "not an artifact").unwrap();

        let outcome = regenerate(&dir, &WindowArgs::default()).unwrap();

        assert_eq!(outcome.output_dir, root.path().join("exp_regen"));
        assert_eq!(outcome.regenerated, vec![root.path().join("exp_regen/good.yaml")]);
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].0, dir.join("missing.yaml"));

        let regenerated = ExperimentResults::load(&outcome.regenerated[0]).unwrap();
        assert_eq!(regenerated.name.as_deref(), Some("good"));
        assert_eq!(regenerated.ts.len(), 4);
    }
}
