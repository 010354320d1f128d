use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

/// Workload Trace - windowed throughput, latency and outstanding-request
/// analysis of load-generator request traces
#[derive(Parser, Debug)]
#[clap(version, about, long_about = None)]
pub struct Args {
    /// Verbose output (debug-level logging)
    #[clap(short = 'v', long, global = true, default_value_t = false)]
    pub verbose: bool,

    /// Also write logs to this file
    #[clap(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Join raw start/finish logs into a trace and analyze it
    Process(ProcessArgs),
    /// Analyze a previously saved trace replay file
    Analyze(AnalyzeArgs),
    /// Regenerate every results file of an experiment directory from its traces
    Regen(RegenArgs),
}

/// Window sizing shared by all subcommands
#[derive(clap::Args, Debug, Clone)]
pub struct WindowArgs {
    /// Experiment duration (e.g. "30s", "5m"); defaults to the `duration` workload flag
    #[clap(short = 'd', long, value_parser = parse_duration, help_heading = "Window Options")]
    pub duration: Option<Duration>,

    /// Width of each aggregation window
    #[clap(
        long,
        value_parser = parse_duration,
        default_value = "100ms",
        help_heading = "Window Options"
    )]
    pub window_width: Duration,
}

impl Default for WindowArgs {
    fn default() -> Self {
        Self {
            duration: None,
            window_width: Duration::from_nanos(crate::defaults::WINDOW_WIDTH_NS),
        }
    }
}

/// Warm-up/cool-down trimming, in seconds from the first request
#[derive(clap::Args, Debug, Clone)]
pub struct TrimArgs {
    /// Drop requests starting within this many seconds of the first one
    #[clap(
        long,
        default_value_t = crate::defaults::IGNORE_START_SECONDS,
        help_heading = "Trim Options"
    )]
    pub ignore_start: f64,

    /// Drop requests starting later than this many seconds after the first one
    /// [default: the experiment duration]
    #[clap(long, help_heading = "Trim Options")]
    pub ignore_end: Option<f64>,
}

impl Default for TrimArgs {
    fn default() -> Self {
        Self {
            ignore_start: crate::defaults::IGNORE_START_SECONDS,
            ignore_end: None,
        }
    }
}

/// Experiment metadata carried into the results file
#[derive(clap::Args, Debug, Clone, Default)]
pub struct ExperimentArgs {
    /// YAML file with the workload flags used for the run
    #[clap(long)]
    pub flags: Option<PathBuf>,

    /// Experiment name recorded in the results file
    #[clap(long)]
    pub name: Option<String>,
}

#[derive(clap::Args, Debug, Clone)]
pub struct ProcessArgs {
    /// Start log: one "<request_id> <timestamp_ns>" per line
    #[clap(long)]
    pub starts: PathBuf,

    /// Finish log: one "<request_id> <timestamp_ns>" per line
    #[clap(long)]
    pub finishes: PathBuf,

    #[clap(flatten)]
    pub window: WindowArgs,

    #[clap(flatten)]
    pub trim: TrimArgs,

    #[clap(flatten)]
    pub experiment: ExperimentArgs,

    /// Output file for results (YAML, or JSON for a .json extension)
    #[clap(short = 'o', long, default_value = crate::defaults::OUTPUT_FILE)]
    pub output_file: PathBuf,

    /// Save the rebuilt trace as a replay file
    #[clap(long)]
    pub trace_out: Option<PathBuf>,
}

#[derive(clap::Args, Debug, Clone)]
pub struct AnalyzeArgs {
    /// Replay file: one "<start_ns>\t<finish_ns>" per line
    pub trace: PathBuf,

    #[clap(flatten)]
    pub window: WindowArgs,

    #[clap(flatten)]
    pub trim: TrimArgs,

    #[clap(flatten)]
    pub experiment: ExperimentArgs,

    /// Output file for results (YAML, or JSON for a .json extension)
    #[clap(short = 'o', long, default_value = crate::defaults::OUTPUT_FILE)]
    pub output_file: PathBuf,
}

#[derive(clap::Args, Debug, Clone)]
pub struct RegenArgs {
    /// Experiment directory holding results files and a traces/ subdirectory
    pub dir: PathBuf,

    #[clap(flatten)]
    pub window: WindowArgs,
}

/// Parse duration from string (e.g., "500ms", "10s", "5m", "1h")
///
/// A bare number is taken as seconds. Fractions are allowed.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();

    if s.is_empty() {
        return Err("Duration cannot be empty".to_string());
    }

    let (num_str, scale) = if let Some(stripped) = s.strip_suffix("ms") {
        (stripped, 0.001)
    } else if let Some(stripped) = s.strip_suffix('s') {
        (stripped, 1.0)
    } else if let Some(stripped) = s.strip_suffix('m') {
        (stripped, 60.0)
    } else if let Some(stripped) = s.strip_suffix('h') {
        (stripped, 3600.0)
    } else {
        (s, 1.0) // Default to seconds
    };

    let num: f64 = num_str
        .trim()
        .parse()
        .map_err(|_| format!("Invalid number in duration: {}", num_str))?;

    let secs = num * scale;
    if !secs.is_finite() || secs < 0.0 || secs > u64::MAX as f64 {
        return Err(format!("Duration out of range: {}", s));
    }

    Ok(Duration::from_secs_f64(secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("10s").unwrap(), Duration::from_secs(10));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("100ms").unwrap(), Duration::from_millis(100));
        assert_eq!(parse_duration("10").unwrap(), Duration::from_secs(10));
        assert_eq!(parse_duration("1.5s").unwrap(), Duration::from_millis(1500));

        assert!(parse_duration("").is_err());
        assert!(parse_duration("invalid").is_err());
        assert!(parse_duration("-3s").is_err());
    }

    #[test]
    fn test_process_command_line() {
        let args = Args::try_parse_from([
            "workload-trace",
            "-v",
            "process",
            "--starts",
            "start.txt",
            "--finishes",
            "end.txt",
            "--duration",
            "30s",
            "--ignore-start",
            "2",
            "--trace-out",
            "trace.txt",
        ])
        .unwrap();

        assert!(args.verbose);
        match args.command {
            Command::Process(p) => {
                assert_eq!(p.starts, PathBuf::from("start.txt"));
                assert_eq!(p.window.duration, Some(Duration::from_secs(30)));
                assert_eq!(p.window.window_width, Duration::from_millis(100));
                assert_eq!(p.trim.ignore_start, 2.0);
                assert_eq!(p.trim.ignore_end, None);
                assert_eq!(p.output_file, PathBuf::from(crate::defaults::OUTPUT_FILE));
                assert_eq!(p.trace_out, Some(PathBuf::from("trace.txt")));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_regen_command_line() {
        let args = Args::try_parse_from([
            "workload-trace",
            "regen",
            "open-loop",
            "--window-width",
            "50ms",
        ])
        .unwrap();
        match args.command {
            Command::Regen(r) => {
                assert_eq!(r.dir, PathBuf::from("open-loop"));
                assert_eq!(r.window.window_width, Duration::from_millis(50));
                assert_eq!(r.window.duration, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_process_requires_both_logs() {
        assert!(Args::try_parse_from(["workload-trace", "process", "--starts", "s.txt"]).is_err());
    }
}
