//! # Workload Trace Library
//!
//! Post-processing for load-generator request traces. A workload driver
//! logs one line when each request starts and one when it finishes; this
//! library joins those logs into a trace and reduces it to a fixed-width
//! windowed timeseries of throughput, outstanding requests and latency
//! percentiles, plus whole-run summary statistics.
//!
//! ## Architecture Overview
//!
//! - `record`: parsing of `<request_id> <timestamp_ns>` log lines
//! - `trace`: join, ordering and warm-up/cool-down trimming of requests
//! - `outstanding`: min-heap of in-flight finish times
//! - `window`: the single-pass window aggregation engine
//! - `metrics`: percentiles, the aggregate summary and the load profile
//! - `flags` and `results`: the experiment artifact and its persistence
//! - `analysis`: end-to-end orchestration and batch regeneration
//!
//! ## Usage Example
//!
//! ```rust
//! use workload_trace::{aggregate, summarize, Span, Trace, WindowConfig};
//!
//! # fn main() -> Result<(), workload_trace::TraceError> {
//! let trace = Trace::from_spans(vec![
//!     Span { start_ns: 0, finish_ns: 50_000_000 },
//!     Span { start_ns: 10_000_000, finish_ns: 60_000_000 },
//!     Span { start_ns: 200_000_000, finish_ns: 210_000_000 },
//! ])?;
//!
//! let config = WindowConfig::new(100_000_000, 300_000_000)?;
//! let aggregation = aggregate(&trace, &config)?;
//! let summary = summarize(&aggregation.latencies_ms, &aggregation.timeseries)?;
//!
//! assert_eq!(aggregation.timeseries.len(), 4);
//! assert_eq!(summary.latency.p50, 50.0);
//! # Ok(())
//! # }
//! ```

/// End-to-end analysis of one experiment and the batch `regen` workflow.
pub mod analysis;

/// Command-line interface
///
/// Argument model for the `process`, `analyze` and `regen` subcommands and
/// human-readable duration parsing (e.g., "100ms", "30s", "5m").
pub mod cli;

pub mod error;

/// Typed workload-driver flags carried through into results.
pub mod flags;

pub mod logging;

/// Percentile calculation and summary statistics
///
/// Linear-interpolation percentiles over windowed and whole-trace samples,
/// the aggregate summary written into every artifact, and the offered versus
/// provided load profile shown in reports.
pub mod metrics;

pub mod outstanding;

pub mod record;

/// Results artifact and its YAML/JSON persistence
pub mod results;

pub mod trace;

pub mod utils;

pub mod window;

pub use analysis::{AnalysisConfig, AnalysisOutcome, TraceAnalyzer};
pub use cli::Args;
pub use error::{Result, TraceError};
pub use flags::{FlagValue, WorkloadFlags};
pub use metrics::{summarize, AggregateSummary, LoadProfile};
pub use outstanding::OutstandingSet;
pub use results::{ExperimentResults, ResultsWriter};
pub use trace::{BuildReport, Span, Trace, TraceBuilder, TrimWindow};
pub use window::{aggregate, Aggregation, TraceTimeseries, WindowConfig, WindowRow};

/// The current version of the workload trace tool
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration values
pub mod defaults {
    /// Default aggregation window width: 100 ms
    ///
    /// Wide enough that a window at a few hundred requests per second still
    /// holds a usable latency sample, narrow enough to show sub-second
    /// throughput dips.
    pub const WINDOW_WIDTH_NS: u64 = 100_000_000;

    /// Default warm-up margin in seconds; zero disables the leading cut.
    pub const IGNORE_START_SECONDS: f64 = 0.0;

    /// Default results file name
    ///
    /// A `.json` extension on `--output-file` switches the format to JSON.
    pub const OUTPUT_FILE: &str = "experiment.yaml";

    /// Subdirectory of an experiment directory holding replay traces
    pub const TRACE_DIR: &str = "traces";

    /// Suffix appended to an experiment directory name by `regen`
    pub const REGEN_SUFFIX: &str = "_regen";
}
