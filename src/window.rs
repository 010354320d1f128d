//! # Window Aggregation Engine
//!
//! Turns a start-ordered [`Trace`] into a fixed-width windowed timeseries in
//! a single pass.
//!
//! ## Windows
//!
//! Window `k` covers `(start0 + (k-1)*W, start0 + k*W]`, where `start0` is
//! the first request's start time and `W` the configured width. Window 0 is
//! a synthetic zero-length window ending at `start0`; its row is always
//! zero. The number of windows is `ceil(duration / W) + 1`.
//!
//! ## The sweep
//!
//! Requests are visited in start order. Before a request is classified,
//! every window whose right edge lies strictly before its start is closed.
//! Closing a window drains the [`OutstandingSet`] of everything completing
//! at or before the edge, then records the remaining in-flight count, the
//! completion rate and the latency percentiles of the requests that
//! completed inside it. Closing loops, so a gap in arrivals produces a run
//! of empty windows rather than being folded into one.
//!
//! A request is then either complete by the current edge (counted, and its
//! latency kept for this window) or still outstanding (its finish time
//! pushed onto the set). A finish exactly on the edge counts as complete.
//!
//! Requests drained from the set add to a window's throughput but not to
//! its latency sample: only requests that complete within the window they
//! were classified in contribute latencies.
//!
//! The last request closes one extra window before it is classified, and the
//! window it lands in is closed after the loop. Windows left over when the
//! trace ends early carry the last outstanding count forward with zero
//! throughput and latency. Requests arriving after the final window still
//! contribute to the whole-trace latency sample.

use crate::error::{Result, TraceError};
use crate::metrics::upper_tail;
use crate::outstanding::OutstandingSet;
use crate::trace::{Span, Trace};
use serde::{Deserialize, Serialize};
use tracing::debug;

const NANOS_PER_SECOND: f64 = 1_000_000_000.0;

/// Window width and experiment duration for one aggregation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowConfig {
    pub window_width_ns: u64,
    pub duration_ns: u64,
}

impl WindowConfig {
    pub fn new(window_width_ns: u64, duration_ns: u64) -> Result<Self> {
        let config = Self {
            window_width_ns,
            duration_ns,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.window_width_ns == 0 {
            return Err(TraceError::InvalidWindowWidth(self.window_width_ns));
        }
        if self.duration_ns == 0 {
            return Err(TraceError::InvalidDuration(self.duration_ns));
        }
        Ok(())
    }

    /// `ceil(duration / width) + 1`, counting the zero window.
    pub fn window_count(&self) -> usize {
        let full = self.duration_ns / self.window_width_ns;
        let partial = u64::from(self.duration_ns % self.window_width_ns != 0);
        (full + partial + 1) as usize
    }

    /// Right edge of window `idx`, as an offset from the trace start, in
    /// seconds.
    pub fn window_offset_secs(&self, idx: usize) -> f64 {
        idx as f64 * self.window_width_ns as f64 / NANOS_PER_SECOND
    }
}

/// Statistics for one window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WindowRow {
    /// Requests still in flight at the window's right edge.
    pub outstanding: u64,
    /// Completions in the window, in requests per second.
    pub throughput: f64,
    pub p50_latency_ms: f64,
    pub p90_latency_ms: f64,
    pub p99_latency_ms: f64,
}

/// Index-aligned window rows plus each window's right-edge offset in
/// seconds. Serialized as parallel columns, which is what plotting tools
/// consume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "TimeseriesColumns", try_from = "TimeseriesColumns")]
pub struct TraceTimeseries {
    rows: Vec<WindowRow>,
    seconds: Vec<f64>,
}

impl TraceTimeseries {
    pub fn rows(&self) -> &[WindowRow] {
        &self.rows
    }

    pub fn seconds(&self) -> &[f64] {
        &self.seconds
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn outstanding(&self) -> Vec<u64> {
        self.rows.iter().map(|r| r.outstanding).collect()
    }

    pub fn throughput(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.throughput).collect()
    }
}

/// Column layout of a [`TraceTimeseries`] on disk. Field names are part of
/// the interchange format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeseriesColumns {
    pub outstanding: Vec<u64>,
    pub seconds: Vec<f64>,
    pub throughput: Vec<f64>,
    pub p99: Vec<f64>,
    pub p90: Vec<f64>,
    pub p50: Vec<f64>,
}

impl From<TraceTimeseries> for TimeseriesColumns {
    fn from(ts: TraceTimeseries) -> Self {
        Self {
            outstanding: ts.rows.iter().map(|r| r.outstanding).collect(),
            throughput: ts.rows.iter().map(|r| r.throughput).collect(),
            p99: ts.rows.iter().map(|r| r.p99_latency_ms).collect(),
            p90: ts.rows.iter().map(|r| r.p90_latency_ms).collect(),
            p50: ts.rows.iter().map(|r| r.p50_latency_ms).collect(),
            seconds: ts.seconds,
        }
    }
}

impl TryFrom<TimeseriesColumns> for TraceTimeseries {
    type Error = TraceError;

    fn try_from(cols: TimeseriesColumns) -> Result<Self> {
        let n = cols.outstanding.len();
        let lengths = [
            cols.seconds.len(),
            cols.throughput.len(),
            cols.p99.len(),
            cols.p90.len(),
            cols.p50.len(),
        ];
        if lengths.iter().any(|&len| len != n) {
            return Err(TraceError::TimeseriesShape(format!(
                "outstanding={}, seconds={}, throughput={}, p99={}, p90={}, p50={}",
                n, lengths[0], lengths[1], lengths[2], lengths[3], lengths[4]
            )));
        }

        let rows = (0..n)
            .map(|i| WindowRow {
                outstanding: cols.outstanding[i],
                throughput: cols.throughput[i],
                p50_latency_ms: cols.p50[i],
                p90_latency_ms: cols.p90[i],
                p99_latency_ms: cols.p99[i],
            })
            .collect();

        Ok(Self {
            rows,
            seconds: cols.seconds,
        })
    }
}

/// Output of one aggregation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregation {
    pub timeseries: TraceTimeseries,
    /// Latency of every request in the trace, in trace order, in ms.
    pub latencies_ms: Vec<f64>,
    /// Windows computed from data, including window 0. Rows past this index
    /// were carried forward.
    pub observed_windows: usize,
}

/// Sweep state for a single run. Owns the outstanding set for the run's
/// whole lifetime.
struct WindowSweep<'a> {
    config: &'a WindowConfig,
    window_count: usize,
    window_edge: u64,
    outstanding: OutstandingSet,
    finished_in_window: u64,
    latencies_in_window: Vec<f64>,
    rows: Vec<WindowRow>,
}

impl<'a> WindowSweep<'a> {
    fn new(config: &'a WindowConfig, start0: u64, requests: usize) -> Self {
        let window_count = config.window_count();
        let mut rows = Vec::with_capacity(window_count);
        rows.push(WindowRow::default());

        Self {
            config,
            window_count,
            window_edge: start0.saturating_add(config.window_width_ns),
            outstanding: OutstandingSet::with_capacity(requests),
            finished_in_window: 0,
            latencies_in_window: Vec::new(),
            rows,
        }
    }

    /// Index of the window currently being filled.
    fn window_idx(&self) -> usize {
        self.rows.len()
    }

    fn is_done(&self) -> bool {
        self.window_idx() >= self.window_count
    }

    fn close_window(&mut self) -> Result<()> {
        self.finished_in_window += self.outstanding.drain_until(self.window_edge)? as u64;

        if self.latencies_in_window.is_empty() {
            self.latencies_in_window.push(0.0);
        }
        let [p50, p90, p99] = upper_tail(&self.latencies_in_window)?;

        self.rows.push(WindowRow {
            outstanding: self.outstanding.size() as u64,
            throughput: self.finished_in_window as f64 * NANOS_PER_SECOND
                / self.config.window_width_ns as f64,
            p50_latency_ms: p50,
            p90_latency_ms: p90,
            p99_latency_ms: p99,
        });

        self.latencies_in_window.clear();
        self.finished_in_window = 0;
        self.window_edge = self.window_edge.saturating_add(self.config.window_width_ns);
        Ok(())
    }

    fn classify(&mut self, span: &Span) {
        if span.finish_ns > self.window_edge {
            self.outstanding.push(span.finish_ns);
        } else {
            self.finished_in_window += 1;
            self.latencies_in_window.push(span.latency_ms());
        }
    }

    /// Pad to the full window count, carrying the last outstanding count.
    fn finish(mut self) -> (Vec<WindowRow>, usize) {
        let observed = self.rows.len();
        let carried = self.rows.last().map_or(0, |row| row.outstanding);
        self.rows.resize(
            self.window_count,
            WindowRow {
                outstanding: carried,
                ..Default::default()
            },
        );
        (self.rows, observed)
    }
}

/// Run the windowed aggregation over `trace`.
///
/// Deterministic: the same trace and configuration always produce the same
/// output.
pub fn aggregate(trace: &Trace, config: &WindowConfig) -> Result<Aggregation> {
    config.validate()?;
    if trace.is_empty() {
        return Err(TraceError::EmptyTrace);
    }

    let spans = trace.spans();
    let mut sweep = WindowSweep::new(config, trace.start_ns(), spans.len());
    let mut latencies_ms = Vec::with_capacity(spans.len());

    for (i, span) in spans.iter().enumerate() {
        latencies_ms.push(span.latency_ms());
        if sweep.is_done() {
            continue;
        }

        while !sweep.is_done() && span.start_ns > sweep.window_edge {
            sweep.close_window()?;
        }
        if i + 1 == spans.len() && !sweep.is_done() {
            sweep.close_window()?;
        }
        if sweep.is_done() {
            continue;
        }

        sweep.classify(span);
    }

    if !sweep.is_done() {
        sweep.close_window()?;
    }

    let (rows, observed_windows) = sweep.finish();
    let seconds = (0..rows.len()).map(|i| config.window_offset_secs(i)).collect();

    debug!(
        "Aggregated {} requests into {} windows ({} observed)",
        spans.len(),
        rows.len(),
        observed_windows
    );

    Ok(Aggregation {
        timeseries: TraceTimeseries { rows, seconds },
        latencies_ms,
        observed_windows,
    })
}
