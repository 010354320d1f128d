//! Percentile statistics over a trace and its windowed timeseries.
//!
//! All percentiles use linear interpolation between the two nearest ranks
//! of the sorted sample (index `p/100 * (n-1)`), which matches the common
//! numerical-library default that downstream plotting tools expect.

use crate::error::{Result, TraceError};
use crate::trace::Trace;
use crate::utils::calculate_stats;
use crate::window::TraceTimeseries;
use serde::{Deserialize, Serialize};

/// Percentile value pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PercentileValue {
    pub percentile: f64,
    pub value: f64,
}

/// Percentile `p` (0-100) of an already sorted, non-empty sample.
pub fn percentile_of_sorted(sorted: &[f64], p: f64) -> Result<f64> {
    if sorted.is_empty() {
        return Err(TraceError::EmptySample);
    }

    let index = (p.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lower_index = index.floor() as usize;
    let upper_index = index.ceil() as usize;

    if lower_index == upper_index {
        Ok(sorted[lower_index])
    } else {
        let lower_value = sorted[lower_index];
        let upper_value = sorted[upper_index];
        let weight = index - lower_index as f64;
        Ok(lower_value + weight * (upper_value - lower_value))
    }
}

/// Compute several percentiles of `values`, sorting a copy once.
pub fn calculate_percentiles(values: &[f64], percentiles: &[f64]) -> Result<Vec<PercentileValue>> {
    if values.is_empty() {
        return Err(TraceError::EmptySample);
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    percentiles
        .iter()
        .map(|&p| {
            Ok(PercentileValue {
                percentile: p,
                value: percentile_of_sorted(&sorted, p)?,
            })
        })
        .collect()
}

/// p50/p90/p99 of the sample, in that order.
pub(crate) fn upper_tail(values: &[f64]) -> Result<[f64; 3]> {
    let v = calculate_percentiles(values, &[50.0, 90.0, 99.0])?;
    Ok([v[0].value, v[1].value, v[2].value])
}

/// Whole-trace request latency percentiles, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatencySummary {
    pub p99: f64,
    pub p90: f64,
    pub p50: f64,
}

/// Per-window throughput percentiles, in requests per second. The low tail
/// is reported because dips are what matter for throughput.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThroughputSummary {
    pub p50: f64,
    pub p10: f64,
    pub p1: f64,
}

/// Per-window outstanding-request percentiles.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutstandingSummary {
    pub p99: f64,
    pub p90: f64,
    pub p50: f64,
}

/// Whole-trace summary written under the artifact's `aggregate` key.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggregateSummary {
    pub latency: LatencySummary,
    pub throughput: ThroughputSummary,
    pub outstanding: OutstandingSummary,
}

/// Summarize all-trace latencies and a windowed timeseries. Pure; fails
/// with `EmptySample` if either input is empty.
pub fn summarize(
    trace_latencies_ms: &[f64],
    timeseries: &TraceTimeseries,
) -> Result<AggregateSummary> {
    let [lat_p50, lat_p90, lat_p99] = upper_tail(trace_latencies_ms)?;

    let throughput = timeseries.throughput();
    let tp = calculate_percentiles(&throughput, &[50.0, 10.0, 1.0])?;

    let outstanding: Vec<f64> = timeseries.outstanding().iter().map(|&n| n as f64).collect();
    let [out_p50, out_p90, out_p99] = upper_tail(&outstanding)?;

    Ok(AggregateSummary {
        latency: LatencySummary {
            p99: lat_p99,
            p90: lat_p90,
            p50: lat_p50,
        },
        throughput: ThroughputSummary {
            p50: tp[0].value,
            p10: tp[1].value,
            p1: tp[2].value,
        },
        outstanding: OutstandingSummary {
            p99: out_p99,
            p90: out_p90,
            p50: out_p50,
        },
    })
}

/// Offered versus provided load for a trace.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoadProfile {
    pub requests: usize,
    pub mean_interarrival_ns: f64,
    /// Arrival rate implied by the mean gap between starts.
    pub offered_load_rps: f64,
    /// Completed requests over the span from first start to last finish.
    pub provided_load_rps: f64,
    pub mean_latency_ms: f64,
    pub latency_std_dev_ms: f64,
    /// Mean latency over mean inter-arrival time, in erlangs.
    pub utilization: f64,
}

impl LoadProfile {
    /// `None` when the trace has fewer than two requests or all of them
    /// start in the same nanosecond.
    pub fn from_trace(trace: &Trace) -> Option<Self> {
        let spans = trace.spans();
        if spans.len() < 2 {
            return None;
        }

        let first_start = spans[0].start_ns;
        let last_start = spans[spans.len() - 1].start_ns;
        let mean_gap_ns = (last_start - first_start) as f64 / (spans.len() - 1) as f64;
        if mean_gap_ns <= 0.0 {
            return None;
        }

        let last_finish = spans.iter().map(|s| s.finish_ns).max()?;
        let elapsed_ns = (last_finish - first_start) as f64;

        let (mean_latency_ms, _, _, latency_std_dev_ms) = calculate_stats(&trace.latencies_ms());

        Some(Self {
            requests: spans.len(),
            mean_interarrival_ns: mean_gap_ns,
            offered_load_rps: 1e9 / mean_gap_ns,
            provided_load_rps: spans.len() as f64 / elapsed_ns * 1e9,
            mean_latency_ms,
            latency_std_dev_ms,
            utilization: mean_latency_ms / (mean_gap_ns / 1e6),
        })
    }
}
