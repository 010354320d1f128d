//! # Utility Functions and Helper Module
//!
//! Formatting and small statistical helpers shared by the report printer
//! and the load-profile computation.
//!
//! ## Key Functionality Categories
//!
//! - **Formatting**: Human-readable display of durations, latencies and
//!   request rates
//! - **Statistics**: Mean, extremes and standard deviation of a sample
//! - **Display Helpers**: Plain-text table rows for the console report
//!
//! ## Usage Examples
//!
//! ```rust
//! use workload_trace::utils::*;
//! use std::time::Duration;
//!
//! assert_eq!(format_duration(Duration::from_micros(1500)), "1.50ms");
//! assert_eq!(format_request_rate(15500.0), "15.50K req/s");
//! ```

use std::time::Duration;

/// Convert nanoseconds to a human-readable duration string
///
/// Convenience wrapper around [`format_duration`] for raw nanosecond
/// values such as window widths and trace offsets.
///
/// ## Examples
///
/// ```rust
/// # use workload_trace::utils::format_duration_ns;
/// assert_eq!(format_duration_ns(500), "500ns");
/// assert_eq!(format_duration_ns(100_000_000), "100.00ms");
/// ```
pub fn format_duration_ns(ns: u64) -> String {
    format_duration(Duration::from_nanos(ns))
}

/// Format a duration in a human-readable way
///
/// Selects the most appropriate unit for the magnitude:
///
/// - **Nanoseconds**: < 1,000 ns (e.g., "500ns")
/// - **Microseconds**: < 1,000,000 ns (e.g., "1.50μs")
/// - **Milliseconds**: < 1,000,000,000 ns (e.g., "25.75ms")
/// - **Seconds**: < 60 seconds (e.g., "5.25s")
/// - **Minutes and Hours**: For longer durations (e.g., "5m 30s", "2h 15m 30s")
///
/// Sub-second units use 2 decimal places; compound units use whole numbers.
///
/// ## Examples
///
/// ```rust
/// # use workload_trace::utils::format_duration;
/// # use std::time::Duration;
/// assert_eq!(format_duration(Duration::from_nanos(750)), "750ns");
/// assert_eq!(format_duration(Duration::from_micros(2500)), "2.50ms");
/// assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
/// ```
pub fn format_duration(duration: Duration) -> String {
    let total_ns = duration.as_nanos();

    if total_ns < 1_000 {
        format!("{}ns", total_ns)
    } else if total_ns < 1_000_000 {
        format!("{:.2}μs", total_ns as f64 / 1_000.0)
    } else if total_ns < 1_000_000_000 {
        format!("{:.2}ms", total_ns as f64 / 1_000_000.0)
    } else if total_ns < 60_000_000_000 {
        format!("{:.2}s", total_ns as f64 / 1_000_000_000.0)
    } else {
        let seconds = duration.as_secs();
        let minutes = seconds / 60;
        let remaining_seconds = seconds % 60;

        if minutes < 60 {
            format!("{}m {}s", minutes, remaining_seconds)
        } else {
            let hours = minutes / 60;
            let remaining_minutes = minutes % 60;
            format!("{}h {}m {}s", hours, remaining_minutes, remaining_seconds)
        }
    }
}

/// Format a latency given in (possibly fractional) milliseconds
///
/// Latencies in the timeseries and summary are kept in milliseconds as
/// `f64`. This renders them with the same unit ladder as
/// [`format_duration`], so a 0.25 ms latency reads as "250.00μs".
pub fn format_latency_ms(latency_ms: f64) -> String {
    if !latency_ms.is_finite() || latency_ms < 0.0 {
        return format!("{}ms", latency_ms);
    }
    format_duration_ns((latency_ms * 1_000_000.0).round() as u64)
}

/// Format a request rate in a human-readable way
///
/// Uses decimal scaling (powers of 1000) for rate measurements:
/// - Requests/sec: < 1,000 (e.g., "750 req/s")
/// - Thousands: < 1,000,000 (e.g., "15.50K req/s")
/// - Millions: ≥ 1,000,000 (e.g., "2.30M req/s")
///
/// ## Examples
///
/// ```rust
/// # use workload_trace::utils::format_request_rate;
/// assert_eq!(format_request_rate(750.0), "750 req/s");
/// assert_eq!(format_request_rate(15500.0), "15.50K req/s");
/// assert_eq!(format_request_rate(2300000.0), "2.30M req/s");
/// ```
pub fn format_request_rate(requests_per_second: f64) -> String {
    if requests_per_second < 1000.0 {
        format!("{:.0} req/s", requests_per_second)
    } else if requests_per_second < 1_000_000.0 {
        format!("{:.2}K req/s", requests_per_second / 1000.0)
    } else {
        format!("{:.2}M req/s", requests_per_second / 1_000_000.0)
    }
}

/// Calculate basic statistics for a vector of values
///
/// ## Returns
/// Tuple of (mean, min, max, standard_deviation) as f64 values
///
/// ## Empty Dataset Handling
///
/// If the input slice is empty, returns (0.0, 0.0, 0.0, 0.0).
///
/// ## Standard Deviation Calculation
///
/// Uses the population standard deviation formula:
/// σ = √(Σ(x - μ)² / N)
///
/// ## Examples
///
/// ```rust
/// # use workload_trace::utils::calculate_stats;
/// let values = vec![1.0, 2.0, 3.0, 4.0, 5.0];
/// let (mean, min, max, std_dev) = calculate_stats(&values);
/// assert_eq!(mean, 3.0);
/// assert_eq!(min, 1.0);
/// assert_eq!(max, 5.0);
/// ```
pub fn calculate_stats(values: &[f64]) -> (f64, f64, f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0, 0.0, 0.0);
    }

    let sum: f64 = values.iter().sum();
    let count = values.len() as f64;
    let mean = sum / count;

    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

    let variance = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / count;
    let std_dev = variance.sqrt();

    (mean, min, max, std_dev)
}

/// Format a table row with consistent column widths
///
/// Columns without an explicit width default to 10 characters.
///
/// ```text
/// | latency     | 1.20ms     | 4.80ms     |
/// ```
pub fn format_table_row(columns: &[&str], widths: &[usize]) -> String {
    let mut row = String::from("|");
    for (i, column) in columns.iter().enumerate() {
        let width = widths.get(i).copied().unwrap_or(10);
        row.push_str(&format!(" {:width$} |", column, width = width));
    }
    row
}

/// Format a table separator matching `widths`
///
/// ```text
/// +-------------+------------+------------+
/// ```
pub fn format_table_separator(widths: &[usize]) -> String {
    let mut line = String::from("+");
    for &width in widths {
        line.push_str(&"-".repeat(width + 2));
        line.push('+');
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test duration formatting with various time scales
    #[test]
    fn test_format_duration_ns() {
        assert_eq!(format_duration_ns(500), "500ns");
        assert_eq!(format_duration_ns(1500), "1.50μs");
        assert_eq!(format_duration_ns(1_500_000), "1.50ms");
        assert_eq!(format_duration_ns(1_500_000_000), "1.50s");
        assert_eq!(format_duration_ns(3_723_000_000_000), "1h 2m 3s");
    }

    #[test]
    fn test_format_latency_ms() {
        assert_eq!(format_latency_ms(0.25), "250.00μs");
        assert_eq!(format_latency_ms(12.5), "12.50ms");
        assert_eq!(format_latency_ms(0.0), "0ns");
    }

    /// Test request rate formatting for frequency display
    #[test]
    fn test_format_request_rate() {
        assert_eq!(format_request_rate(500.0), "500 req/s");
        assert_eq!(format_request_rate(1500.0), "1.50K req/s");
        assert_eq!(format_request_rate(1500000.0), "1.50M req/s");
    }

    /// Test statistical calculations with known dataset
    #[test]
    fn test_calculate_stats() {
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let (mean, min, max, std_dev) = calculate_stats(&values);

        assert_eq!(mean, 3.0);
        assert_eq!(min, 1.0);
        assert_eq!(max, 5.0);
        assert!((std_dev - 1.4142135623730951).abs() < 0.001);
        assert_eq!(calculate_stats(&[]), (0.0, 0.0, 0.0, 0.0));
    }

    #[test]
    fn test_table_formatting() {
        let widths = [5, 3];
        assert_eq!(format_table_separator(&widths), "+-------+-----+");
        assert_eq!(format_table_row(&["ab", "c"], &widths), "| ab    | c   |");
    }
}
