//! Error taxonomy for trace ingestion and aggregation.
//!
//! Every variant is unrecoverable for the trace being processed. Callers
//! must abort that trace rather than emit zero-valued output, since
//! degenerate data would corrupt percentile statistics without any
//! indication. Unfinished requests are not errors and never appear here.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TraceError {
    /// An input line could not be parsed into `(id, timestamp)` or
    /// `(start, finish)`.
    #[error("{}:{line}: malformed record {content:?}", .path.display())]
    MalformedRecord {
        path: PathBuf,
        line: usize,
        content: String,
    },

    #[error("request {id} finishes before it starts ({finish_ns} < {start_ns})")]
    FinishBeforeStart {
        id: u64,
        start_ns: u64,
        finish_ns: u64,
    },

    /// A span handed to the trace constructor ends before it starts.
    #[error("span finishes before it starts ({finish_ns} < {start_ns})")]
    InvertedSpan { start_ns: u64, finish_ns: u64 },

    #[error("no finished requests remain in the trace")]
    EmptyTrace,

    #[error("experiment duration must be positive (got {0} ns)")]
    InvalidDuration(u64),

    #[error("window width must be positive (got {0} ns)")]
    InvalidWindowWidth(u64),

    #[error("invalid trim bounds: ignore-start {ignore_start_s}s, ignore-end {ignore_end_s}s")]
    InvalidTrim {
        ignore_start_s: f64,
        ignore_end_s: f64,
    },

    /// Internal invariant violation: the aggregation engine popped an empty
    /// outstanding set.
    #[error("pop from an empty outstanding-request set")]
    EmptyPop,

    /// Internal invariant violation: a percentile was requested over no values.
    #[error("percentile requested over an empty sample")]
    EmptySample,

    #[error("no experiment duration given and none found in the workload flags")]
    MissingDuration,

    #[error("cannot interpret workload duration flag {0:?}")]
    InvalidFlagDuration(String),

    /// A serialized timeseries whose columns are not index-aligned.
    #[error("timeseries columns have mismatched lengths: {0}")]
    TimeseriesShape(String),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl TraceError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TraceError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = TraceError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_record_display() {
        let err = TraceError::MalformedRecord {
            path: PathBuf::from("start.txt"),
            line: 7,
            content: "12 abc".to_string(),
        };
        assert_eq!(err.to_string(), "start.txt:7: malformed record \"12 abc\"");
    }

    #[test]
    fn test_finish_before_start_display() {
        let err = TraceError::FinishBeforeStart {
            id: 3,
            start_ns: 100,
            finish_ns: 90,
        };
        assert_eq!(
            err.to_string(),
            "request 3 finishes before it starts (90 < 100)"
        );
    }

    #[test]
    fn test_inverted_span_display() {
        let err = TraceError::InvertedSpan {
            start_ns: 100,
            finish_ns: 50,
        };
        assert_eq!(
            err.to_string(),
            "span finishes before it starts (50 < 100)"
        );
    }

    #[test]
    fn test_invalid_duration_display() {
        let err = TraceError::InvalidDuration(0);
        assert_eq!(
            err.to_string(),
            "experiment duration must be positive (got 0 ns)"
        );
    }

    #[test]
    fn test_io_error_keeps_source() {
        let err = TraceError::io(
            "missing.txt",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(err.to_string().starts_with("I/O error on missing.txt"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
