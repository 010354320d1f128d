//! # Trace Construction
//!
//! Joins the workload driver's start and finish logs into a canonical,
//! start-ordered [`Trace`].
//!
//! ## Pipeline
//!
//! 1. **Join**: start and finish records are matched by request id. A start
//!    without a finish becomes an *unfinished* span, which is counted and
//!    reported but kept out of the trace. A finish without a start is
//!    discarded with a warning.
//! 2. **Order**: finished spans are stable-sorted by start time. The driver's
//!    concurrent workers obtain ids and timestamps independently, so id order
//!    is only roughly time order. Ties keep start-log order.
//! 3. **Trim** (optional): warm-up and cool-down spans are cut relative to the
//!    first start time.
//!
//! Once built, a trace is read-only. Request ids carry no meaning past the
//! join and are not stored.
//!
//! A trace can also be persisted as a two-column replay file
//! (`start_ns<TAB>finish_ns`) and loaded back later, which lets the
//! aggregation be rerun without the raw logs.

use crate::error::{Result, TraceError};
use crate::record::{parse_pair, read_records, RecordKind, RecordSet};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use tracing::{debug, info, warn};

const NANOS_PER_SECOND: f64 = 1_000_000_000.0;
const NANOS_PER_MILLI: f64 = 1_000_000.0;

/// One request as produced by the join. `finish_ns` is `None` when no
/// finish record was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestSpan {
    pub start_ns: u64,
    pub finish_ns: Option<u64>,
}

impl RequestSpan {
    pub fn is_finished(&self) -> bool {
        self.finish_ns.is_some()
    }

    /// The finished form of this span, if it has one.
    pub fn finished(&self) -> Option<Span> {
        self.finish_ns.map(|finish_ns| Span {
            start_ns: self.start_ns,
            finish_ns,
        })
    }
}

/// A finished request. Invariant: `finish_ns >= start_ns`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start_ns: u64,
    pub finish_ns: u64,
}

impl Span {
    /// Zero for an inverted span; [`Trace`] never holds one.
    pub fn latency_ns(&self) -> u64 {
        self.finish_ns.saturating_sub(self.start_ns)
    }

    pub fn latency_ms(&self) -> f64 {
        self.latency_ns() as f64 / NANOS_PER_MILLI
    }
}

/// Warm-up and cool-down margins, in seconds relative to the first start.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrimWindow {
    /// Spans starting at or before this offset are dropped. Zero disables
    /// the leading cut.
    pub ignore_start_s: f64,
    /// Spans starting strictly after this offset are dropped. `None`
    /// disables the trailing cut.
    pub ignore_end_s: Option<f64>,
}

impl Default for TrimWindow {
    fn default() -> Self {
        Self {
            ignore_start_s: crate::defaults::IGNORE_START_SECONDS,
            ignore_end_s: None,
        }
    }
}

impl TrimWindow {
    pub fn new(ignore_start_s: f64, ignore_end_s: Option<f64>) -> Result<Self> {
        let trim = Self {
            ignore_start_s,
            ignore_end_s,
        };
        trim.validate()?;
        Ok(trim)
    }

    pub fn validate(&self) -> Result<()> {
        let start_ok = self.ignore_start_s.is_finite() && self.ignore_start_s >= 0.0;
        let end_ok = match self.ignore_end_s {
            Some(end) => end.is_finite() && end >= self.ignore_start_s,
            None => true,
        };
        if start_ok && end_ok {
            Ok(())
        } else {
            Err(TraceError::InvalidTrim {
                ignore_start_s: self.ignore_start_s,
                ignore_end_s: self.ignore_end_s.unwrap_or(f64::NAN),
            })
        }
    }
}

fn seconds_to_ns(seconds: f64) -> u64 {
    (seconds * NANOS_PER_SECOND).round() as u64
}

/// Finished spans ordered by non-decreasing start time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trace {
    spans: Vec<Span>,
}

impl Trace {
    /// Order `spans` by start time (stable) and wrap them. Fails with
    /// `InvertedSpan` if any span finishes before it starts.
    pub fn from_spans(mut spans: Vec<Span>) -> Result<Self> {
        if spans.is_empty() {
            return Err(TraceError::EmptyTrace);
        }
        if let Some(span) = spans.iter().find(|span| span.finish_ns < span.start_ns) {
            return Err(TraceError::InvertedSpan {
                start_ns: span.start_ns,
                finish_ns: span.finish_ns,
            });
        }
        spans.sort_by_key(|span| span.start_ns);
        Ok(Self { spans })
    }

    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Start time of the earliest request. Window 0 ends here.
    pub fn start_ns(&self) -> u64 {
        self.spans.first().map_or(0, |span| span.start_ns)
    }

    pub fn latencies_ms(&self) -> Vec<f64> {
        self.spans.iter().map(Span::latency_ms).collect()
    }

    /// Cut warm-up and cool-down spans. Returns the trimmed trace and the
    /// number of spans removed from the front and back.
    pub fn trim(self, trim: &TrimWindow) -> Result<(Trace, usize, usize)> {
        trim.validate()?;

        let start0 = self.start_ns();
        let offset = |span: &Span| span.start_ns - start0;

        let lead = if trim.ignore_start_s > 0.0 {
            let bound = seconds_to_ns(trim.ignore_start_s);
            self.spans.partition_point(|span| offset(span) <= bound)
        } else {
            0
        };
        let end = match trim.ignore_end_s {
            Some(end_s) => {
                let bound = seconds_to_ns(end_s);
                self.spans.partition_point(|span| offset(span) <= bound)
            }
            None => self.spans.len(),
        };

        if lead >= end {
            return Err(TraceError::EmptyTrace);
        }

        let trailing = self.spans.len() - end;
        let mut spans = self.spans;
        spans.truncate(end);
        spans.drain(..lead);

        Ok((Trace { spans }, lead, trailing))
    }

    /// Load a replay file. Exact duplicate lines are collapsed and the
    /// result is re-sorted, so hand-edited or concatenated files are fine.
    pub fn read_replay(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| TraceError::io(path, e))?;
        Self::parse_replay(BufReader::new(file), path)
    }

    pub fn parse_replay<R: BufRead>(reader: R, path: &Path) -> Result<Self> {
        let mut seen = HashSet::new();
        let mut spans = Vec::new();

        for (idx, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| TraceError::io(path, e))?;
            if line.trim().is_empty() {
                continue;
            }

            let malformed = || TraceError::MalformedRecord {
                path: path.to_path_buf(),
                line: idx + 1,
                content: line.clone(),
            };
            let (start_ns, finish_ns) = parse_pair(&line).ok_or_else(malformed)?;
            if finish_ns < start_ns {
                return Err(malformed());
            }

            let span = Span {
                start_ns,
                finish_ns,
            };
            if seen.insert(span) {
                spans.push(span);
            }
        }

        Self::from_spans(spans)
    }

    pub fn write_replay(&self, path: &Path) -> Result<()> {
        let file = File::create(path).map_err(|e| TraceError::io(path, e))?;
        let mut writer = BufWriter::new(file);
        self.write_replay_to(&mut writer)
            .and_then(|_| writer.flush())
            .map_err(|e| TraceError::io(path, e))
    }

    pub fn write_replay_to<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        for span in &self.spans {
            writeln!(writer, "{}\t{}", span.start_ns, span.finish_ns)?;
        }
        Ok(())
    }
}

/// Bookkeeping from one [`TraceBuilder::build`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildReport {
    pub start_records: usize,
    pub finish_records: usize,
    /// Exact duplicate lines collapsed across both logs.
    pub duplicate_records: usize,
    /// Requests that started but never finished.
    pub unfinished: usize,
    /// Finish records with no matching start.
    pub orphan_finishes: usize,
    /// Repeated ids carrying a different timestamp; the first one wins.
    pub conflicting_records: usize,
    /// Distinct requests with identical start and finish times; one is kept.
    pub duplicate_spans: usize,
    pub trimmed_leading: usize,
    pub trimmed_trailing: usize,
    /// Spans in the final trace.
    pub spans: usize,
}

/// A built trace together with what happened while building it.
#[derive(Debug, Clone)]
pub struct BuiltTrace {
    pub trace: Trace,
    pub report: BuildReport,
}

/// Joins start and finish records into a [`Trace`].
#[derive(Debug, Clone, Default)]
pub struct TraceBuilder {
    trim: Option<TrimWindow>,
}

impl TraceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_trim(mut self, trim: TrimWindow) -> Self {
        self.trim = Some(trim);
        self
    }

    /// Read both logs from disk and build.
    pub fn build_from_files(&self, starts: &Path, finishes: &Path) -> Result<BuiltTrace> {
        let starts = read_records(starts, RecordKind::Start)?;
        let finishes = read_records(finishes, RecordKind::Finish)?;
        self.build(&starts, &finishes)
    }

    pub fn build(&self, starts: &RecordSet, finishes: &RecordSet) -> Result<BuiltTrace> {
        let mut report = BuildReport {
            start_records: starts.len(),
            finish_records: finishes.len(),
            duplicate_records: starts.duplicates + finishes.duplicates,
            ..Default::default()
        };

        let (requests, ids) = self.join(starts, finishes, &mut report)?;

        report.unfinished = requests.iter().filter(|r| !r.is_finished()).count();
        if report.unfinished > 0 {
            info!("{} requests never finished", report.unfinished);
        }
        debug!("Joined {} distinct request ids", ids);

        let mut seen = HashSet::with_capacity(requests.len());
        let finished: Vec<Span> = requests
            .iter()
            .filter_map(RequestSpan::finished)
            .filter(|span| seen.insert(*span))
            .collect();
        report.duplicate_spans = requests.len() - report.unfinished - finished.len();
        if report.duplicate_spans > 0 {
            warn!(
                "Collapsed {} requests whose start and finish exactly match another request",
                report.duplicate_spans
            );
        }
        let mut trace = Trace::from_spans(finished)?;

        if let Some(trim) = &self.trim {
            let (trimmed, leading, trailing) = trace.trim(trim)?;
            report.trimmed_leading = leading;
            report.trimmed_trailing = trailing;
            trace = trimmed;
        }
        report.spans = trace.len();

        Ok(BuiltTrace { trace, report })
    }

    /// Match finish records to start records by id. Returns spans in
    /// start-log order and the number of distinct ids seen.
    fn join(
        &self,
        starts: &RecordSet,
        finishes: &RecordSet,
        report: &mut BuildReport,
    ) -> Result<(Vec<RequestSpan>, usize)> {
        let mut index: HashMap<u64, usize> = HashMap::with_capacity(starts.len());
        let mut requests = Vec::with_capacity(starts.len());

        for record in &starts.records {
            if index.contains_key(&record.id) {
                report.conflicting_records += 1;
                warn!(
                    "Request {} has more than one start timestamp; keeping the first",
                    record.id
                );
                continue;
            }
            index.insert(record.id, requests.len());
            requests.push(RequestSpan {
                start_ns: record.timestamp_ns,
                finish_ns: None,
            });
        }

        for record in &finishes.records {
            let Some(&slot) = index.get(&record.id) else {
                report.orphan_finishes += 1;
                debug!("Finish record for unknown request {}", record.id);
                continue;
            };

            let request = &mut requests[slot];
            if request.finish_ns.is_some() {
                report.conflicting_records += 1;
                warn!(
                    "Request {} has more than one finish timestamp; keeping the first",
                    record.id
                );
                continue;
            }
            if record.timestamp_ns < request.start_ns {
                return Err(TraceError::FinishBeforeStart {
                    id: record.id,
                    start_ns: request.start_ns,
                    finish_ns: record.timestamp_ns,
                });
            }
            request.finish_ns = Some(record.timestamp_ns);
        }

        if report.orphan_finishes > 0 {
            warn!(
                "Discarded {} finish records with no matching start",
                report.orphan_finishes
            );
        }

        let distinct = index.len();
        Ok((requests, distinct))
    }
}
