//! Raw start/finish records emitted by the workload driver.
//!
//! Each input file is line oriented, one `"<request_id> <timestamp_ns>"`
//! pair per line, with no header and no ordering guarantee. Retransmitted
//! telemetry can produce exact duplicate lines; those are collapsed here,
//! before any joining happens.

use crate::error::{Result, TraceError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::debug;

/// Which side of a request a record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordKind {
    Start,
    Finish,
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordKind::Start => write!(f, "start"),
            RecordKind::Finish => write!(f, "finish"),
        }
    }
}

/// One line of a start or finish log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestRecord {
    pub id: u64,
    pub kind: RecordKind,
    pub timestamp_ns: u64,
}

/// Records of a single kind, in file order, with exact duplicates removed.
#[derive(Debug, Clone, Default)]
pub struct RecordSet {
    pub records: Vec<RequestRecord>,
    /// Lines dropped because the same `(id, timestamp)` was already seen.
    pub duplicates: usize,
}

impl RecordSet {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Split a line into exactly two whitespace-separated unsigned integers.
pub(crate) fn parse_pair(line: &str) -> Option<(u64, u64)> {
    let mut fields = line.split_whitespace();
    let first = fields.next()?.parse().ok()?;
    let second = fields.next()?.parse().ok()?;
    if fields.next().is_some() {
        return None;
    }
    Some((first, second))
}

/// Parse records of `kind` from `reader`. `path` is only used for error
/// reporting. Blank lines are skipped.
pub fn parse_records<R: BufRead>(reader: R, kind: RecordKind, path: &Path) -> Result<RecordSet> {
    let mut set = RecordSet::default();
    let mut seen = HashSet::new();

    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| TraceError::io(path, e))?;
        if line.trim().is_empty() {
            continue;
        }

        let (id, timestamp_ns) = parse_pair(&line).ok_or_else(|| TraceError::MalformedRecord {
            path: path.to_path_buf(),
            line: idx + 1,
            content: line.clone(),
        })?;

        if !seen.insert((id, timestamp_ns)) {
            set.duplicates += 1;
            continue;
        }

        set.records.push(RequestRecord {
            id,
            kind,
            timestamp_ns,
        });
    }

    debug!(
        "Parsed {} {} records from {:?} ({} duplicate lines dropped)",
        set.records.len(),
        kind,
        path,
        set.duplicates
    );
    Ok(set)
}

/// Read a start or finish log from disk.
pub fn read_records(path: &Path, kind: RecordKind) -> Result<RecordSet> {
    let file = File::open(path).map_err(|e| TraceError::io(path, e))?;
    parse_records(BufReader::new(file), kind, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parse(input: &str) -> Result<RecordSet> {
        parse_records(Cursor::new(input), RecordKind::Start, Path::new("start.txt"))
    }

    #[test]
    fn test_parse_pair() {
        assert_eq!(parse_pair("12 3400"), Some((12, 3400)));
        assert_eq!(parse_pair("  12\t3400  "), Some((12, 3400)));
        assert_eq!(parse_pair("12"), None);
        assert_eq!(parse_pair("12 34 56"), None);
        assert_eq!(parse_pair("12 -4"), None);
        assert_eq!(parse_pair("abc 4"), None);
    }

    #[test]
    fn test_parse_records_collapses_exact_duplicates() {
        let set = parse("1 100\n2 200\n1 100\n3 300\n2 200\n").unwrap();

        assert_eq!(set.len(), 3);
        assert_eq!(set.duplicates, 2);
        let ids: Vec<u64> = set.records.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert!(set.records.iter().all(|r| r.kind == RecordKind::Start));
    }

    #[test]
    fn test_same_id_different_timestamp_is_not_a_duplicate() {
        let set = parse("1 100\n1 101\n").unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.duplicates, 0);
    }

    #[test]
    fn test_blank_lines_are_skipped() {
        let set = parse("\n1 100\n   \n2 200\n\n").unwrap();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_malformed_line_reports_position() {
        let err = parse("1 100\n2 two hundred\n").unwrap_err();
        match err {
            TraceError::MalformedRecord { line, content, .. } => {
                assert_eq!(line, 2);
                assert_eq!(content, "2 two hundred");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_read_records_missing_file() {
        let err = read_records(Path::new("/nonexistent/start.txt"), RecordKind::Start).unwrap_err();
        assert!(matches!(err, TraceError::Io { .. }));
    }
}
