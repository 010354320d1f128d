//! Workload configuration flags.
//!
//! The workload driver is configured with a flat set of named flags whose
//! values are booleans, integers, floats or strings. They are carried
//! through to the result artifact untouched, and the experiment duration is
//! read from them when it is not given explicitly.

use crate::cli::parse_duration;
use crate::error::{Result, TraceError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Name of the flag holding the experiment duration.
pub const DURATION_FLAG: &str = "duration";

/// A single flag value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlagValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl std::fmt::Display for FlagValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlagValue::Bool(b) => write!(f, "{}", b),
            FlagValue::Int(i) => write!(f, "{}", i),
            FlagValue::Float(x) => write!(f, "{}", x),
            FlagValue::Str(s) => write!(f, "{}", s),
        }
    }
}

/// Flags in name order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkloadFlags(BTreeMap<String, FlagValue>);

impl WorkloadFlags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load flags from a YAML mapping.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| TraceError::io(path, e))?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: FlagValue) -> Option<FlagValue> {
        self.0.insert(name.into(), value)
    }

    pub fn get(&self, name: &str) -> Option<&FlagValue> {
        self.0.get(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Experiment duration from the `duration` flag: a string such as
    /// `"30s"` or `"5m"`, or a bare number of seconds. `None` if absent.
    pub fn duration(&self) -> Result<Option<Duration>> {
        let Some(value) = self.get(DURATION_FLAG) else {
            return Ok(None);
        };

        let invalid = || TraceError::InvalidFlagDuration(value.to_string());
        let duration = match value {
            FlagValue::Int(secs) if *secs > 0 => Duration::from_secs(*secs as u64),
            FlagValue::Float(secs) if secs.is_finite() && *secs > 0.0 => {
                Duration::from_secs_f64(*secs)
            }
            FlagValue::Str(s) => parse_duration(s).map_err(|_| invalid())?,
            _ => return Err(invalid()),
        };
        if duration.is_zero() {
            return Err(invalid());
        }
        Ok(Some(duration))
    }

    /// Render as workload-driver arguments: `true` becomes `--name`,
    /// `false` is omitted, anything else becomes `--name=value`.
    pub fn to_command_args(&self) -> Vec<String> {
        self.0
            .iter()
            .filter_map(|(name, value)| match value {
                FlagValue::Bool(true) => Some(format!("--{}", name)),
                FlagValue::Bool(false) => None,
                other => Some(format!("--{}={}", name, other)),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FLAGS: &str = r#"
duration: 30s
max-rate: 8000
concurrency: 64
tolerate-errors: true
histograms: false
read-percent: 95.5
"#;

    #[test]
    fn test_value_kinds() {
        let flags = WorkloadFlags::from_yaml(FLAGS).unwrap();

        assert_eq!(flags.len(), 6);
        assert_eq!(flags.get("max-rate"), Some(&FlagValue::Int(8000)));
        assert_eq!(flags.get("tolerate-errors"), Some(&FlagValue::Bool(true)));
        assert_eq!(flags.get("read-percent"), Some(&FlagValue::Float(95.5)));
        assert_eq!(flags.get("duration"), Some(&FlagValue::Str("30s".to_string())));
    }

    #[test]
    fn test_duration_from_flags() {
        let flags = WorkloadFlags::from_yaml(FLAGS).unwrap();
        assert_eq!(flags.duration().unwrap(), Some(Duration::from_secs(30)));

        let minutes = WorkloadFlags::from_yaml("duration: 2m").unwrap();
        assert_eq!(minutes.duration().unwrap(), Some(Duration::from_secs(120)));

        let bare = WorkloadFlags::from_yaml("duration: 45").unwrap();
        assert_eq!(bare.duration().unwrap(), Some(Duration::from_secs(45)));

        assert_eq!(WorkloadFlags::new().duration().unwrap(), None);
    }

    #[test]
    fn test_bad_duration_flag() {
        for yaml in ["duration: soon", "duration: 0", "duration: true", "duration: -5"] {
            let flags = WorkloadFlags::from_yaml(yaml).unwrap();
            assert!(
                matches!(flags.duration(), Err(TraceError::InvalidFlagDuration(_))),
                "{yaml} should be rejected"
            );
        }
    }

    #[test]
    fn test_command_args() {
        let flags = WorkloadFlags::from_yaml(FLAGS).unwrap();
        assert_eq!(
            flags.to_command_args(),
            vec![
                "--concurrency=64",
                "--duration=30s",
                "--max-rate=8000",
                "--read-percent=95.5",
                "--tolerate-errors",
            ]
        );
    }

    #[test]
    fn test_round_trip_preserves_kinds() {
        let flags = WorkloadFlags::from_yaml(FLAGS).unwrap();
        let yaml = serde_yaml::to_string(&flags).unwrap();
        assert_eq!(WorkloadFlags::from_yaml(&yaml).unwrap(), flags);
    }
}
