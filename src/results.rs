use crate::error::{Result, TraceError};
use crate::flags::WorkloadFlags;
use crate::metrics::AggregateSummary;
use crate::window::TraceTimeseries;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Serialization format of a results file, chosen by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Yaml,
    Json,
}

impl OutputFormat {
    /// `.json` selects JSON; anything else is YAML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => OutputFormat::Json,
            _ => OutputFormat::Yaml,
        }
    }
}

/// One processed experiment: the interchange artifact consumed by the
/// plotting tools. Field names and nesting are fixed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentResults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub flags: WorkloadFlags,
    pub aggregate: AggregateSummary,
    pub ts: TraceTimeseries,
}

impl ExperimentResults {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| TraceError::io(path, e))?;
        match OutputFormat::from_path(path) {
            OutputFormat::Json => Ok(serde_json::from_str(&contents)?),
            OutputFormat::Yaml => Ok(serde_yaml::from_str(&contents)?),
        }
    }

    pub fn render(&self, format: OutputFormat) -> Result<String> {
        match format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(self)?),
            OutputFormat::Yaml => Ok(serde_yaml::to_string(self)?),
        }
    }
}

/// The parts of a results file needed to regenerate it: everything except
/// the computed statistics, which may be stale or malformed.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExperimentHeader {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub flags: WorkloadFlags,
}

impl ExperimentHeader {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| TraceError::io(path, e))?;
        match OutputFormat::from_path(path) {
            OutputFormat::Json => Ok(serde_json::from_str(&contents)?),
            OutputFormat::Yaml => Ok(serde_yaml::from_str(&contents)?),
        }
    }
}

/// Writes results files, replacing any existing file atomically.
pub struct ResultsWriter {
    output_file: PathBuf,
    format: OutputFormat,
}

impl ResultsWriter {
    pub fn new(output_file: &Path) -> Self {
        Self {
            output_file: output_file.to_path_buf(),
            format: OutputFormat::from_path(output_file),
        }
    }

    /// Serialize `results`, write to a sibling temp file, then rename over
    /// the destination so readers never observe a partial file.
    pub fn write(&self, results: &ExperimentResults) -> Result<()> {
        let contents = results.render(self.format)?;

        if let Some(parent) = self.output_file.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| TraceError::io(parent, e))?;
            }
        }

        let mut tmp_name = self
            .output_file
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        tmp_name.push(".tmp");
        let tmp = self.output_file.with_file_name(tmp_name);

        std::fs::write(&tmp, contents).map_err(|e| TraceError::io(&tmp, e))?;
        std::fs::rename(&tmp, &self.output_file).map_err(|e| TraceError::io(&self.output_file, e))?;
        debug!("Wrote {:?} results to {:?}", self.format, self.output_file);

        info!("Results written to: {:?}", self.output_file);
        Ok(())
    }
}
