//! Run configuration.
//!
//! A [`Config`] is built once (from TOML or defaults, then CLI overrides) and
//! handed to each stage. No stage reads tool paths or thresholds from anywhere
//! else.
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{MarkerError, Result};

/// Default flank added on each side of a best-hit range.
pub const DEFAULT_PADDING: usize = 100;

/// Default marker appended to the id of a reverse-complemented sequence.
pub const DEFAULT_REVERSE_SUFFIX: &str = "_rv";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Worker threads for per-ortholog stages; `0` uses all logical cores.
    pub threads: usize,
    /// Run log, relative to the working directory. `None` logs to stderr only.
    pub log_file: Option<String>,
    pub layout: LayoutConfig,
    pub extraction: ExtractionConfig,
    pub tools: ToolsConfig,
}

/// Sub-directories of the working directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LayoutConfig {
    pub trimmed_dir: String,
    pub mapped_dir: String,
    pub primer_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExtractionConfig {
    pub padding: usize,
    pub reverse_suffix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ToolsConfig {
    pub mafft: String,
    pub mafft_args: Vec<String>,
    pub prifi: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            threads: 0,
            log_file: Some("markerscout.log".to_string()),
            layout: LayoutConfig::default(),
            extraction: ExtractionConfig::default(),
            tools: ToolsConfig::default(),
        }
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        LayoutConfig {
            trimmed_dir: "trimmed".to_string(),
            mapped_dir: "mapped".to_string(),
            primer_dir: "primers".to_string(),
        }
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        ExtractionConfig { padding: DEFAULT_PADDING, reverse_suffix: DEFAULT_REVERSE_SUFFIX.to_string() }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        ToolsConfig {
            mafft: "mafft".to_string(),
            // --inputorder keeps the reference slice as the last row.
            mafft_args: ["--localpair", "--maxiterate", "16", "--inputorder", "--preservecase", "--clustalout"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            prifi: "PriFi.pl".to_string(),
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(|e| MarkerError::io(path.as_ref(), e))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| MarkerError::Config { message: format!("TOML parsing error: {}", e) })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let non_empty = [
            ("layout.trimmed_dir", &self.layout.trimmed_dir),
            ("layout.mapped_dir", &self.layout.mapped_dir),
            ("layout.primer_dir", &self.layout.primer_dir),
            ("extraction.reverse_suffix", &self.extraction.reverse_suffix),
            ("tools.mafft", &self.tools.mafft),
            ("tools.prifi", &self.tools.prifi),
        ];
        for (field, value) in non_empty {
            if value.trim().is_empty() {
                return Err(MarkerError::Config { message: format!("{} cannot be empty", field) });
            }
        }
        Ok(())
    }

    /// Effective worker count.
    pub fn effective_threads(&self) -> usize {
        if self.threads == 0 { std::cmp::max(1, num_cpus::get()) } else { self.threads }
    }
}
