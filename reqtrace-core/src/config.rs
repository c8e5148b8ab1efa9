//! Engine configuration
//!
//! All thresholds that govern extraction, deduplication and traceability
//! live here. The defaults reproduce the fixed policy constants; a YAML file
//! may override any subset of them.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::TraceError;

/// Extraction limits and the fallback floor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// The semantic fallback runs when strategies 1-4 yield fewer candidates than this
    pub fallback_floor: usize,
    /// Minimum trimmed length of a candidate
    pub min_candidate_chars: usize,
    /// Minimum word count of a candidate
    pub min_candidate_words: usize,
    pub fallback_min_sentence_chars: usize,
    pub fallback_max_sentence_chars: usize,
    /// Non-header lines must be longer than this to join a section
    pub min_section_line_chars: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            fallback_floor: 5,
            min_candidate_chars: 20,
            min_candidate_words: 4,
            fallback_min_sentence_chars: 25,
            fallback_max_sentence_chars: 500,
            min_section_line_chars: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// Candidates more similar than this to a cluster seed are dropped
    pub similarity_threshold: f64,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.85,
        }
    }
}

/// Traceability policy constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    /// Nearest test cases considered per requirement
    pub top_n: usize,
    /// Minimum similarity for a semantic link
    pub semantic_link_threshold: f64,
    /// confidence = min(similarity * scale, 1.0)
    pub confidence_scale: f64,
    /// Semantic links above this similarity count towards impact analysis
    pub impact_threshold: f64,
    pub search_top_n: usize,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            top_n: 5,
            semantic_link_threshold: 0.3,
            confidence_scale: 1.5,
            impact_threshold: 0.5,
            search_top_n: 10,
        }
    }
}

/// Top-level configuration for the extraction and traceability engines
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub extraction: ExtractionConfig,
    pub dedup: DedupConfig,
    pub trace: TraceConfig,
    /// Dimensionality of the built-in hashing embedder
    pub embedding_dimensions: usize,
    /// Location of the SQLite vector index; `None` means `default_index_path()`
    pub index_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            extraction: ExtractionConfig::default(),
            dedup: DedupConfig::default(),
            trace: TraceConfig::default(),
            embedding_dimensions: 384,
            index_path: None,
        }
    }
}

impl EngineConfig {
    /// Loads the configuration from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: EngineConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path.as_ref()))?;

        config
            .validate()
            .with_context(|| format!("Invalid config file: {:?}", path.as_ref()))?;
        Ok(config)
    }

    /// Loads the configuration, using defaults when the file does not exist
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Saves the configuration to a YAML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_yaml::to_string(self)?;
        fs::write(&path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path.as_ref()))?;
        Ok(())
    }

    /// Resolved index location
    pub fn resolved_index_path(&self) -> PathBuf {
        self.index_path.clone().unwrap_or_else(default_index_path)
    }

    pub fn validate(&self) -> std::result::Result<(), TraceError> {
        let unit_checks = [
            ("dedup.similarity_threshold", self.dedup.similarity_threshold),
            (
                "trace.semantic_link_threshold",
                self.trace.semantic_link_threshold,
            ),
            ("trace.impact_threshold", self.trace.impact_threshold),
        ];
        for (name, value) in unit_checks {
            if !(0.0..=1.0).contains(&value) {
                return Err(TraceError::Config(format!(
                    "{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }

        if self.trace.confidence_scale <= 0.0 {
            return Err(TraceError::Config(
                "trace.confidence_scale must be positive".to_string(),
            ));
        }
        if self.trace.top_n == 0 || self.trace.search_top_n == 0 {
            return Err(TraceError::Config(
                "trace.top_n and trace.search_top_n must be at least 1".to_string(),
            ));
        }
        if self.embedding_dimensions == 0 {
            return Err(TraceError::Config(
                "embedding_dimensions must be at least 1".to_string(),
            ));
        }
        if self.extraction.fallback_min_sentence_chars > self.extraction.fallback_max_sentence_chars
        {
            return Err(TraceError::Config(
                "extraction.fallback_min_sentence_chars exceeds fallback_max_sentence_chars"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

/// Gets the configuration directory for reqtrace
pub fn get_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("reqtrace")
}

/// Default location of the configuration file
pub fn default_config_path() -> PathBuf {
    get_config_dir().join("config.yaml")
}

/// Default location of the persistent vector index
pub fn default_index_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("reqtrace")
        .join("index.db")
}
