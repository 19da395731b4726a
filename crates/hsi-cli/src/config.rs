//! Pipeline configuration from `hsi.toml`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use hsi_transform::TransformOptions;
use hsi_validate::QualityThresholds;
use serde::{Deserialize, Serialize};

/// Looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "hsi.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub pipeline_name: String,
    /// Directory of raw sheet extracts.
    pub raw_dir: PathBuf,
    /// Directory the `<stem>_clean.csv` files are written to.
    pub clean_dir: PathBuf,
    /// SQLite database holding runs, quality facts, lineage, and the file catalog.
    pub database: PathBuf,
    pub transform: TransformOptions,
    pub quality: QualityThresholds,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            pipeline_name: "health_indicators_etl".to_string(),
            raw_dir: PathBuf::from("data/raw"),
            clean_dir: PathBuf::from("data/clean"),
            database: PathBuf::from("data/observability.db"),
            transform: TransformOptions::default(),
            quality: QualityThresholds::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).context("parse pipeline config")
    }

    /// Load from `path`, or from `hsi.toml` when present, or fall back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !default.is_file() {
                    return Ok(Self::default());
                }
                default
            }
        };
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("read config: {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("in {}", path.display()))
    }
}
