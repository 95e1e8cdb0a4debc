//! JSON configuration for matching runs.
//!
//! Sections carry `Option` fields and are `resolve()`d over the parameter
//! defaults, so a config only needs to name what it changes.

pub mod matching;
pub mod run;

pub use matching::{BlockMatchConfig, MeshConfig, ModelSelector, SmoothnessConfig};
pub use run::{run_config, MatchRunConfig, RunInputs};

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0}")]
    Load(String),
    #[error("invalid config: {reason}")]
    Invalid { reason: String },
}

/// Read a run config; relative paths are taken relative to the config file.
pub fn load_config(path: &Path) -> Result<MatchRunConfig, ConfigError> {
    let data = fs::read_to_string(path)
        .map_err(|e| ConfigError::Load(format!("Failed to read config {}: {e}", path.display())))?;
    let mut config: MatchRunConfig = serde_json::from_str(&data).map_err(|e| {
        ConfigError::Load(format!("Failed to parse config {}: {e}", path.display()))
    })?;
    if let Some(dir) = path.parent() {
        config.rebase(dir);
    }
    Ok(config)
}

fn resolve_path(base_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}
