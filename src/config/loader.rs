// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::EngineConfig;
use crate::config::validate::validate_config;
use crate::errors::Result;

/// Parse a configuration from TOML text without semantic validation.
pub fn parse_str(contents: &str) -> Result<EngineConfig> {
    EngineConfig::from_toml_str(contents)
}

/// Load a configuration file from a given path.
///
/// This only performs TOML deserialization; use [`load_and_validate`] to also
/// run the semantic checks.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<EngineConfig> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;
    debug!(path = %path.display(), "loaded engine config");
    parse_str(&contents)
}

/// Load a configuration file from path and validate it.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<EngineConfig> {
    let cfg = load_from_path(path)?;
    validate_config(&cfg)?;
    Ok(cfg)
}

/// `Cmdflow.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Cmdflow.toml")
}
