// src/config/model.rs

use serde::Deserialize;

use crate::dag::scheduler::default_concurrency;
use crate::errors::Result;
use crate::logging::LogLevel;
use crate::types::FailurePolicy;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [scheduler]
/// concurrency = 4
/// failure_policy = "skip_dependents"
///
/// [logging]
/// level = "debug"
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl EngineConfig {
    /// Deserialize from TOML text. No semantic validation.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }
}

/// `[scheduler]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchedulerConfig {
    /// Maximum number of commands executing at once.
    ///
    /// Defaults to the number of available processing units.
    #[serde(default)]
    pub concurrency: Option<usize>,

    /// `"continue"` (default) or `"skip_dependents"`.
    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

impl SchedulerConfig {
    pub fn effective_concurrency(&self) -> usize {
        self.concurrency.unwrap_or_else(default_concurrency)
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Overrides `CMDFLOW_LOG` when set.
    #[serde(default)]
    pub level: Option<LogLevel>,
}
