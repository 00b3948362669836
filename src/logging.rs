// src/logging.rs

//! Logging setup using `tracing` + `tracing-subscriber`.
//!
//! The library itself only emits `tracing` events; applications embedding
//! the engine may call [`init_logging`] once at startup, or install their own
//! subscriber.
//!
//! Priority for determining the log level:
//! 1. explicit level (argument or `[logging].level`)
//! 2. `CMDFLOW_LOG` environment variable (e.g. "info", "debug")
//! 3. default to `info`
//!
//! Logs are sent to STDERR.

use std::str::FromStr;

use anyhow::{Result, anyhow};
use serde::Deserialize;
use tracing_subscriber::fmt;

use crate::config::EngineConfig;

/// Environment variable consulted when no explicit level is given.
pub const LOG_ENV_VAR: &str = "CMDFLOW_LOG";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    #[serde(alias = "warning")]
    Warn,
    Info,
    Debug,
    Trace,
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(format!("invalid log level: {other}")),
        }
    }
}

impl From<LogLevel> for tracing::Level {
    fn from(lvl: LogLevel) -> Self {
        match lvl {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

/// Resolve the effective level from an explicit choice and the environment.
pub fn resolve_level(explicit: Option<LogLevel>) -> tracing::Level {
    explicit
        .or_else(|| {
            std::env::var(LOG_ENV_VAR)
                .ok()
                .and_then(|s| s.parse().ok())
        })
        .map(tracing::Level::from)
        .unwrap_or(tracing::Level::INFO)
}

/// Initialise the global logging subscriber.
///
/// Fails if a global subscriber is already installed.
pub fn init_logging(level: Option<LogLevel>) -> Result<()> {
    fmt()
        .with_max_level(resolve_level(level))
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("failed to install tracing subscriber: {e}"))
}

/// Initialise logging from the `[logging]` section of a config.
pub fn init_from_config(cfg: &EngineConfig) -> Result<()> {
    init_logging(cfg.logging.level)
}
