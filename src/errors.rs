// src/errors.rs

//! Crate-wide error types.
//!
//! Construction problems (`InvalidState`, `InvalidArgument`, `CycleDetected`)
//! are raised synchronously by the call that caused them. Failures raised by
//! commands are wrapped exactly once into an [`ExecutionError`].

use thiserror::Error;

use crate::dag::RunReport;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Cycle detected in dependency graph: edge '{upstream}' -> '{downstream}' closes a cycle")]
    CycleDetected {
        upstream: String,
        downstream: String,
    },

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error("Graph run failed: {} node(s) failed ({})", .failures.len(), summarize(.failures))]
    GraphFailed {
        failures: Vec<ExecutionError>,
        report: Box<RunReport>,
    },

    #[error("Graph run was cancelled before all nodes were submitted")]
    Cancelled { report: Box<RunReport> },

    #[error("Scheduler has been shut down")]
    SchedulerShutdown,

    #[error("Graph run stalled: node '{0}' never became ready")]
    Stalled(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl EngineError {
    /// The run report attached to a failed or cancelled graph run, if any.
    pub fn report(&self) -> Option<&RunReport> {
        match self {
            EngineError::GraphFailed { report, .. } | EngineError::Cancelled { report } => {
                Some(&**report)
            }
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// Error raised by a command, together with the command that raised it and
/// the keys present in the context at the time of failure.
#[derive(Error, Debug)]
#[error("command '{command}' failed: {source}")]
pub struct ExecutionError {
    command: String,
    context_keys: Vec<String>,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync + 'static>,
}

impl ExecutionError {
    pub fn new(
        command: impl Into<String>,
        context_keys: Vec<String>,
        source: anyhow::Error,
    ) -> Self {
        Self {
            command: command.into(),
            context_keys,
            source: source.into(),
        }
    }

    /// Wrap an error returned by a command.
    ///
    /// Errors that already are an `ExecutionError` (e.g. from a nested chain)
    /// are returned unchanged so the innermost command stays the reported one.
    pub fn from_command_error(
        command: &str,
        context_keys: impl FnOnce() -> Vec<String>,
        err: anyhow::Error,
    ) -> Self {
        let err = match err.downcast::<ExecutionError>() {
            Ok(inner) => return inner,
            Err(err) => err,
        };

        match err.downcast::<EngineError>() {
            Ok(EngineError::Execution(inner)) => inner,
            Ok(other) => Self::new(command, context_keys(), anyhow::Error::from(other)),
            Err(err) => Self::new(command, context_keys(), err),
        }
    }

    /// Name of the command that raised the error.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Keys present in the context when the command failed.
    pub fn context_keys(&self) -> &[String] {
        &self.context_keys
    }

    /// The error raised by the command itself.
    pub fn inner(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self.source.as_ref()
    }
}

fn summarize(failures: &[ExecutionError]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
