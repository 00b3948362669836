// src/config/mod.rs

//! Engine configuration.
//!
//! - [`model`] contains the serde data model for a `Cmdflow.toml` file.
//! - [`loader`] reads a config from disk.
//! - [`validate`] performs semantic checks (e.g. `concurrency >= 1`).
//!
//! This only tunes the engine itself; which commands run, and in which
//! order, is decided by the caller building chains and graphs.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, parse_str};
pub use model::{EngineConfig, LoggingConfig, SchedulerConfig};
pub use validate::validate_config;
