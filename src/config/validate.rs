// src/config/validate.rs

use crate::config::model::EngineConfig;
use crate::errors::{EngineError, Result};

/// Semantic checks that serde cannot express.
pub fn validate_config(cfg: &EngineConfig) -> Result<()> {
    if cfg.scheduler.concurrency == Some(0) {
        return Err(EngineError::Config(
            "[scheduler].concurrency must be >= 1 (got 0)".to_string(),
        ));
    }

    Ok(())
}
