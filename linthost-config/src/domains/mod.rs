//! Domain-specific configuration modules

pub mod lint;
pub mod logging;
pub mod worker;

use crate::error::ConfigResult;
use crate::validation::Validatable;
use linthost_ipc::LintConfig;
use linthost_logging::LoggingConfig;
use serde::{Deserialize, Serialize};

/// Main linthost configuration combining all domains
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinthostConfig {
    /// Worker process configuration
    pub worker: worker::WorkerConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Settings sent along with every lint and fix job
    pub lint: LintConfig,
}

impl LinthostConfig {
    /// Validate all domain configurations
    pub fn validate_all(&self) -> ConfigResult<()> {
        self.worker.validate()?;
        self.logging.validate()?;
        self.lint.validate()?;
        Ok(())
    }

    /// Generate a sample configuration file
    pub fn generate_sample() -> String {
        serde_yaml::to_string(&LinthostConfig::default())
            .unwrap_or_else(|_| "# Failed to generate sample config".to_string())
    }
}
