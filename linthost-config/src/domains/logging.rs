//! Logging configuration

use crate::error::ConfigResult;
use crate::validation::{validate_required_string, Validatable};
use linthost_logging::LoggingConfig;

impl Validatable for LoggingConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_required_string(&self.level, "level", self.domain_name())
    }

    fn domain_name(&self) -> &'static str {
        "logging"
    }
}
