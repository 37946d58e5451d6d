//! Worker process configuration

use crate::error::ConfigResult;
use crate::validation::{validate_positive, validate_required_string, Validatable};
use linthost_ipc::DEFAULT_REQUEST_TIMEOUT_MS;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// How long a single request may wait for its reply
    pub request_timeout_ms: u64,

    /// Arguments placed before `--dispatcher` when launching a worker
    pub launch_args: Vec<String>,

    /// Worker binary to use instead of the one next to `linthost`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime_override: Option<PathBuf>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            launch_args: Vec::new(),
            runtime_override: None,
        }
    }
}

impl WorkerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Validatable for WorkerConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_positive(self.request_timeout_ms, "request_timeout_ms", self.domain_name())?;

        for arg in &self.launch_args {
            if arg == "--dispatcher" {
                return Err(self.validation_error(
                    "launch_args must not contain --dispatcher; it is added per worker",
                ));
            }
        }

        if let Some(runtime) = &self.runtime_override {
            validate_required_string(
                &runtime.to_string_lossy(),
                "runtime_override",
                self.domain_name(),
            )?;
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "worker"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WorkerConfig::default();
        assert_eq!(config.request_timeout(), Duration::from_secs(15));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_values() {
        let config = WorkerConfig {
            request_timeout_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = WorkerConfig {
            launch_args: vec!["--dispatcher".to_string()],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
