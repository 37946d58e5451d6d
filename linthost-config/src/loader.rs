//! Configuration loading and environment variable handling

use crate::domains::worker::WorkerConfig;
use crate::domains::LinthostConfig;
use crate::error::{ConfigError, ConfigResult};
use linthost_ipc::LintConfig;
use linthost_logging::{LogFormat, LoggingConfig};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

/// Configuration loader with environment variable support
pub struct ConfigLoader {
    /// Environment variable prefix
    prefix: String,
}

impl ConfigLoader {
    /// Create a new config loader with default prefix
    pub fn new() -> Self {
        Self {
            prefix: "LINTHOST".to_string(),
        }
    }

    /// Create a new config loader with custom prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Load configuration from a YAML file with environment overrides
    pub fn from_file(&self, path: impl AsRef<Path>) -> ConfigResult<LinthostConfig> {
        let path = path.as_ref();
        debug!("Loading configuration from {}", path.display());
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::FileReadError {
            path: path.to_path_buf(),
            source,
        })?;

        // An empty file means "all defaults"
        let mut config: LinthostConfig = if content.trim().is_empty() {
            LinthostConfig::default()
        } else {
            serde_yaml::from_str(&content).map_err(|source| ConfigError::ParseError {
                path: path.to_path_buf(),
                source,
            })?
        };

        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;
        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env(&self) -> ConfigResult<LinthostConfig> {
        let mut config = LinthostConfig::default();
        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;
        Ok(config)
    }

    /// Load `config_path` if given; a default path is used only when it exists
    pub fn load(
        &self,
        config_path: Option<impl AsRef<Path>>,
        default_path: Option<PathBuf>,
    ) -> ConfigResult<LinthostConfig> {
        match (config_path, default_path) {
            (Some(path), _) => self.from_file(path),
            (None, Some(path)) if path.is_file() => self.from_file(path),
            _ => self.from_env(),
        }
    }

    /// Apply environment variable overrides to configuration
    fn apply_env_overrides(&self, config: &mut LinthostConfig) -> ConfigResult<()> {
        self.apply_worker_overrides(&mut config.worker)?;
        self.apply_logging_overrides(&mut config.logging)?;
        self.apply_lint_overrides(&mut config.lint)?;
        Ok(())
    }

    fn apply_worker_overrides(&self, config: &mut WorkerConfig) -> ConfigResult<()> {
        if let Some(timeout) = self.parsed_var("REQUEST_TIMEOUT_MS")? {
            config.request_timeout_ms = timeout;
        }
        if let Some(runtime) = self.get_env_var("RUNTIME") {
            config.runtime_override = Some(PathBuf::from(runtime));
        }
        Ok(())
    }

    fn apply_logging_overrides(&self, config: &mut LoggingConfig) -> ConfigResult<()> {
        if let Some(level) = self.get_env_var("LOG_LEVEL") {
            config.level = level;
        }
        if let Some(format) = self.parsed_var::<LogFormat>("LOG_FORMAT")? {
            config.format = format;
        }
        Ok(())
    }

    fn apply_lint_overrides(&self, config: &mut LintConfig) -> ConfigResult<()> {
        let advanced = &mut config.advanced;
        if let Some(use_cache) = self.parsed_var("USE_CACHE")? {
            advanced.use_cache = use_cache;
        }
        if let Some(show) = self.parsed_var("SHOW_RULE_ID")? {
            advanced.show_rule_id_in_message = show;
        }
        if let Some(disable) = self.parsed_var("DISABLE_IGNORE_FILE")? {
            advanced.disable_ignore_file = disable;
        }
        if let Some(file) = self.get_env_var("CONFIG_FILE") {
            config.engine_location.override_config_file = Some(PathBuf::from(file));
        }
        Ok(())
    }

    /// Value of `<prefix>_<name>`, if set
    fn get_env_var(&self, name: &str) -> Option<String> {
        std::env::var(self.var_name(name)).ok()
    }

    /// Parse `<prefix>_<name>`; unset is `None`, unparseable is an error
    fn parsed_var<T>(&self, name: &str) -> ConfigResult<Option<T>>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        let Some(value) = self.get_env_var(name) else {
            return Ok(None);
        };
        match value.trim().parse::<T>() {
            Ok(parsed) => Ok(Some(parsed)),
            Err(e) => Err(ConfigError::EnvError {
                var: self.var_name(name),
                message: e.to_string(),
                value,
            }),
        }
    }

    fn var_name(&self, name: &str) -> String {
        format!("{}_{}", self.prefix, name)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
