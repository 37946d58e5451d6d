//! Engine errors

use std::path::PathBuf;
use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    /// No config file applies to the file being linted
    #[error("No linthost configuration found for {}", file_path.display())]
    NoConfigFound { file_path: PathBuf },

    #[error("Invalid configuration in {}: {message}", path.display())]
    InvalidConfig { path: PathBuf, message: String },

    #[error("Cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Engine installation error: {0}")]
    Installation(String),
}

impl EngineError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        EngineError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn invalid_config(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        EngineError::InvalidConfig {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn is_no_config_found(&self) -> bool {
        matches!(self, EngineError::NoConfigFound { .. })
    }
}
