//! IPC error types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Transport-level failures
#[derive(Debug, Error)]
pub enum IpcError {
    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Deserialization error
    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(String),

    /// Connection closed
    #[error("Connection closed")]
    ConnectionClosed,

    /// Invalid message format
    #[error("Invalid message format: {0}")]
    InvalidMessage(String),
}

impl IpcError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, IpcError::IoError(_) | IpcError::ConnectionClosed)
    }

    /// Check if this error indicates a fatal condition
    pub fn is_fatal(&self) -> bool {
        matches!(self, IpcError::InvalidMessage(_))
    }
}

impl From<std::io::Error> for IpcError {
    fn from(err: std::io::Error) -> Self {
        IpcError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for IpcError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_io() {
            IpcError::IoError(err.to_string())
        } else if err.is_data() || err.is_syntax() || err.is_eof() {
            IpcError::DeserializationError(err.to_string())
        } else {
            IpcError::SerializationError(err.to_string())
        }
    }
}

/// The closed set of failures a worker can report for a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum JobErrorKind {
    NoJobKey,
    NoJobType,
    #[serde(rename_all = "camelCase")]
    NoJobFound { job_type: String },
    #[serde(rename_all = "camelCase")]
    ConfigNotFound {
        file_path: PathBuf,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        project_path: Option<PathBuf>,
    },
    #[serde(rename_all = "camelCase")]
    IncompatibleVersion {
        version: String,
        minimum_version: String,
    },
    Engine,
    Unknown,
}

impl JobErrorKind {
    /// Error class name shown to users
    pub fn name(&self) -> &'static str {
        match self {
            JobErrorKind::NoJobKey => "JobKeyError",
            JobErrorKind::NoJobType => "JobTypeError",
            JobErrorKind::NoJobFound { .. } => "JobNotFoundError",
            JobErrorKind::ConfigNotFound { .. } => "ConfigNotFoundError",
            JobErrorKind::IncompatibleVersion { .. } => "IncompatibleVersionError",
            JobErrorKind::Engine => "EngineError",
            JobErrorKind::Unknown => "UnknownError",
        }
    }
}

/// A job failure as it crosses the process boundary.
///
/// Serialises flat: `{"name", "message", "stack"?, "type", ...kind fields}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireError {
    pub name: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    #[serde(flatten)]
    pub kind: JobErrorKind,
}

impl WireError {
    pub fn new(kind: JobErrorKind, message: impl Into<String>) -> Self {
        Self {
            name: kind.name().to_string(),
            message: message.into(),
            stack: None,
            kind,
        }
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    pub fn no_job_key() -> Self {
        Self::new(JobErrorKind::NoJobKey, "Message had no job key")
    }

    pub fn no_job_type() -> Self {
        Self::new(JobErrorKind::NoJobType, "Message had no job type")
    }

    pub fn no_job_found(job_type: impl Into<String>) -> Self {
        let job_type = job_type.into();
        let message = format!("Could not find job of type: {job_type}");
        Self::new(JobErrorKind::NoJobFound { job_type }, message)
    }

    pub fn config_not_found(file_path: PathBuf, project_path: Option<PathBuf>) -> Self {
        let message = format!(
            "No configuration found for {}",
            file_path.to_string_lossy()
        );
        Self::new(
            JobErrorKind::ConfigNotFound {
                file_path,
                project_path,
            },
            message,
        )
    }

    pub fn incompatible_version(
        version: impl Into<String>,
        minimum_version: impl Into<String>,
    ) -> Self {
        let version = version.into();
        let minimum_version = minimum_version.into();
        let message = format!(
            "This project uses engine version {version}; linthost requires a minimum of {minimum_version}."
        );
        Self::new(
            JobErrorKind::IncompatibleVersion {
                version,
                minimum_version,
            },
            message,
        )
    }

    pub fn engine(message: impl Into<String>) -> Self {
        Self::new(JobErrorKind::Engine, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(JobErrorKind::Unknown, message)
    }

    /// "No configuration" is expected for unconfigured projects and is not
    /// surfaced to users as a failure
    pub fn is_config_not_found(&self) -> bool {
        matches!(self.kind, JobErrorKind::ConfigNotFound { .. })
    }
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.message)
    }
}

impl std::error::Error for WireError {}
