//! Job failures and their wire form

use linthost_engine::EngineError;
use linthost_ipc::WireError;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub type JobResult<T> = Result<T, JobError>;

#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("This project uses engine version {version}; linthost requires a minimum of {minimum_version}.")]
    IncompatibleVersion {
        version: String,
        minimum_version: String,
    },

    /// The job is missing a field its handler needs
    #[error("Invalid {job_type} job: {message}")]
    InvalidJob {
        job_type: &'static str,
        message: String,
    },

    #[error("Failed to encode result: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl JobError {
    pub fn invalid(job_type: &'static str, message: impl Into<String>) -> Self {
        JobError::InvalidJob {
            job_type,
            message: message.into(),
        }
    }

    /// The form sent back to the orchestrator
    pub fn into_wire(self, file_path: Option<&Path>, project_path: Option<&Path>) -> WireError {
        match self {
            JobError::Engine(EngineError::NoConfigFound { file_path: missing }) => {
                let file_path = file_path.map(Path::to_path_buf).unwrap_or(missing);
                WireError::config_not_found(file_path, project_path.map(PathBuf::from))
            }
            JobError::IncompatibleVersion {
                version,
                minimum_version,
            } => WireError::incompatible_version(version, minimum_version),
            JobError::Engine(e) => WireError::engine(e.to_string()),
            other => WireError::unknown(other.to_string()),
        }
    }
}
