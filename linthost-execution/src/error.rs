//! Error types for worker processes and the pool

use linthost_ipc::{IpcError, JobType, WireError};
use std::time::Duration;
use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerProcessError>;

#[derive(Error, Debug)]
pub enum WorkerProcessError {
    #[error("Failed to spawn worker: {0}")]
    Spawn(String),

    /// The worker exited, lost its pipes or was killed
    #[error("Worker {key} is not available")]
    WorkerUnavailable { key: String },

    #[error("A request with key {0} is already pending")]
    DuplicateKey(String),

    #[error("Request {key} ({job_type}) timed out after {}ms", timeout.as_millis())]
    Timeout {
        key: String,
        job_type: JobType,
        timeout: Duration,
    },

    /// The worker answered with an error
    #[error("{0}")]
    Rejected(WireError),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerProcessError {
    /// The project simply has no lint configuration
    pub fn is_config_not_found(&self) -> bool {
        matches!(self, WorkerProcessError::Rejected(error) if error.is_config_not_found())
    }

    /// A fresh worker might succeed where this one failed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WorkerProcessError::WorkerUnavailable { .. }
                | WorkerProcessError::Timeout { .. }
                | WorkerProcessError::DuplicateKey(_)
        )
    }

    /// The worker-side error, if the worker rejected the request
    pub fn wire_error(&self) -> Option<&WireError> {
        match self {
            WorkerProcessError::Rejected(error) => Some(error),
            _ => None,
        }
    }
}

impl From<IpcError> for WorkerProcessError {
    fn from(err: IpcError) -> Self {
        match err {
            IpcError::IoError(message) => {
                WorkerProcessError::Io(std::io::Error::new(std::io::ErrorKind::Other, message))
            }
            other => WorkerProcessError::Protocol(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_config_not_found_detection() {
        let error = WorkerProcessError::Rejected(WireError::config_not_found(
            PathBuf::from("/p/a.js"),
            Some(PathBuf::from("/p")),
        ));
        assert!(error.is_config_not_found());
        assert!(!error.is_retryable());
        assert_eq!(
            error.to_string(),
            "ConfigNotFoundError: No configuration found for /p/a.js"
        );
    }

    #[test]
    fn test_retryable() {
        let timeout = WorkerProcessError::Timeout {
            key: "abc".to_string(),
            job_type: JobType::Lint,
            timeout: Duration::from_millis(15_000),
        };
        assert!(timeout.is_retryable());
        assert_eq!(timeout.to_string(), "Request abc (lint) timed out after 15000ms");
        assert!(!WorkerProcessError::Protocol("bad".to_string()).is_retryable());
        assert!(!WorkerProcessError::Rejected(WireError::engine("boom")).is_config_not_found());
    }
}
