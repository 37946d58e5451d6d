//! Wire protocol for linthost
//!
//! This crate defines the messages exchanged between the orchestrator and
//! its worker processes: the job request envelope, the reply and log frames
//! a worker writes back, the closed error taxonomy that crosses the process
//! boundary, and the newline-delimited JSON transport both sides use.

pub mod error;
pub mod protocol;
pub mod transport;

// Re-export commonly used types
pub use error::{IpcError, JobErrorKind, WireError};
pub use protocol::{
    AdvancedConfig, ClearCacheReport, DebugReport, Diagnostic, DispatcherVariant,
    EngineLocationConfig, FixEdit, Job, JobContent, JobReply, JobType, LintConfig, LintReport,
    Location, LogFrame, LogLevel, Prerequisite, RuleDocs, RuleMeta, Severity, WorkerFrame,
    WorkerRequest, DEFAULT_REQUEST_TIMEOUT_MS,
};
pub use transport::{LineReader, LineWriter};
