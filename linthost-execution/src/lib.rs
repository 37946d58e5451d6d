//! linthost execution
//!
//! The orchestrator side of linthost: a pool of long-lived worker processes,
//! one per project and runtime, and the request correlation that lets many
//! concurrent lint and fix requests share a single worker's stdio.

pub mod dispatch;
pub mod error;
pub mod pending;
pub mod pool;
pub mod service;
pub mod worker;

// Re-export main types
pub use dispatch::DispatcherRegistry;
pub use error::{WorkerProcessError, WorkerResult};
pub use pending::{PendingRequest, PendingTable, Settlement};
pub use pool::{PoolStats, WorkerPool, WorkerStats};
pub use service::{LintOutcome, LintService};
pub use worker::{correlation_key, WorkerKey, WorkerProcess, WorkerSpawnSpec, CORRELATION_KEY_LEN};
