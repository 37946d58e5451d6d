//! Logging for linthost
//!
//! Sets up `tracing` for the orchestrator binaries and keeps user-facing
//! error notifications from repeating while an identical one is showing.

pub mod config;
pub mod dedup;
pub mod init;

// Re-export main types for convenience
pub use config::{LogFormat, LoggingConfig};
pub use dedup::{ErrorDeduplicator, NOTIFICATION_EXPIRY};
pub use init::{init_logging, init_simple_tracing};
