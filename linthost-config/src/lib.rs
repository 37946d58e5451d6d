//! Configuration management for linthost
//!
//! The orchestrator reads one YAML file split by domain (worker, logging,
//! lint), then applies `LINTHOST_*` environment overrides and validates
//! every domain.

pub mod error;
pub mod loader;
pub mod validation;

// Domain-specific configuration modules
pub mod domains;

// Re-export main types
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;
pub use validation::Validatable;

// Re-export domain configurations
pub use domains::{worker::WorkerConfig, LinthostConfig};
pub use linthost_ipc::LintConfig;
pub use linthost_logging::{LogFormat, LoggingConfig};
