//! Analysis engine for linthost workers
//!
//! Workers never talk to a concrete engine directly. They resolve an
//! [`EngineInstallation`] for the file being linted and ask an
//! [`EngineFactory`] for [`Engine`] instances bound to a working directory.
//! The crate ships [`BuiltinEngine`], a small token-level JavaScript linter
//! with a handful of rules, which is what the worker binary uses.

pub mod builtin;
pub mod config;
pub mod engine;
pub mod error;
pub mod fs_utils;
pub mod ignore;
pub mod install;
pub mod rules;
pub mod source;

pub use builtin::{BuiltinEngine, BuiltinEngineFactory};
pub use config::{ConfigFlavor, ResolvedConfig, RuleSetting};
pub use engine::{Engine, EngineFactory, EngineOptions, FixPolicy, LintMessage, LintResult};
pub use error::{EngineError, EngineResult};
pub use install::{
    resolve_installation, EngineInstallation, BUNDLED_ENGINE_VERSION, MINIMUM_ENGINE_VERSION,
};

/// Flat config file, looked up from the linted file towards the root
pub const FLAT_CONFIG_FILE: &str = "lint.config.json";

/// Legacy config file, cascaded upward until one declares `"root": true`
pub const LEGACY_CONFIG_FILE: &str = ".lintrc.json";

/// Ignore file read from the engine's working directory
pub const IGNORE_FILE: &str = ".lintignore";

/// Package directory name an installed engine lives under in `node_modules`
pub const ENGINE_PACKAGE_NAME: &str = "linthost-engine";

/// Upper bound on re-lint passes while applying fixes
pub const MAX_FIX_PASSES: usize = 10;
