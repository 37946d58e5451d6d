//! The engine interface workers program against

use async_trait::async_trait;
use linthost_ipc::{FixEdit, RuleMeta};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::ConfigFlavor;
use crate::error::EngineResult;
use crate::install::EngineInstallation;

/// One problem reported by the engine, with 1-based positions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LintMessage {
    /// `None` for parse errors and other fatal problems
    pub rule_id: Option<String>,
    /// 0 = info, 1 = warning, 2 = error
    pub severity: u8,
    pub message: String,
    pub line: u32,
    pub column: u32,
    pub end_line: Option<u32>,
    pub end_column: Option<u32>,
    pub fix: Option<FixEdit>,
    #[serde(default)]
    pub fatal: bool,
}

/// Outcome of linting one file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LintResult {
    pub file_path: PathBuf,
    pub messages: Vec<LintMessage>,
    /// Fixed source text, present only when fixes changed the file
    pub output: Option<String>,
}

impl LintResult {
    pub fn error_count(&self) -> usize {
        self.messages.iter().filter(|m| m.severity == 2).count()
    }

    pub fn warning_count(&self) -> usize {
        self.messages.iter().filter(|m| m.severity == 1).count()
    }
}

/// Which fixes an engine applies while linting
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FixPolicy {
    #[default]
    Disabled,
    /// Apply fixes from every rule except the listed ones
    Enabled { exclude: Vec<String> },
}

impl FixPolicy {
    pub fn is_enabled(&self) -> bool {
        matches!(self, FixPolicy::Enabled { .. })
    }

    pub fn applies_to(&self, rule_id: Option<&str>) -> bool {
        match self {
            FixPolicy::Disabled => false,
            FixPolicy::Enabled { exclude } => {
                rule_id.is_some_and(|id| !exclude.iter().any(|excluded| excluded == id))
            }
        }
    }
}

/// Construction options for one engine instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    /// Directory ignore files and relative paths are resolved against
    pub cwd: PathBuf,
    pub flavor: ConfigFlavor,
    /// Honour `.lintignore` and config ignore patterns
    pub ignore: bool,
    pub fix: FixPolicy,
    pub override_config: Option<PathBuf>,
}

impl EngineOptions {
    pub fn new(cwd: impl Into<PathBuf>, flavor: ConfigFlavor) -> Self {
        Self {
            cwd: cwd.into(),
            flavor,
            ignore: true,
            fix: FixPolicy::Disabled,
            override_config: None,
        }
    }
}

#[async_trait]
pub trait Engine: Send + Sync {
    /// Working directory the instance was built for
    fn cwd(&self) -> &Path;

    async fn is_path_ignored(&self, path: &Path) -> EngineResult<bool>;

    /// Lint in-memory text as if it were the contents of `file_path`
    async fn lint_text(&self, text: &str, file_path: &Path) -> EngineResult<Vec<LintResult>>;

    /// Lint the file as it is on disk
    async fn lint_file(&self, file_path: &Path) -> EngineResult<Vec<LintResult>>;

    /// Metadata for every rule that reported in `results`
    fn rules_meta_for_results(&self, results: &[LintResult]) -> BTreeMap<String, RuleMeta>;

    /// Write fixed output back to disk for results that carry some
    async fn output_fixes(&self, results: &[LintResult]) -> EngineResult<()>;
}

/// Builds engine instances for a resolved installation
pub trait EngineFactory: Send + Sync {
    fn create(
        &self,
        installation: &EngineInstallation,
        options: EngineOptions,
    ) -> EngineResult<Arc<dyn Engine>>;
}
