//! IPC protocol definitions and message types

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::WireError;

/// Default deadline for a single request, in milliseconds
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 15_000;

/// The job kinds a worker knows how to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobType {
    Lint,
    Fix,
    ClearCache,
    Debug,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::Lint => "lint",
            JobType::Fix => "fix",
            JobType::ClearCache => "clear-cache",
            JobType::Debug => "debug",
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lint" => Ok(JobType::Lint),
            "fix" => Ok(JobType::Fix),
            "clear-cache" => Ok(JobType::ClearCache),
            "debug" => Ok(JobType::Debug),
            other => Err(other.to_string()),
        }
    }
}

/// Worker entry point, chosen per engine generation and config flavor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DispatcherVariant {
    #[serde(rename = "v8")]
    V8,
    #[serde(rename = "v8-flat")]
    V8Flat,
    #[serde(rename = "modern")]
    Modern,
}

impl DispatcherVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatcherVariant::V8 => "v8",
            DispatcherVariant::V8Flat => "v8-flat",
            DispatcherVariant::Modern => "modern",
        }
    }

    /// Legacy cascading config is only read by the `v8` dispatcher
    pub fn uses_flat_config(&self) -> bool {
        !matches!(self, DispatcherVariant::V8)
    }
}

impl fmt::Display for DispatcherVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DispatcherVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "v8" => Ok(DispatcherVariant::V8),
            "v8-flat" => Ok(DispatcherVariant::V8Flat),
            "modern" => Ok(DispatcherVariant::Modern),
            other => Err(format!("unknown dispatcher '{other}'")),
        }
    }
}

/// The file a job operates on
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobContent {
    pub file_path: PathBuf,
    /// Current buffer contents; the file on disk is read when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_text: Option<String>,
    /// Whether the buffer differs from the saved file
    #[serde(default)]
    pub is_modified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_path: Option<PathBuf>,
}

impl JobContent {
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: file_path.into(),
            ..Default::default()
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.file_text = Some(text.into());
        self
    }

    pub fn with_project(mut self, project_path: impl Into<PathBuf>) -> Self {
        self.project_path = Some(project_path.into());
        self
    }

    pub fn modified(mut self, is_modified: bool) -> Self {
        self.is_modified = is_modified;
        self
    }
}

/// Resolved runtime and engine locations for one file.
///
/// Produced by prerequisite discovery, which lives outside the orchestrator;
/// the pool only reads it to build worker keys and pick a dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prerequisite {
    pub runtime_path: PathBuf,
    pub runtime_version: String,
    pub engine_path: PathBuf,
    pub engine_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine_config: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine_ignore: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<PathBuf>,
}

impl Prerequisite {
    /// Major component of the engine version, if it parses
    pub fn engine_major_version(&self) -> Option<u64> {
        self.engine_version
            .trim_start_matches('v')
            .split('.')
            .next()
            .and_then(|major| major.parse().ok())
    }
}

/// Settings that change how results are produced and filtered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AdvancedConfig {
    pub disable_ignore_file: bool,
    pub show_rule_id_in_message: bool,
    pub ignore_fixable_rules_while_typing: bool,
    pub rules_to_disable_while_typing: Vec<String>,
    pub rules_to_disable_while_fixing: Vec<String>,
    pub use_cache: bool,
}

impl Default for AdvancedConfig {
    fn default() -> Self {
        Self {
            disable_ignore_file: false,
            show_rule_id_in_message: true,
            ignore_fixable_rules_while_typing: false,
            rules_to_disable_while_typing: Vec::new(),
            rules_to_disable_while_fixing: Vec::new(),
            use_cache: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineLocationConfig {
    /// Use this config file instead of discovering one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub override_config_file: Option<PathBuf>,
}

/// The `config` payload carried by lint and fix jobs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LintConfig {
    pub advanced: AdvancedConfig,
    pub engine_location: EngineLocationConfig,
}

/// A job as the caller builds it, before a correlation key is attached
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    #[serde(rename = "type")]
    pub job_type: JobType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<JobContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prerequisite: Option<Prerequisite>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<LintConfig>,
}

impl Job {
    pub fn lint(content: JobContent, prerequisite: Prerequisite, config: LintConfig) -> Self {
        Self {
            job_type: JobType::Lint,
            content: Some(content),
            prerequisite: Some(prerequisite),
            config: Some(config),
        }
    }

    pub fn fix(content: JobContent, prerequisite: Prerequisite, config: LintConfig) -> Self {
        Self {
            job_type: JobType::Fix,
            ..Self::lint(content, prerequisite, config)
        }
    }

    pub fn debug(content: JobContent, config: LintConfig) -> Self {
        Self {
            job_type: JobType::Debug,
            content: Some(content),
            prerequisite: None,
            config: Some(config),
        }
    }

    pub fn clear_cache() -> Self {
        Self {
            job_type: JobType::ClearCache,
            content: None,
            prerequisite: None,
            config: None,
        }
    }

    /// Path of the file this job targets, for log lines
    pub fn file_path(&self) -> Option<&PathBuf> {
        self.content.as_ref().map(|content| &content.file_path)
    }
}

/// A job on the wire: the job fields plus the correlation key
#[derive(Debug, Serialize)]
pub struct WorkerRequest<'a> {
    pub key: &'a str,
    #[serde(flatten)]
    pub job: &'a Job,
}

/// Level names used by log frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Log,
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

/// Out-of-band diagnostic forwarded from a worker: `{"log": [level, ...args]}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogFrame {
    pub log: Vec<JsonValue>,
}

impl LogFrame {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        let level = serde_json::to_value(level).unwrap_or(JsonValue::Null);
        Self {
            log: vec![level, JsonValue::String(message.into())],
        }
    }

    /// Level named by the first element; unknown levels read as `Log`
    pub fn level(&self) -> LogLevel {
        self.log
            .first()
            .cloned()
            .and_then(|level| serde_json::from_value(level).ok())
            .unwrap_or(LogLevel::Log)
    }

    /// Remaining elements joined with spaces, strings unquoted
    pub fn text(&self) -> String {
        self.log
            .iter()
            .skip(1)
            .map(|part| match part {
                JsonValue::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// A worker's answer to one request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobReply {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolve: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reject: Option<WireError>,
    /// Handler wall-clock time in milliseconds
    #[serde(default)]
    pub duration: u64,
}

impl JobReply {
    pub fn resolved(key: impl Into<String>, value: JsonValue, duration: u64) -> Self {
        Self {
            key: key.into(),
            resolve: Some(value),
            reject: None,
            duration,
        }
    }

    pub fn rejected(key: impl Into<String>, error: WireError, duration: u64) -> Self {
        Self {
            key: key.into(),
            resolve: None,
            reject: Some(error),
            duration,
        }
    }

    /// A rejection wins over a resolution; neither means "no result"
    pub fn into_outcome(self) -> Result<Option<JsonValue>, WireError> {
        match (self.reject, self.resolve) {
            (Some(error), _) => Err(error),
            (None, Some(JsonValue::Null)) | (None, None) => Ok(None),
            (None, Some(value)) => Ok(Some(value)),
        }
    }
}

/// Any line a worker writes to its stdout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WorkerFrame {
    Log(LogFrame),
    Reply(JobReply),
}

/// Display severity of one diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    /// Map the engine's numeric severity; out-of-range values are errors
    pub fn from_level(level: u8) -> Self {
        match level {
            0 => Severity::Info,
            1 => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

/// Zero-based `[[line, column], [line, column]]` range in a file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub file: PathBuf,
    pub position: [[u32; 2]; 2],
}

/// Replace the byte range `[start, end)` with `text`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixEdit {
    pub range: [usize; 2],
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub location: Location,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix: Option<FixEdit>,
    pub excerpt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleDocs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleMeta {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub rule_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docs: Option<RuleDocs>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixable: Option<String>,
}

/// Result of a lint or fix job
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LintReport {
    pub rules: BTreeMap<String, RuleMeta>,
    pub results: Vec<Diagnostic>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fix_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fix_applied: Option<bool>,
}

/// Result of a debug job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugReport {
    pub engine_path: PathBuf,
    pub engine_cwd: PathBuf,
    pub engine_version: String,
    pub is_built_in: bool,
    pub is_incompatible: bool,
    pub worker_pid: u32,
    pub dispatcher: String,
}

/// Result of a clear-cache job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearCacheReport {
    pub result: bool,
}
