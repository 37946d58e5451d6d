//! The four jobs a worker runs

use linthost_engine::{Engine, EngineFactory, LintResult};
use linthost_ipc::{
    ClearCacheReport, DebugReport, DispatcherVariant, Job, JobContent, JobType, LintConfig,
    LintReport,
};
use serde_json::Value as JsonValue;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::convert::convert_results;
use crate::engine_cache::{EngineCache, GetEngineOptions};
use crate::error::{JobError, JobResult};

/// Job handlers sharing one engine cache
pub struct Handlers {
    cache: EngineCache,
    dispatcher: DispatcherVariant,
}

impl Handlers {
    pub fn new(factory: Arc<dyn EngineFactory>, dispatcher: DispatcherVariant) -> Self {
        Self {
            cache: EngineCache::new(factory, dispatcher),
            dispatcher,
        }
    }

    pub fn cache(&self) -> &EngineCache {
        &self.cache
    }

    pub fn dispatcher(&self) -> DispatcherVariant {
        self.dispatcher
    }

    /// Run `job` and encode its result
    pub async fn handle(&self, job: &Job) -> JobResult<JsonValue> {
        let value = match job.job_type {
            JobType::Lint => serde_json::to_value(self.lint(job).await?)?,
            JobType::Fix => serde_json::to_value(self.fix(job).await?)?,
            JobType::ClearCache => serde_json::to_value(self.clear_cache())?,
            JobType::Debug => serde_json::to_value(self.debug(job).await?)?,
        };
        Ok(value)
    }

    pub async fn lint(&self, job: &Job) -> JobResult<LintReport> {
        let content = require_content(job)?;
        let config = job.config.clone().unwrap_or_default();
        let project = project_path(job, content);
        let entry = self
            .cache
            .get_engine(Some(&content.file_path), &config, options(&project, false))
            .await?;

        if entry.lint.is_path_ignored(&content.file_path).await? {
            debug!("Skipping ignored file: {}", content.file_path.display());
            return Ok(LintReport::default());
        }

        let results = lint_content(entry.lint.as_ref(), content).await?;
        let rules = entry.lint.rules_meta_for_results(&results);
        let diagnostics =
            convert_results(&results, &rules, &config.advanced, content.is_modified);

        Ok(LintReport {
            rules,
            results: diagnostics,
            fix_count: None,
            fix_applied: None,
        })
    }

    pub async fn fix(&self, job: &Job) -> JobResult<LintReport> {
        let content = require_content(job)?;
        let config = job.config.clone().unwrap_or_default();
        let project = project_path(job, content);
        let entry = self
            .cache
            .get_engine(Some(&content.file_path), &config, options(&project, false))
            .await?;

        if entry.fix.is_path_ignored(&content.file_path).await? {
            debug!("Skipping ignored file: {}", content.file_path.display());
            return Ok(LintReport::default());
        }

        let before = lint_content(entry.lint.as_ref(), content).await?;
        let problems_before: usize = before.iter().map(|r| r.messages.len()).sum();

        let fixed = lint_content(entry.fix.as_ref(), content).await?;
        entry.fix.output_fixes(&fixed).await?;

        let rules = entry.fix.rules_meta_for_results(&fixed);
        let diagnostics = convert_results(&fixed, &rules, &config.advanced, content.is_modified);
        let fix_count = (problems_before > 0)
            .then(|| problems_before.saturating_sub(diagnostics.len()));
        let fix_applied = fixed.iter().any(|result| result.output.is_some());
        debug!(
            "Fixed {} of {} problem(s) in {}",
            fix_count.unwrap_or(0),
            problems_before,
            content.file_path.display()
        );

        Ok(LintReport {
            rules,
            results: diagnostics,
            fix_count,
            fix_applied: Some(fix_applied),
        })
    }

    pub fn clear_cache(&self) -> ClearCacheReport {
        self.cache.clear();
        ClearCacheReport { result: true }
    }

    pub async fn debug(&self, job: &Job) -> JobResult<DebugReport> {
        let config = job.config.clone().unwrap_or_default();
        let file_path = job.file_path().map(PathBuf::as_path);
        let project = job
            .content
            .as_ref()
            .map(|content| project_path(job, content))
            .or_else(|| job.prerequisite.as_ref()?.working_directory.clone())
            .ok_or_else(|| JobError::invalid("debug", "no file or project path"))?;

        let entry = self
            .cache
            .get_engine(file_path, &config, options(&project, true))
            .await?;

        Ok(DebugReport {
            engine_path: entry.installation.package_root.clone(),
            engine_cwd: entry.cwd.clone(),
            engine_version: entry.version().to_string(),
            is_built_in: entry.installation.is_builtin,
            is_incompatible: entry.is_incompatible(),
            worker_pid: std::process::id(),
            dispatcher: self.dispatcher.to_string(),
        })
    }
}

fn options(project_path: &Path, is_debug: bool) -> GetEngineOptions<'_> {
    GetEngineOptions {
        project_path,
        is_debug,
    }
}

fn require_content(job: &Job) -> JobResult<&JobContent> {
    job.content
        .as_ref()
        .ok_or_else(|| JobError::invalid(job.job_type.as_str(), "no content"))
}

/// Project root for a job: the one sent with the content, else the
/// prerequisite's working directory, else the file's own directory
pub fn project_path(job: &Job, content: &JobContent) -> PathBuf {
    content
        .project_path
        .clone()
        .or_else(|| job.prerequisite.as_ref()?.working_directory.clone())
        .or_else(|| content.file_path.parent().map(Path::to_path_buf))
        .unwrap_or_default()
}

/// Lint the editor buffer when one was sent, the file on disk otherwise
async fn lint_content(engine: &dyn Engine, content: &JobContent) -> JobResult<Vec<LintResult>> {
    let results = match &content.file_text {
        Some(text) => engine.lint_text(text, &content.file_path).await?,
        None => engine.lint_file(&content.file_path).await?,
    };
    Ok(results)
}
