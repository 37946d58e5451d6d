//! Request-level facade over the pool

use linthost_ipc::{DebugReport, Job, JobContent, LintConfig, LintReport, Prerequisite};
use linthost_logging::ErrorDeduplicator;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error};

use crate::error::{WorkerProcessError, WorkerResult};
use crate::pool::WorkerPool;

/// What a lint or fix request produced
#[derive(Debug, Clone, PartialEq)]
pub enum LintOutcome {
    Report(LintReport),
    /// The project has no lint configuration for this file
    NothingToLint,
    /// The worker went away before answering
    NoResult,
}

impl LintOutcome {
    pub fn report(&self) -> Option<&LintReport> {
        match self {
            LintOutcome::Report(report) => Some(report),
            _ => None,
        }
    }
}

/// Routes requests to the right worker and filters what reaches the user
pub struct LintService {
    pool: Arc<WorkerPool>,
    config: LintConfig,
    notifications: ErrorDeduplicator,
}

impl LintService {
    pub fn new(pool: Arc<WorkerPool>, config: LintConfig) -> Self {
        Self {
            pool,
            config,
            notifications: ErrorDeduplicator::new(),
        }
    }

    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    pub fn notifications(&self) -> &ErrorDeduplicator {
        &self.notifications
    }

    pub async fn lint(
        &self,
        project_path: &Path,
        prerequisite: &Prerequisite,
        content: JobContent,
    ) -> WorkerResult<LintOutcome> {
        let job = Job::lint(
            content.with_project(project_path),
            prerequisite.clone(),
            self.config.clone(),
        );
        self.run_lint_job(project_path, prerequisite, job).await
    }

    pub async fn fix(
        &self,
        project_path: &Path,
        prerequisite: &Prerequisite,
        content: JobContent,
    ) -> WorkerResult<LintOutcome> {
        let job = Job::fix(
            content.with_project(project_path),
            prerequisite.clone(),
            self.config.clone(),
        );
        self.run_lint_job(project_path, prerequisite, job).await
    }

    pub async fn debug(
        &self,
        project_path: &Path,
        prerequisite: &Prerequisite,
        content: JobContent,
    ) -> WorkerResult<Option<DebugReport>> {
        let worker = self.pool.ensure_worker(project_path, prerequisite)?;
        let job = Job::debug(content.with_project(project_path), self.config.clone());
        worker
            .debug(&job, self.pool.request_timeout())
            .await
            .map_err(|e| self.notify(e))
    }

    /// Ask every live worker to drop its engine cache; returns how many confirmed
    pub async fn clear_cache(&self) -> usize {
        let mut cleared = 0;
        for worker in self.pool.workers() {
            match worker.clear_cache(self.pool.request_timeout()).await {
                Ok(true) => cleared += 1,
                Ok(false) => debug!("Worker {} gave no clear-cache result", worker.key),
                Err(e) => {
                    self.notify(e);
                }
            }
        }
        cleared
    }

    async fn run_lint_job(
        &self,
        project_path: &Path,
        prerequisite: &Prerequisite,
        job: Job,
    ) -> WorkerResult<LintOutcome> {
        let worker = self.pool.ensure_worker(project_path, prerequisite)?;
        match worker.request::<LintReport>(&job, self.pool.request_timeout()).await {
            Ok(Some(report)) => Ok(LintOutcome::Report(report)),
            Ok(None) => Ok(LintOutcome::NoResult),
            Err(e) if e.is_config_not_found() => {
                debug!("{}", e);
                Ok(LintOutcome::NothingToLint)
            }
            Err(e) => Err(self.notify(e)),
        }
    }

    /// Log a failure unless an identical one is already on screen
    fn notify(&self, err: WorkerProcessError) -> WorkerProcessError {
        let message = err.to_string();
        let stack = err.wire_error().and_then(|wire| wire.stack.as_deref());
        if self.notifications.report(&message, stack, false) {
            error!("{}", message);
        }
        err
    }
}
