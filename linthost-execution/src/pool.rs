//! The worker pool: one live worker per project and runtime

use linthost_ipc::{DispatcherVariant, Prerequisite, DEFAULT_REQUEST_TIMEOUT_MS};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::dispatch::DispatcherRegistry;
use crate::error::WorkerResult;
use crate::worker::{WorkerKey, WorkerProcess, WorkerSpawnSpec};

/// State shared between the pool and the workers it spawned
#[derive(Debug, Default)]
pub(crate) struct PoolShared {
    pub(crate) workers: Mutex<HashMap<WorkerKey, Arc<WorkerProcess>>>,
    spawned: AtomicUsize,
}

/// Snapshot of one worker
#[derive(Debug, Clone, Serialize)]
pub struct WorkerStats {
    pub key: String,
    pub project_path: PathBuf,
    pub pid: Option<u32>,
    pub dispatcher: DispatcherVariant,
    pub pending: usize,
    pub uptime: Duration,
}

/// Snapshot of the pool
#[derive(Debug, Clone, Serialize)]
pub struct PoolStats {
    pub live_workers: usize,
    pub total_spawned: usize,
    pub workers: Vec<WorkerStats>,
}

/// Caches one worker process per (project, runtime binary, runtime version)
pub struct WorkerPool {
    shared: Arc<PoolShared>,
    registry: DispatcherRegistry,
    launch_args: Vec<String>,
    request_timeout: Duration,
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerPool {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(PoolShared::default()),
            registry: DispatcherRegistry::default(),
            launch_args: Vec::new(),
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
        }
    }

    pub fn with_registry(mut self, registry: DispatcherRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Extra arguments passed to the runtime before `--dispatcher`
    pub fn with_launch_args(mut self, args: Vec<String>) -> Self {
        self.launch_args = args;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Return the worker for this project and runtime, spawning it if needed.
    ///
    /// The map stays locked from lookup until the new handle is stored, so
    /// concurrent callers for the same key share one process.
    pub fn ensure_worker(
        &self,
        project_path: &Path,
        prerequisite: &Prerequisite,
    ) -> WorkerResult<Arc<WorkerProcess>> {
        let key = WorkerKey::new(project_path, prerequisite);
        let mut workers = self.shared.workers.lock();

        if let Some(worker) = workers.get(&key) {
            if worker.is_available() {
                return Ok(Arc::clone(worker));
            }
            debug!("Replacing unavailable worker {}", key);
        }

        let spec = WorkerSpawnSpec {
            key: key.clone(),
            project_path: project_path.to_path_buf(),
            prerequisite: prerequisite.clone(),
            dispatcher: self.registry.select(prerequisite),
            launch_args: self.launch_args.clone(),
        };
        let worker = WorkerProcess::spawn(spec, Arc::downgrade(&self.shared))?;
        self.shared.spawned.fetch_add(1, Ordering::SeqCst);
        workers.insert(key, Arc::clone(&worker));
        Ok(worker)
    }

    /// Kill and forget every worker for `project_path`
    pub fn remove_project(&self, project_path: &Path) -> Vec<Arc<WorkerProcess>> {
        let removed: Vec<_> = {
            let mut workers = self.shared.workers.lock();
            let keys: Vec<_> = workers
                .iter()
                .filter(|(_, worker)| worker.project_path == project_path)
                .map(|(key, _)| key.clone())
                .collect();
            keys.iter().filter_map(|key| workers.remove(key)).collect()
        };

        for worker in &removed {
            worker.kill();
        }
        if !removed.is_empty() {
            info!(
                "Removed {} worker(s) for {}",
                removed.len(),
                project_path.display()
            );
        }
        removed
    }

    /// Kill every live worker
    pub fn dispose_all(&self) {
        let workers: Vec<_> = self.shared.workers.lock().drain().map(|(_, w)| w).collect();
        for worker in &workers {
            worker.kill();
        }
        if !workers.is_empty() {
            debug!("Disposed {} worker(s)", workers.len());
        }
    }

    /// Drop every engine cache by killing all workers; returns how many
    pub fn clear_cache(&self) -> usize {
        let workers: Vec<_> = self.shared.workers.lock().drain().map(|(_, w)| w).collect();
        for worker in &workers {
            worker.kill();
        }
        info!("Cleared cache: killed {} worker(s)", workers.len());
        workers.len()
    }

    /// Live workers, in no particular order
    pub fn workers(&self) -> Vec<Arc<WorkerProcess>> {
        self.shared.workers.lock().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.shared.workers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> PoolStats {
        let workers = self.shared.workers.lock();
        PoolStats {
            live_workers: workers.len(),
            total_spawned: self.shared.spawned.load(Ordering::SeqCst),
            workers: workers
                .values()
                .map(|worker| WorkerStats {
                    key: worker.key.to_string(),
                    project_path: worker.project_path.clone(),
                    pid: worker.pid,
                    dispatcher: worker.dispatcher,
                    pending: worker.pending_count(),
                    uptime: worker.started_at.elapsed(),
                })
                .collect(),
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.dispose_all();
    }
}
