//! A single worker process and the requests in flight to it

use linthost_ipc::{
    DebugReport, DispatcherVariant, Job, JobType, LineReader, LineWriter, LintReport, LogFrame,
    LogLevel, Prerequisite, WireError, WorkerFrame, WorkerRequest,
};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::io::BufReader;
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use crate::error::{WorkerProcessError, WorkerResult};
use crate::pending::{PendingGuard, PendingRequest, PendingTable};
use crate::pool::PoolShared;

/// Length of the random correlation key attached to every request
pub const CORRELATION_KEY_LEN: usize = 8;

/// Attempts at finding a correlation key that is not already pending
const KEY_ATTEMPTS: usize = 4;

/// Identity of a worker in the pool: one per project and runtime
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkerKey(String);

impl WorkerKey {
    pub fn new(project_path: &Path, prerequisite: &Prerequisite) -> Self {
        Self(format!(
            "{}:{}:{}",
            project_path.display(),
            prerequisite.runtime_path.display(),
            prerequisite.runtime_version
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How to launch one worker
#[derive(Debug, Clone)]
pub struct WorkerSpawnSpec {
    pub key: WorkerKey,
    pub project_path: PathBuf,
    pub prerequisite: Prerequisite,
    pub dispatcher: DispatcherVariant,
    /// Arguments placed between the runtime binary and `--dispatcher`
    pub launch_args: Vec<String>,
}

impl WorkerSpawnSpec {
    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.prerequisite.runtime_path);
        cmd.args(&self.launch_args)
            .arg("--dispatcher")
            .arg(self.dispatcher.as_str())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

/// Handle to a running worker.
///
/// Owns the writer channel and the pending-request table. The handle is torn
/// down exactly once, whichever comes first of process exit, stdout closing
/// or an explicit kill; teardown settles every pending request with `None`
/// and drops the handle from its pool.
pub struct WorkerProcess {
    pub id: Uuid,
    pub key: WorkerKey,
    pub project_path: PathBuf,
    pub prerequisite: Prerequisite,
    pub dispatcher: DispatcherVariant,
    pub pid: Option<u32>,
    pub started_at: Instant,
    stdin_tx: mpsc::UnboundedSender<String>,
    pending: PendingTable,
    kill_tx: Mutex<Option<oneshot::Sender<()>>>,
    exited: AtomicBool,
    killed: AtomicBool,
    connected: AtomicBool,
    torn_down: AtomicBool,
    pool: Weak<PoolShared>,
}

impl fmt::Debug for WorkerProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerProcess")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("pid", &self.pid)
            .field("dispatcher", &self.dispatcher)
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl WorkerProcess {
    /// Launch the worker and attach its reader, writer and exit monitor.
    ///
    /// Must run inside a Tokio runtime. Does not wait for the worker to be
    /// ready; requests written before it starts reading sit in the pipe.
    pub(crate) fn spawn(spec: WorkerSpawnSpec, pool: Weak<PoolShared>) -> WorkerResult<Arc<Self>> {
        debug!(
            "Spawning {} worker for {}",
            spec.dispatcher,
            spec.project_path.display()
        );

        let mut child = spec.command().spawn().map_err(|e| {
            WorkerProcessError::Spawn(format!(
                "{}: {}",
                spec.prerequisite.runtime_path.display(),
                e
            ))
        })?;
        let pid = child.id();

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| WorkerProcessError::Spawn("Failed to get stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| WorkerProcessError::Spawn("Failed to get stdout".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| WorkerProcessError::Spawn("Failed to get stderr".to_string()))?;

        let (stdin_tx, stdin_rx) = mpsc::unbounded_channel();
        let (kill_tx, kill_rx) = oneshot::channel();

        let worker = Arc::new(Self {
            id: Uuid::new_v4(),
            key: spec.key,
            project_path: spec.project_path,
            prerequisite: spec.prerequisite,
            dispatcher: spec.dispatcher,
            pid,
            started_at: Instant::now(),
            stdin_tx,
            pending: PendingTable::new(),
            kill_tx: Mutex::new(Some(kill_tx)),
            exited: AtomicBool::new(false),
            killed: AtomicBool::new(false),
            connected: AtomicBool::new(true),
            torn_down: AtomicBool::new(false),
            pool,
        });

        tokio::spawn(Self::stdin_writer_task(
            Arc::downgrade(&worker),
            stdin,
            stdin_rx,
        ));
        tokio::spawn(Self::stdout_reader_task(Arc::downgrade(&worker), stdout));
        tokio::spawn(Self::stderr_reader_task(worker.key.clone(), stderr));
        tokio::spawn(Self::exit_monitor_task(
            Arc::downgrade(&worker),
            child,
            kill_rx,
        ));

        info!("Started worker {} (pid {:?}) for {}", worker.key, pid, worker.dispatcher);
        Ok(worker)
    }

    /// Whether new requests can be sent
    pub fn is_available(&self) -> bool {
        !self.exited.load(Ordering::SeqCst)
            && !self.killed.load(Ordering::SeqCst)
            && self.connected.load(Ordering::SeqCst)
    }

    pub fn has_exited(&self) -> bool {
        self.exited.load(Ordering::SeqCst)
    }

    pub fn is_killed(&self) -> bool {
        self.killed.load(Ordering::SeqCst)
    }

    /// Number of requests still waiting for a reply
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Terminate the process; teardown follows once it is gone
    pub fn kill(&self) {
        if self.killed.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!("Killing worker {}", self.key);
        if let Some(tx) = self.kill_tx.lock().take() {
            let _ = tx.send(());
        }
    }

    /// Send `job` and wait for its reply.
    ///
    /// `Ok(None)` means the worker went away before answering, or answered
    /// without a result. On timeout the request is dropped, the whole worker
    /// is killed (its other requests settle with `None`) and `Timeout` is
    /// returned.
    pub async fn send_message(&self, job: &Job, timeout: Duration) -> WorkerResult<Option<JsonValue>> {
        if !self.is_available() {
            return Err(WorkerProcessError::WorkerUnavailable {
                key: self.key.to_string(),
            });
        }

        let (tx, rx) = oneshot::channel();
        let key = self.register(PendingRequest::new(
            job.job_type,
            job.file_path().cloned(),
            tx,
        ))?;
        let mut guard = PendingGuard::new(&self.pending, &key);

        let line = serde_json::to_string(&WorkerRequest { key: &key, job })?;
        trace!("Sending {} request {} to worker {}", job.job_type, key, self.key);
        self.stdin_tx
            .send(line)
            .map_err(|_| WorkerProcessError::WorkerUnavailable {
                key: self.key.to_string(),
            })?;

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(settlement)) => {
                guard.disarm();
                settlement
            }
            // Sender dropped without settling; treat like teardown
            Ok(Err(_)) => {
                guard.disarm();
                Ok(None)
            }
            Err(_) => {
                self.pending.remove(&key);
                guard.disarm();
                drop(guard);
                warn!(
                    "Request {} ({}) to worker {} timed out after {:?}; killing worker",
                    key, job.job_type, self.key, timeout
                );
                self.kill();
                Err(WorkerProcessError::Timeout {
                    key,
                    job_type: job.job_type,
                    timeout,
                })
            }
        }
    }

    fn register(&self, request: PendingRequest) -> WorkerResult<String> {
        let key = (0..KEY_ATTEMPTS)
            .map(|_| correlation_key())
            .find(|key| !self.pending.contains(key))
            .unwrap_or_else(correlation_key);
        self.pending.register(&key, request)?;
        Ok(key)
    }

    /// Send `job` and decode the result
    pub async fn request<T: DeserializeOwned>(
        &self,
        job: &Job,
        timeout: Duration,
    ) -> WorkerResult<Option<T>> {
        match self.send_message(job, timeout).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    pub async fn lint(&self, job: &Job, timeout: Duration) -> WorkerResult<Option<LintReport>> {
        debug_assert_eq!(job.job_type, JobType::Lint);
        self.request(job, timeout).await
    }

    pub async fn fix(&self, job: &Job, timeout: Duration) -> WorkerResult<Option<LintReport>> {
        debug_assert_eq!(job.job_type, JobType::Fix);
        self.request(job, timeout).await
    }

    pub async fn debug(&self, job: &Job, timeout: Duration) -> WorkerResult<Option<DebugReport>> {
        debug_assert_eq!(job.job_type, JobType::Debug);
        self.request(job, timeout).await
    }

    /// Ask the worker to drop its engine cache; `true` once it confirms
    pub async fn clear_cache(&self, timeout: Duration) -> WorkerResult<bool> {
        let reply: Option<linthost_ipc::ClearCacheReport> =
            self.request(&Job::clear_cache(), timeout).await?;
        Ok(reply.is_some_and(|report| report.result))
    }

    /// Settle everything still pending and leave the pool. Runs once.
    fn teardown(&self, reason: &str) {
        if self.torn_down.swap(true, Ordering::SeqCst) {
            return;
        }
        self.connected.store(false, Ordering::SeqCst);

        let drained = self.pending.drain();
        if !drained.is_empty() {
            debug!(
                "Worker {} {}; settling {} pending request(s) with no result",
                self.key,
                reason,
                drained.len()
            );
        }
        for (_, request) in drained {
            request.settle(Ok(None));
        }

        if let Some(pool) = self.pool.upgrade() {
            let mut workers = pool.workers.lock();
            let is_current = workers
                .get(&self.key)
                .is_some_and(|current| std::ptr::eq(Arc::as_ptr(current), self));
            if is_current {
                workers.remove(&self.key);
            }
        }

        // Make sure the process does not outlive its handle
        if let Some(tx) = self.kill_tx.lock().take() {
            let _ = tx.send(());
        }

        info!("Worker {} {}", self.key, reason);
    }

    fn handle_frame(&self, line: &str) {
        let frame = match serde_json::from_str::<WorkerFrame>(line) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(
                    "Failed to parse message from worker {}: {} - line: {}",
                    self.key, e, line
                );
                return;
            }
        };

        match frame {
            WorkerFrame::Log(frame) => forward_log(&self.key, &frame),
            WorkerFrame::Reply(reply) => match self.pending.take(&reply.key) {
                Some(request) => {
                    trace!(
                        "Request {} ({}{}) answered in {}ms (worker reported {}ms)",
                        reply.key,
                        request.job_type,
                        request
                            .file_path
                            .as_ref()
                            .map(|p| format!(" {}", p.display()))
                            .unwrap_or_default(),
                        request.started.elapsed().as_millis(),
                        reply.duration
                    );
                    let settlement = reply
                        .into_outcome()
                        .map_err(WorkerProcessError::Rejected);
                    request.settle(settlement);
                }
                None => error!("[{}] Handlers not found", reply.key),
            },
        }
    }

    async fn stdin_writer_task(
        worker: Weak<Self>,
        stdin: ChildStdin,
        mut rx: mpsc::UnboundedReceiver<String>,
    ) {
        let mut writer = LineWriter::new(stdin);
        while let Some(line) = rx.recv().await {
            if let Err(e) = writer.write_line(&line).await {
                if let Some(worker) = worker.upgrade() {
                    debug!("Worker {} stdin closed: {}", worker.key, e);
                    worker.connected.store(false, Ordering::SeqCst);
                }
                break;
            }
        }
    }

    async fn stdout_reader_task(worker: Weak<Self>, stdout: ChildStdout) {
        let mut reader = LineReader::new(BufReader::new(stdout));
        loop {
            let next = reader.read_line().await;
            let Some(handle) = worker.upgrade() else {
                break;
            };
            match next {
                Ok(Some(line)) => handle.handle_frame(&line),
                Ok(None) => {
                    handle.teardown("closed its output");
                    break;
                }
                Err(e) => {
                    error!("Failed to read from worker {} stdout: {}", handle.key, e);
                    handle.teardown("failed");
                    break;
                }
            }
        }
    }

    /// The worker's error channel: fatal errors arrive here as JSON
    async fn stderr_reader_task(key: WorkerKey, stderr: ChildStderr) {
        let mut reader = LineReader::new(BufReader::new(stderr));
        while let Ok(Some(line)) = reader.read_line().await {
            match serde_json::from_str::<WireError>(&line) {
                Ok(wire) => error!("Worker {} error: {}", key, wire),
                Err(_) => warn!("Worker {} stderr: {}", key, line),
            }
        }
    }

    async fn exit_monitor_task(worker: Weak<Self>, mut child: Child, kill_rx: oneshot::Receiver<()>) {
        let exited = tokio::select! {
            status = child.wait() => Some(status),
            _ = kill_rx => None,
        };
        let status = match exited {
            Some(status) => status,
            None => {
                if let Err(e) = child.start_kill() {
                    trace!("Kill signal not delivered: {}", e);
                }
                child.wait().await
            }
        };

        let Some(handle) = worker.upgrade() else {
            return;
        };
        handle.exited.store(true, Ordering::SeqCst);
        let reason = match status {
            Ok(status) => format!("exited ({status})"),
            Err(e) => format!("could not be waited on ({e})"),
        };
        handle.teardown(&reason);
    }
}

/// Random alphanumeric correlation key
pub fn correlation_key() -> String {
    std::iter::repeat_with(fastrand::alphanumeric)
        .take(CORRELATION_KEY_LEN)
        .collect()
}

fn forward_log(key: &WorkerKey, frame: &LogFrame) {
    let text = frame.text();
    match frame.level() {
        LogLevel::Trace => trace!(target: "linthost::worker", worker = %key, "{}", text),
        LogLevel::Debug => debug!(target: "linthost::worker", worker = %key, "{}", text),
        LogLevel::Log | LogLevel::Info => {
            info!(target: "linthost::worker", worker = %key, "{}", text)
        }
        LogLevel::Warn => warn!(target: "linthost::worker", worker = %key, "{}", text),
        LogLevel::Error => error!(target: "linthost::worker", worker = %key, "{}", text),
    }
}
