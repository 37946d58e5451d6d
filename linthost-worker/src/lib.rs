//! Worker process for linthost
//!
//! A worker reads newline-delimited job requests on stdin, runs each one
//! against a cached engine instance for the job's working directory and
//! writes replies and log frames to stdout. Messages it cannot correlate to
//! a request are reported on stderr.
//!
//! The worker keeps the process working directory untouched. Every engine
//! instance is created with its own explicit working directory instead.

pub mod convert;
pub mod dispatcher;
pub mod engine_cache;
pub mod error;
pub mod frames;
pub mod handlers;
pub mod log_forward;

pub use dispatcher::{dispatch, parse_line, JobDispatcher};
pub use engine_cache::{find_cwd, is_incompatible, EngineCache, EngineCacheEntry, GetEngineOptions};
pub use error::{JobError, JobResult};
pub use frames::{write_frames, FrameSink};
pub use handlers::Handlers;
pub use log_forward::{init_worker_tracing, FrameLayer};

use linthost_engine::{BuiltinEngineFactory, EngineFactory};
use linthost_ipc::{DispatcherVariant, IpcError, WireError};
use std::io::Write;
use std::sync::Arc;
use tokio::io::BufReader;
use tokio::sync::oneshot;
use tracing::{debug, info};

/// Report panics that escape a job as an error line on stderr
pub fn install_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        let error = WireError::unknown(info.to_string());
        if let Ok(line) = serde_json::to_string(&error) {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{line}");
        }
    }));
}

/// Run a worker on stdio with the bundled engine
pub async fn run(dispatcher: DispatcherVariant) -> Result<(), IpcError> {
    run_with_factory(Arc::new(BuiltinEngineFactory), dispatcher).await
}

pub async fn run_with_factory(
    factory: Arc<dyn EngineFactory>,
    dispatcher: DispatcherVariant,
) -> Result<(), IpcError> {
    let (frames, rx) = FrameSink::channel();
    init_worker_tracing(frames.clone());
    install_panic_hook();

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let writer = tokio::spawn(write_frames(rx, tokio::io::stdout(), shutdown_rx));

    info!(
        "Worker {} started with the {} dispatcher",
        std::process::id(),
        dispatcher
    );
    let handlers = Arc::new(Handlers::new(factory, dispatcher));
    let served = JobDispatcher::new(handlers, frames)
        .serve(BufReader::new(tokio::io::stdin()), tokio::io::stderr())
        .await;
    debug!("Input closed, flushing replies");

    let _ = shutdown_tx.send(());
    match writer.await {
        Ok(written) => served.and(written),
        Err(e) => served.and(Err(IpcError::IoError(format!("Frame writer stopped: {e}")))),
    }
}
