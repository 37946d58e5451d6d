//! Pool and correlator behaviour against small `/bin/sh` workers
#![cfg(unix)]

use linthost_execution::{WorkerPool, WorkerProcessError};
use linthost_ipc::{Job, JobContent, JobType, LintConfig, Prerequisite};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Answers every request with `{"result": true}`
const ECHO_WORKER: &str = r#"
while IFS= read -r line; do
  key=$(printf '%s' "$line" | sed -n 's/^{"key":"\([A-Za-z0-9]*\)".*/\1/p')
  printf '{"log":["info","handling %s"]}\n' "$key"
  printf '{"key":"%s","resolve":{"result":true},"duration":1}\n' "$key"
done
"#;

/// Reads requests and never answers
const SILENT_WORKER: &str = r#"
while IFS= read -r line; do :; done
"#;

/// Answers the first request under a key nobody asked for
const WRONG_KEY_WORKER: &str = r#"
IFS= read -r line
printf '{"key":"bogus000","resolve":{"result":true},"duration":0}\n'
while IFS= read -r line; do :; done
"#;

/// Exits as soon as the first request arrives
const CRASHING_WORKER: &str = r#"
IFS= read -r line
exit 3
"#;

fn prerequisite() -> Prerequisite {
    Prerequisite {
        runtime_path: PathBuf::from("/bin/sh"),
        runtime_version: "1.0.0".to_string(),
        engine_path: PathBuf::from("/p/node_modules/linthost-engine"),
        engine_version: "8.57.0".to_string(),
        engine_config: None,
        engine_ignore: None,
        working_directory: None,
    }
}

fn pool(script: &str) -> WorkerPool {
    WorkerPool::new()
        .with_launch_args(vec!["-c".to_string(), script.to_string(), "worker".to_string()])
        .with_request_timeout(Duration::from_secs(5))
}

fn lint_job(file: &str) -> Job {
    Job::lint(
        JobContent::new(file).with_text("foo;"),
        prerequisite(),
        LintConfig::default(),
    )
}

async fn wait_until_empty(pool: &WorkerPool) {
    for _ in 0..100 {
        if pool.is_empty() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("pool still holds {} worker(s)", pool.len());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_ensure_worker_spawns_once() {
    let pool = Arc::new(pool(ECHO_WORKER));
    let project = Path::new("/projects/one");

    let mut handles = Vec::new();
    for _ in 0..16 {
        let pool = Arc::clone(&pool);
        handles.push(tokio::spawn(async move {
            pool.ensure_worker(project, &prerequisite()).unwrap().id
        }));
    }

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap());
    }
    ids.dedup();
    assert_eq!(ids.len(), 1);

    let stats = pool.stats();
    assert_eq!(stats.live_workers, 1);
    assert_eq!(stats.total_spawned, 1);
}

#[tokio::test]
async fn test_distinct_keys_get_distinct_workers() {
    let pool = pool(ECHO_WORKER);
    let a = pool.ensure_worker(Path::new("/projects/a"), &prerequisite()).unwrap();
    let b = pool.ensure_worker(Path::new("/projects/b"), &prerequisite()).unwrap();

    let mut other_runtime = prerequisite();
    other_runtime.runtime_version = "2.0.0".to_string();
    let c = pool.ensure_worker(Path::new("/projects/a"), &other_runtime).unwrap();

    assert_ne!(a.id, b.id);
    assert_ne!(a.id, c.id);
    assert_eq!(a.key.as_str(), "/projects/a:/bin/sh:1.0.0");
    assert_eq!(pool.len(), 3);
}

#[tokio::test]
async fn test_replies_are_correlated_by_key() {
    let pool = pool(ECHO_WORKER);
    let worker = pool.ensure_worker(Path::new("/projects/one"), &prerequisite()).unwrap();
    let timeout = pool.request_timeout();

    let (job_a, job_b) = (lint_job("/projects/one/a.js"), lint_job("/projects/one/b.js"));
    let (first, second, third) = tokio::join!(
        worker.send_message(&job_a, timeout),
        worker.send_message(&job_b, timeout),
        worker.clear_cache(timeout),
    );

    assert_eq!(first.unwrap(), Some(json!({"result": true})));
    assert_eq!(second.unwrap(), Some(json!({"result": true})));
    assert!(third.unwrap());
    assert_eq!(worker.pending_count(), 0);
}

#[tokio::test]
async fn test_remove_project_then_respawn() {
    let pool = pool(ECHO_WORKER);
    let project = Path::new("/projects/one");
    let first = pool.ensure_worker(project, &prerequisite()).unwrap();

    let removed = pool.remove_project(project);
    assert_eq!(removed.len(), 1);
    assert_eq!(removed[0].id, first.id);
    assert!(first.is_killed());
    assert!(pool.is_empty());

    let second = pool.ensure_worker(project, &prerequisite()).unwrap();
    assert_ne!(first.id, second.id);
    assert_eq!(pool.stats().total_spawned, 2);

    // A late teardown of the old handle leaves the new entry alone
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(pool.workers()[0].id, second.id);
}

#[tokio::test]
async fn test_killed_worker_rejects_new_requests() {
    let pool = pool(ECHO_WORKER);
    let worker = pool.ensure_worker(Path::new("/projects/one"), &prerequisite()).unwrap();
    worker.kill();

    let error = worker
        .send_message(&lint_job("/projects/one/a.js"), pool.request_timeout())
        .await
        .unwrap_err();
    assert!(matches!(error, WorkerProcessError::WorkerUnavailable { .. }));
    assert!(error.is_retryable());
}

#[tokio::test]
async fn test_timeout_kills_worker_and_settles_siblings() {
    let pool = pool(SILENT_WORKER);
    let worker = pool.ensure_worker(Path::new("/projects/one"), &prerequisite()).unwrap();

    let (job_a, job_b) = (lint_job("/projects/one/a.js"), lint_job("/projects/one/b.js"));
    let (timed_out, sibling) = tokio::join!(
        worker.send_message(&job_a, Duration::from_millis(200)),
        worker.send_message(&job_b, Duration::from_secs(10)),
    );

    match timed_out.unwrap_err() {
        WorkerProcessError::Timeout { job_type, timeout, .. } => {
            assert_eq!(job_type, JobType::Lint);
            assert_eq!(timeout, Duration::from_millis(200));
        }
        other => panic!("expected a timeout, got {other:?}"),
    }
    assert_eq!(sibling.unwrap(), None);
    assert!(worker.is_killed());
    assert!(!worker.is_available());
    wait_until_empty(&pool).await;
}

#[tokio::test]
async fn test_unmatched_reply_settles_nothing() {
    let pool = pool(WRONG_KEY_WORKER);
    let worker = pool.ensure_worker(Path::new("/projects/one"), &prerequisite()).unwrap();

    let error = worker
        .send_message(&lint_job("/projects/one/a.js"), Duration::from_millis(300))
        .await
        .unwrap_err();
    assert!(matches!(error, WorkerProcessError::Timeout { .. }));
}

#[tokio::test]
async fn test_worker_exit_resolves_pending_with_none() {
    let pool = pool(CRASHING_WORKER);
    let worker = pool.ensure_worker(Path::new("/projects/one"), &prerequisite()).unwrap();

    let result = worker
        .send_message(&lint_job("/projects/one/a.js"), Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(result, None);

    wait_until_empty(&pool).await;
    assert!(worker.has_exited());
    assert!(!worker.is_available());
}

#[tokio::test]
async fn test_unavailable_entry_is_replaced() {
    let pool = pool(CRASHING_WORKER);
    let project = Path::new("/projects/one");
    let first = pool.ensure_worker(project, &prerequisite()).unwrap();
    first.kill();

    let second = pool.ensure_worker(project, &prerequisite()).unwrap();
    assert_ne!(first.id, second.id);
}

#[tokio::test]
async fn test_clear_cache_and_dispose_kill_everything() {
    let pool = pool(ECHO_WORKER);
    let a = pool.ensure_worker(Path::new("/projects/a"), &prerequisite()).unwrap();
    let b = pool.ensure_worker(Path::new("/projects/b"), &prerequisite()).unwrap();

    assert_eq!(pool.clear_cache(), 2);
    assert!(a.is_killed() && b.is_killed());
    assert!(pool.is_empty());

    let c = pool.ensure_worker(Path::new("/projects/c"), &prerequisite()).unwrap();
    pool.dispose_all();
    assert!(c.is_killed());
    assert!(pool.is_empty());
}

#[tokio::test]
async fn test_spawn_failure_is_reported() {
    let pool = WorkerPool::new();
    let mut missing = prerequisite();
    missing.runtime_path = PathBuf::from("/nonexistent/linthost-runtime");

    let error = pool
        .ensure_worker(Path::new("/projects/one"), &missing)
        .unwrap_err();
    assert!(matches!(error, WorkerProcessError::Spawn(_)));
    assert!(pool.is_empty());
}
