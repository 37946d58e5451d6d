//! How `LintService` turns worker answers into outcomes and notifications
#![cfg(unix)]

use linthost_execution::{LintOutcome, LintService, WorkerPool};
use linthost_ipc::{JobContent, LintConfig, Prerequisite};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Rejects every request with the same engine failure and stack
const FAILING_WORKER: &str = r#"
while IFS= read -r line; do
  key=$(printf '%s' "$line" | sed -n 's/^{"key":"\([A-Za-z0-9]*\)".*/\1/p')
  printf '{"key":"%s","reject":{"name":"EngineError","message":"boom","stack":"at lint\\nat run\\nat main\\nat start","type":"engine"},"duration":1}\n' "$key"
done
"#;

/// Rejects every request because the project has no lint config
const UNCONFIGURED_WORKER: &str = r#"
while IFS= read -r line; do
  key=$(printf '%s' "$line" | sed -n 's/^{"key":"\([A-Za-z0-9]*\)".*/\1/p')
  printf '{"key":"%s","reject":{"name":"ConfigNotFoundError","message":"No configuration found for /projects/one/a.js","type":"config-not-found","filePath":"/projects/one/a.js"},"duration":1}\n' "$key"
done
"#;

/// Resolves every request without a result
const EMPTY_WORKER: &str = r#"
while IFS= read -r line; do
  key=$(printf '%s' "$line" | sed -n 's/^{"key":"\([A-Za-z0-9]*\)".*/\1/p')
  printf '{"key":"%s","resolve":null,"duration":1}\n' "$key"
done
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

fn service(script: &str) -> LintService {
    let pool = WorkerPool::new()
        .with_launch_args(vec!["-c".to_string(), script.to_string(), "worker".to_string()])
        .with_request_timeout(Duration::from_secs(5));
    LintService::new(Arc::new(pool), LintConfig::default())
}

fn content() -> JobContent {
    JobContent::new("/projects/one/a.js").with_text("foo;")
}

#[tokio::test]
async fn test_repeated_failures_are_reported_once() {
    let service = service(FAILING_WORKER);
    let project = Path::new("/projects/one");

    let first = service
        .lint(project, &prerequisite(), content())
        .await
        .unwrap_err();
    let second = service
        .fix(project, &prerequisite(), content())
        .await
        .unwrap_err();

    assert_eq!(first.to_string(), "EngineError: boom");
    assert_eq!(
        second.wire_error().and_then(|e| e.stack.as_deref()),
        Some("at lint\nat run\nat main\nat start")
    );
    assert_eq!(service.notifications().visible_count(), 1);
    service.pool().dispose_all();
}

#[tokio::test]
async fn test_missing_config_means_nothing_to_lint() {
    let service = service(UNCONFIGURED_WORKER);
    let outcome = service
        .lint(Path::new("/projects/one"), &prerequisite(), content())
        .await
        .unwrap();

    assert_eq!(outcome, LintOutcome::NothingToLint);
    assert!(outcome.report().is_none());
    assert_eq!(service.notifications().visible_count(), 0);
    service.pool().dispose_all();
}

#[tokio::test]
async fn test_empty_answer_is_no_result() {
    let service = service(EMPTY_WORKER);
    let outcome = service
        .lint(Path::new("/projects/one"), &prerequisite(), content())
        .await
        .unwrap();

    assert_eq!(outcome, LintOutcome::NoResult);
    assert_eq!(service.pool().len(), 1);
    service.pool().dispose_all();
}
