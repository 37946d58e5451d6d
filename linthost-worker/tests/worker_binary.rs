//! Drives the worker binary over its stdio

use linthost_ipc::{
    DebugReport, JobErrorKind, JobReply, LintReport, Severity, WireError, WorkerFrame,
};
use serde_json::{json, Value as JsonValue};
use std::fs;
use std::path::Path;
use std::process::Stdio;
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

const CONFIG: &str = r#"{"rules":{"no-undef":"error","semi":["error","never"]}}"#;

struct Transcript {
    replies: Vec<JobReply>,
    logs: usize,
    errors: Vec<WireError>,
}

impl Transcript {
    fn reply(&self, key: &str) -> &JobReply {
        self.replies
            .iter()
            .find(|reply| reply.key == key)
            .unwrap_or_else(|| panic!("no reply for {key}"))
    }
}

/// Send `lines`, close stdin and collect everything the worker wrote
async fn run_worker(lines: &[JsonValue], extra: &[&str]) -> Transcript {
    let mut child = Command::new(env!("CARGO_BIN_EXE_linthost-worker"))
        .args(extra)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();

    let mut stdin = child.stdin.take().unwrap();
    for line in lines {
        let text = match line {
            JsonValue::String(raw) => raw.clone(),
            other => other.to_string(),
        };
        stdin.write_all(format!("{text}\n").as_bytes()).await.unwrap();
    }
    drop(stdin);

    let output = child.wait_with_output().await.unwrap();
    assert!(output.status.success(), "worker exited with {}", output.status);

    let mut replies = Vec::new();
    let mut logs = 0;
    for line in String::from_utf8(output.stdout).unwrap().lines() {
        match serde_json::from_str::<WorkerFrame>(line).unwrap() {
            WorkerFrame::Log(_) => logs += 1,
            WorkerFrame::Reply(reply) => replies.push(reply),
        }
    }
    let errors = String::from_utf8(output.stderr)
        .unwrap()
        .lines()
        .filter_map(|line| serde_json::from_str::<WireError>(line).ok())
        .collect();

    Transcript {
        replies,
        logs,
        errors,
    }
}

fn project(config: &str) -> TempDir {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("lint.config.json"), config).unwrap();
    temp
}

fn lint_job(key: &str, job_type: &str, file: &Path, text: Option<&str>, project: &Path) -> JsonValue {
    let mut content = json!({
        "filePath": file,
        "isModified": false,
        "projectPath": project,
    });
    if let Some(text) = text {
        content["fileText"] = json!(text);
    }
    json!({ "key": key, "type": job_type, "content": content, "config": {} })
}

#[tokio::test]
async fn test_lint_reports_diagnostics() {
    let temp = project(CONFIG);
    let file = temp.path().join("a.js");
    let transcript = run_worker(
        &[lint_job("k1", "lint", &file, Some("foo;"), temp.path())],
        &[],
    )
    .await;

    let reply = transcript.reply("k1").clone();
    let report: LintReport =
        serde_json::from_value(reply.into_outcome().unwrap().unwrap()).unwrap();
    assert_eq!(report.results.len(), 2);

    let undefined = &report.results[0];
    assert_eq!(undefined.severity, Severity::Error);
    assert_eq!(undefined.location.file, file);
    assert_eq!(undefined.location.position, [[0, 0], [0, 3]]);
    assert_eq!(undefined.excerpt, "'foo' is not defined. (no-undef)");
    assert_eq!(
        undefined.url.as_deref(),
        Some("https://eslint.org/docs/latest/rules/no-undef")
    );

    let semi = &report.results[1];
    assert_eq!(semi.location.position, [[0, 3], [0, 4]]);
    assert_eq!(semi.excerpt, "Extra semicolon. (semi)");
    let fix = semi.fix.as_ref().unwrap();
    assert_eq!(fix.range, [3, 4]);
    assert_eq!(fix.text, "");

    assert!(report.rules.contains_key("no-undef"));
    assert!(report.rules.contains_key("semi"));
    assert!(report.fix_count.is_none());
    assert!(transcript.logs > 0);
}

#[tokio::test]
async fn test_fix_writes_file_and_counts() {
    let temp = project(CONFIG);
    let file = temp.path().join("a.js");
    fs::write(&file, "foo;").unwrap();

    let transcript = run_worker(&[lint_job("f1", "fix", &file, None, temp.path())], &[]).await;
    let reply = transcript.reply("f1").clone();
    let report: LintReport =
        serde_json::from_value(reply.into_outcome().unwrap().unwrap()).unwrap();

    assert_eq!(fs::read_to_string(&file).unwrap(), "foo");
    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].excerpt, "'foo' is not defined. (no-undef)");
    assert_eq!(report.fix_count, Some(1));
    assert_eq!(report.fix_applied, Some(true));
}

#[tokio::test]
async fn test_malformed_messages() {
    let transcript = run_worker(
        &[
            json!("this is not json"),
            json!({"type": "lint"}),
            json!({"key": "t1"}),
            json!({"key": "t2", "type": "format"}),
        ],
        &[],
    )
    .await;

    assert_eq!(transcript.replies.len(), 2);
    assert_eq!(transcript.errors.len(), 2);
    assert!(transcript
        .errors
        .iter()
        .all(|error| error.kind == JobErrorKind::NoJobKey));

    let missing = transcript.reply("t1").clone().into_outcome().unwrap_err();
    assert_eq!(missing.kind, JobErrorKind::NoJobType);

    let unknown = transcript.reply("t2").clone().into_outcome().unwrap_err();
    assert_eq!(unknown.message, "Could not find job of type: format");
}

#[tokio::test]
async fn test_clear_cache_resolves_true() {
    let transcript = run_worker(&[json!({"key": "c1", "type": "clear-cache"})], &[]).await;
    let value = transcript.reply("c1").clone().into_outcome().unwrap();
    assert_eq!(value, Some(json!({"result": true})));
}

#[tokio::test]
async fn test_old_engine_rejected_but_debuggable() {
    let temp = project(CONFIG);
    let package = temp.path().join("node_modules/linthost-engine");
    fs::create_dir_all(&package).unwrap();
    fs::write(
        package.join("package.json"),
        r#"{"name":"linthost-engine","version":"7.32.0"}"#,
    )
    .unwrap();
    let file = temp.path().join("a.js");

    let transcript = run_worker(
        &[
            lint_job("old", "lint", &file, Some("foo;"), temp.path()),
            lint_job("dbg", "debug", &file, None, temp.path()),
        ],
        &["--dispatcher", "v8-flat"],
    )
    .await;

    let error = transcript.reply("old").clone().into_outcome().unwrap_err();
    assert_eq!(
        error.kind,
        JobErrorKind::IncompatibleVersion {
            version: "7.32.0".to_string(),
            minimum_version: "8.0.0".to_string(),
        }
    );

    let value = transcript.reply("dbg").clone().into_outcome().unwrap().unwrap();
    let debug: DebugReport = serde_json::from_value(value).unwrap();
    assert_eq!(debug.engine_version, "7.32.0");
    assert!(debug.is_incompatible);
    assert!(!debug.is_built_in);
    assert_eq!(debug.engine_path, package);
    assert_eq!(debug.engine_cwd, temp.path());
    assert_eq!(debug.dispatcher, "v8-flat");
}

#[tokio::test]
async fn test_missing_config_is_reported() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("a.js");
    let transcript = run_worker(
        &[lint_job("n1", "lint", &file, Some("foo;"), temp.path())],
        &[],
    )
    .await;

    let error = transcript.reply("n1").clone().into_outcome().unwrap_err();
    assert!(error.is_config_not_found());
    assert_eq!(
        error.kind,
        JobErrorKind::ConfigNotFound {
            file_path: file,
            project_path: Some(temp.path().to_path_buf()),
        }
    );
}
