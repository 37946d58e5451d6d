//! Reads job lines, runs them concurrently and replies by key

use linthost_ipc::{IpcError, Job, JobReply, JobType, LineReader, LineWriter, WireError};
use serde_json::Value as JsonValue;
use std::any::Any;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncBufRead, AsyncWrite};
use tokio::task::{JoinError, JoinSet};
use tracing::{trace, warn};

use crate::frames::FrameSink;
use crate::handlers::{project_path, Handlers};

/// Split a raw line into its correlation key and body.
///
/// Without a key there is nobody to reply to, so the error goes to the
/// worker's error channel instead.
pub fn parse_line(line: &str) -> Result<(String, JsonValue), WireError> {
    let value: JsonValue = serde_json::from_str(line).map_err(|_| WireError::no_job_key())?;
    match value.get("key") {
        Some(JsonValue::String(key)) => Ok((key.clone(), value)),
        _ => Err(WireError::no_job_key()),
    }
}

/// Run one keyed message to completion; always produces a reply
pub async fn dispatch(handlers: Arc<Handlers>, key: String, message: JsonValue) -> JobReply {
    let started = Instant::now();
    let outcome = run(handlers, message).await;
    let duration = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    match outcome {
        Ok(value) => JobReply::resolved(key, value, duration),
        Err(error) => {
            trace!("Job {} failed: {}", key, error);
            JobReply::rejected(key, error, duration)
        }
    }
}

async fn run(handlers: Arc<Handlers>, message: JsonValue) -> Result<JsonValue, WireError> {
    let job_type = match message.get("type") {
        Some(JsonValue::String(job_type)) => job_type.clone(),
        _ => return Err(WireError::no_job_type()),
    };
    if job_type.parse::<JobType>().is_err() {
        return Err(WireError::no_job_found(job_type));
    }

    let job: Job = serde_json::from_value(message)
        .map_err(|e| WireError::unknown(format!("Invalid {job_type} job: {e}")))?;
    let file_path = job.file_path().cloned();
    let project = job
        .content
        .as_ref()
        .map(|content| project_path(&job, content));

    // A panicking handler fails its own job, not the worker
    let task = tokio::spawn(async move { handlers.handle(&job).await });
    match task.await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(error)) => Err(error.into_wire(file_path.as_deref(), project.as_deref())),
        Err(error) => Err(WireError::unknown(join_error_message(error))),
    }
}

fn join_error_message(error: JoinError) -> String {
    if error.is_cancelled() {
        return "Job was cancelled".to_string();
    }
    panic_message(error.into_panic())
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "Job panicked".to_string()
    }
}

pub struct JobDispatcher {
    handlers: Arc<Handlers>,
    frames: FrameSink,
}

impl JobDispatcher {
    pub fn new(handlers: Arc<Handlers>, frames: FrameSink) -> Self {
        Self { handlers, frames }
    }

    /// Serve jobs from `input` until it closes.
    ///
    /// Each line runs as its own task and replies in completion order. Jobs
    /// still running at end of input are awaited before returning.
    pub async fn serve<R, E>(&self, input: R, errors: E) -> Result<(), IpcError>
    where
        R: AsyncBufRead + Unpin,
        E: AsyncWrite + Unpin,
    {
        let mut reader = LineReader::new(input);
        let mut errors = LineWriter::new(errors);
        let mut jobs = JoinSet::new();

        while let Some(line) = reader.read_line().await? {
            match parse_line(&line) {
                Ok((key, message)) => {
                    let handlers = Arc::clone(&self.handlers);
                    let frames = self.frames.clone();
                    jobs.spawn(async move {
                        let reply = dispatch(handlers, key, message).await;
                        if !frames.send(&reply) {
                            warn!("Dropped reply {}: output closed", reply.key);
                        }
                    });
                }
                Err(error) => {
                    warn!("Discarding message without a job key");
                    errors.write_frame(&error).await?;
                }
            }

            while jobs.try_join_next().is_some() {}
        }

        while jobs.join_next().await.is_some() {}
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linthost_engine::BuiltinEngineFactory;
    use linthost_ipc::{DispatcherVariant, JobErrorKind};
    use serde_json::json;

    fn handlers() -> Arc<Handlers> {
        Arc::new(Handlers::new(
            Arc::new(BuiltinEngineFactory),
            DispatcherVariant::Modern,
        ))
    }

    #[test]
    fn test_lines_without_key() {
        assert_eq!(parse_line("not json").unwrap_err().kind, JobErrorKind::NoJobKey);
        assert_eq!(
            parse_line(r#"{"type":"lint"}"#).unwrap_err().kind,
            JobErrorKind::NoJobKey
        );
        assert_eq!(
            parse_line(r#"{"key":7,"type":"lint"}"#).unwrap_err().kind,
            JobErrorKind::NoJobKey
        );
        let (key, _) = parse_line(r#"{"key":"abc","type":"lint"}"#).unwrap();
        assert_eq!(key, "abc");
    }

    #[tokio::test]
    async fn test_missing_and_unknown_types() {
        let reply = dispatch(handlers(), "k1".to_string(), json!({"key": "k1"})).await;
        assert_eq!(reply.key, "k1");
        let error = reply.into_outcome().unwrap_err();
        assert_eq!(error.kind, JobErrorKind::NoJobType);
        assert_eq!(error.message, "Message had no job type");

        let reply = dispatch(
            handlers(),
            "k2".to_string(),
            json!({"key": "k2", "type": "format"}),
        )
        .await;
        let error = reply.into_outcome().unwrap_err();
        assert_eq!(
            error.kind,
            JobErrorKind::NoJobFound {
                job_type: "format".to_string()
            }
        );
        assert_eq!(error.message, "Could not find job of type: format");
    }

    #[tokio::test]
    async fn test_clear_cache_resolves() {
        let reply = dispatch(
            handlers(),
            "k3".to_string(),
            json!({"key": "k3", "type": "clear-cache"}),
        )
        .await;
        assert_eq!(reply.into_outcome().unwrap(), Some(json!({"result": true})));
    }

    #[tokio::test]
    async fn test_lint_without_content_is_rejected() {
        let reply = dispatch(
            handlers(),
            "k4".to_string(),
            json!({"key": "k4", "type": "lint"}),
        )
        .await;
        let error = reply.into_outcome().unwrap_err();
        assert_eq!(error.kind, JobErrorKind::Unknown);
        assert_eq!(error.message, "Invalid lint job: no content");
    }

    #[test]
    fn test_panic_messages() {
        assert_eq!(panic_message(Box::new("boom")), "boom");
        assert_eq!(panic_message(Box::new("boom".to_string())), "boom");
        assert_eq!(panic_message(Box::new(7)), "Job panicked");
    }

    #[tokio::test]
    async fn test_serve_replies_and_reports_unkeyed_lines() {
        let (frames, mut rx) = FrameSink::channel();
        let dispatcher = JobDispatcher::new(handlers(), frames);
        let input = b"garbage\n{\"key\":\"a\",\"type\":\"clear-cache\"}\n\n{\"key\":\"b\"}\n";
        let mut errors = Vec::new();

        dispatcher.serve(&input[..], &mut errors).await.unwrap();

        let mut replies = Vec::new();
        while let Ok(line) = rx.try_recv() {
            if let Ok(reply) = serde_json::from_str::<JobReply>(&line) {
                replies.push(reply);
            }
        }
        replies.sort_by(|a, b| a.key.cmp(&b.key));
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0].resolve, Some(json!({"result": true})));
        assert_eq!(
            replies[1].reject.as_ref().map(|e| e.kind.clone()),
            Some(JobErrorKind::NoJobType)
        );

        let errors = String::from_utf8(errors).unwrap();
        let error: WireError = serde_json::from_str(errors.trim()).unwrap();
        assert_eq!(error.name, "JobKeyError");
    }
}
