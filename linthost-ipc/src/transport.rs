//! Newline-delimited JSON transport
//!
//! Every frame is one JSON document on one line. Both the orchestrator and
//! the worker read and write through these two types, over child pipes on
//! one side and stdio on the other.

use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::IpcError;

/// Reads one line at a time, stripped of its terminator
pub struct LineReader<R> {
    inner: R,
    buf: String,
}

impl<R: AsyncBufRead + Unpin> LineReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: String::new(),
        }
    }

    /// Next non-empty line, or `None` once the peer closes its end
    pub async fn read_line(&mut self) -> Result<Option<String>, IpcError> {
        loop {
            self.buf.clear();
            let read = self.inner.read_line(&mut self.buf).await?;
            if read == 0 {
                return Ok(None);
            }

            let line = self.buf.trim_end_matches(['\r', '\n']);
            if !line.trim().is_empty() {
                return Ok(Some(line.to_string()));
            }
        }
    }
}

/// Writes one frame per line and flushes after each
pub struct LineWriter<W> {
    inner: W,
}

impl<W: AsyncWrite + Unpin> LineWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub async fn write_frame<T: Serialize>(&mut self, frame: &T) -> Result<(), IpcError> {
        let json = serde_json::to_string(frame)
            .map_err(|e| IpcError::SerializationError(e.to_string()))?;
        self.write_line(&json).await
    }

    /// Write an already-encoded frame
    pub async fn write_line(&mut self, line: &str) -> Result<(), IpcError> {
        if line.contains('\n') {
            return Err(IpcError::InvalidMessage(
                "frame spans more than one line".to_string(),
            ));
        }

        let message_with_newline = format!("{}\n", line);
        self.inner.write_all(message_with_newline.as_bytes()).await?;
        self.inner.flush().await?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Job, WorkerRequest};
    use tokio::io::BufReader;

    #[tokio::test]
    async fn test_frames_cross_a_pipe_one_per_line() {
        let (client, server) = tokio::io::duplex(1024);
        let mut writer = LineWriter::new(client);
        let mut reader = LineReader::new(BufReader::new(server));

        let job = Job::clear_cache();
        writer
            .write_frame(&WorkerRequest { key: "a1", job: &job })
            .await
            .unwrap();
        writer.write_line(r#"{"log":["info","ready"]}"#).await.unwrap();
        drop(writer);

        let first = reader.read_line().await.unwrap().unwrap();
        assert_eq!(first, r#"{"key":"a1","type":"clear-cache"}"#);
        let second = reader.read_line().await.unwrap().unwrap();
        assert_eq!(second, r#"{"log":["info","ready"]}"#);
        assert_eq!(reader.read_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_blank_lines_are_skipped() {
        let input: &[u8] = b"\n  \r\n{\"key\":\"x\"}\r\n";
        let mut reader = LineReader::new(BufReader::new(input));
        assert_eq!(
            reader.read_line().await.unwrap().as_deref(),
            Some(r#"{"key":"x"}"#)
        );
        assert_eq!(reader.read_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_multiline_frames_are_refused() {
        let mut writer = LineWriter::new(Vec::new());
        let error = writer.write_line("{\n}").await.unwrap_err();
        assert!(error.is_fatal());
        assert!(writer.into_inner().is_empty());
    }
}
