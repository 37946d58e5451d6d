//! The single writer behind the worker's stdout
//!
//! Replies and log frames come from many tasks. They all go through one
//! channel so every frame lands on its own line, whole.

use linthost_ipc::{IpcError, LineWriter};
use serde::Serialize;
use tokio::io::AsyncWrite;
use tokio::sync::{mpsc, oneshot};

#[derive(Debug, Clone)]
pub struct FrameSink {
    tx: mpsc::UnboundedSender<String>,
}

impl FrameSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queue a frame; `false` once the writer is gone
    pub fn send<T: Serialize>(&self, frame: &T) -> bool {
        match serde_json::to_string(frame) {
            Ok(line) => self.tx.send(line).is_ok(),
            Err(_) => false,
        }
    }
}

/// Write queued frames until every sink is dropped or `shutdown` fires.
///
/// Frames already queued at shutdown are still written.
pub async fn write_frames<W: AsyncWrite + Unpin>(
    mut rx: mpsc::UnboundedReceiver<String>,
    output: W,
    mut shutdown: oneshot::Receiver<()>,
) -> Result<(), IpcError> {
    let mut writer = LineWriter::new(output);
    loop {
        tokio::select! {
            biased;
            line = rx.recv() => match line {
                Some(line) => writer.write_line(&line).await?,
                None => break,
            },
            _ = &mut shutdown => {
                while let Ok(line) = rx.try_recv() {
                    writer.write_line(&line).await?;
                }
                break;
            }
        }
    }
    Ok(())
}
