//! Requests sent to a worker and still waiting for a reply

use linthost_ipc::JobType;
use parking_lot::Mutex;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Instant;
use tokio::sync::oneshot;

use crate::error::{WorkerProcessError, WorkerResult};

/// What a waiting caller eventually receives
pub type Settlement = WorkerResult<Option<JsonValue>>;

#[derive(Debug)]
pub struct PendingRequest {
    pub job_type: JobType,
    pub file_path: Option<PathBuf>,
    pub started: Instant,
    pub tx: oneshot::Sender<Settlement>,
}

impl PendingRequest {
    pub fn new(
        job_type: JobType,
        file_path: Option<PathBuf>,
        tx: oneshot::Sender<Settlement>,
    ) -> Self {
        Self {
            job_type,
            file_path,
            started: Instant::now(),
            tx,
        }
    }

    /// Deliver the outcome; a caller that stopped waiting is not an error
    pub fn settle(self, settlement: Settlement) {
        let _ = self.tx.send(settlement);
    }
}

/// Correlation key -> waiting request, for one worker
#[derive(Debug, Default)]
pub struct PendingTable {
    entries: Mutex<HashMap<String, PendingRequest>>,
}

impl PendingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a request under `key`; a key that is still pending is never replaced
    pub fn register(&self, key: &str, request: PendingRequest) -> WorkerResult<()> {
        let mut entries = self.entries.lock();
        if entries.contains_key(key) {
            return Err(WorkerProcessError::DuplicateKey(key.to_string()));
        }
        entries.insert(key.to_string(), request);
        Ok(())
    }

    /// Remove and return the request for `key`
    pub fn take(&self, key: &str) -> Option<PendingRequest> {
        self.entries.lock().remove(key)
    }

    /// Forget `key` without settling it
    pub fn remove(&self, key: &str) -> bool {
        self.entries.lock().remove(key).is_some()
    }

    /// Empty the table, returning everything that was waiting
    pub fn drain(&self) -> Vec<(String, PendingRequest)> {
        self.entries.lock().drain().collect()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Removes a request from its table when the caller stops waiting
pub(crate) struct PendingGuard<'a> {
    table: &'a PendingTable,
    key: &'a str,
    armed: bool,
}

impl<'a> PendingGuard<'a> {
    pub(crate) fn new(table: &'a PendingTable, key: &'a str) -> Self {
        Self {
            table,
            key,
            armed: true,
        }
    }

    /// The entry was settled through the table; nothing left to clean up
    pub(crate) fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.table.remove(self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request() -> (PendingRequest, oneshot::Receiver<Settlement>) {
        let (tx, rx) = oneshot::channel();
        (PendingRequest::new(JobType::Lint, None, tx), rx)
    }

    #[test]
    fn test_live_keys_are_not_overwritten() {
        let table = PendingTable::new();
        let (first, mut first_rx) = request();
        let (second, _) = request();

        table.register("k1", first).unwrap();
        let error = table.register("k1", second).unwrap_err();
        assert!(matches!(error, WorkerProcessError::DuplicateKey(key) if key == "k1"));

        table.take("k1").unwrap().settle(Ok(Some(json!(1))));
        assert_eq!(first_rx.try_recv().unwrap().unwrap(), Some(json!(1)));
        assert!(table.is_empty());
    }

    #[test]
    fn test_drain_empties_the_table() {
        let table = PendingTable::new();
        let (a, _) = request();
        let (b, _) = request();
        table.register("a", a).unwrap();
        table.register("b", b).unwrap();

        let mut drained: Vec<_> = table.drain().into_iter().map(|(key, _)| key).collect();
        drained.sort();
        assert_eq!(drained, ["a", "b"]);
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn test_guard_removes_unsettled_entry() {
        let table = PendingTable::new();
        let (a, _) = request();
        table.register("a", a).unwrap();
        {
            let _guard = PendingGuard::new(&table, "a");
        }
        assert!(!table.contains("a"));

        let (b, _) = request();
        table.register("b", b).unwrap();
        {
            let mut guard = PendingGuard::new(&table, "b");
            guard.disarm();
        }
        assert!(table.contains("b"));
    }

    #[test]
    fn test_settling_after_caller_left_is_silent() {
        let (pending, rx) = request();
        drop(rx);
        pending.settle(Ok(None));
    }
}
