//! Keeps one user-facing notification per distinct error

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// How long a non-dismissable notification counts as visible
pub const NOTIFICATION_EXPIRY: Duration = Duration::from_secs(5);

/// Stack lines that make up an error's signature
const SIGNATURE_LINES: usize = 3;

/// Suppresses an error notification while an identical one is still visible.
///
/// Errors are identified by the first lines of their stack, or their message
/// when there is no stack. Dismissable notifications stay visible until
/// [`dismiss`](Self::dismiss) is called; the rest expire on their own.
#[derive(Debug)]
pub struct ErrorDeduplicator {
    visible: Mutex<HashMap<String, Option<Instant>>>,
    expiry: Duration,
}

impl Default for ErrorDeduplicator {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorDeduplicator {
    pub fn new() -> Self {
        Self::with_expiry(NOTIFICATION_EXPIRY)
    }

    pub fn with_expiry(expiry: Duration) -> Self {
        Self {
            visible: Mutex::new(HashMap::new()),
            expiry,
        }
    }

    pub fn signature(message: &str, stack: Option<&str>) -> String {
        match stack.filter(|stack| !stack.trim().is_empty()) {
            Some(stack) => stack
                .lines()
                .take(SIGNATURE_LINES)
                .collect::<Vec<_>>()
                .join("\n"),
            None => message.to_string(),
        }
    }

    /// Record an error; `true` if it should be shown to the user
    pub fn report(&self, message: &str, stack: Option<&str>, dismissable: bool) -> bool {
        let signature = Self::signature(message, stack);
        let now = Instant::now();
        let mut visible = self.visible.lock();

        let still_visible = match visible.get(&signature) {
            Some(None) => true,
            Some(Some(expires)) => *expires > now,
            None => false,
        };
        if still_visible {
            return false;
        }

        let expires = (!dismissable).then(|| now + self.expiry);
        visible.insert(signature, expires);
        visible.retain(|_, expires| expires.is_none_or(|at| at > now));
        true
    }

    /// The user closed the notification with this signature
    pub fn dismiss(&self, signature: &str) {
        self.visible.lock().remove(signature);
    }

    pub fn visible_count(&self) -> usize {
        let now = Instant::now();
        self.visible
            .lock()
            .values()
            .filter(|expires| expires.is_none_or(|at| at > now))
            .count()
    }
}
