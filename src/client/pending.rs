//! Outstanding requests awaiting a reply, keyed by correlation id.

use std::{
    collections::HashMap,
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, Instant},
};

use serde_json::Value;
use tokio::sync::{oneshot, Mutex};

use crate::error::BridgeError;

pub type Outcome = Result<Value, BridgeError>;

/// Receives the settlement of one request.
pub type ReplyReceiver = oneshot::Receiver<Outcome>;

struct PendingReply {
    operation: &'static str,
    created_at: Instant,
    settle: oneshot::Sender<Outcome>,
}

/// Registry of pending replies.
///
/// Ids are `<prefix>-<n>` with `n` drawn from a per-registry counter, so
/// they never repeat for the lifetime of the client.
pub struct PendingReplies {
    entries: Mutex<HashMap<String, PendingReply>>,
    next_id: AtomicU64,
}

impl PendingReplies {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    fn next_reference(&self, prefix: &str) -> String {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed);
        format!("{prefix}-{n}")
    }

    /// Register a new pending entry and return its id with the receiving end.
    pub async fn register(&self, prefix: &str, operation: &'static str) -> (String, ReplyReceiver) {
        let reference = self.next_reference(prefix);
        let (settle, rx) = oneshot::channel();
        self.entries.lock().await.insert(
            reference.clone(),
            PendingReply {
                operation,
                created_at: Instant::now(),
                settle,
            },
        );
        (reference, rx)
    }

    /// Settle the entry for `reference`. Returns `false` when nothing matched.
    pub async fn settle(&self, reference: &str, outcome: Outcome) -> bool {
        let Some(entry) = self.entries.lock().await.remove(reference) else {
            return false;
        };
        if entry.settle.send(outcome).is_err() {
            tracing::debug!("Caller for {reference} ({}) went away", entry.operation);
        }
        true
    }

    /// Drop the entry without settling it.
    pub async fn remove(&self, reference: &str) -> bool {
        self.entries.lock().await.remove(reference).is_some()
    }

    /// Reject every entry older than `max_age` with [`BridgeError::TimedOut`].
    pub async fn sweep_expired(&self, max_age: Duration) -> usize {
        let expired: Vec<(String, PendingReply)> = {
            let mut entries = self.entries.lock().await;
            let stale: Vec<String> = entries
                .iter()
                .filter(|(_, entry)| entry.created_at.elapsed() >= max_age)
                .map(|(reference, _)| reference.clone())
                .collect();
            stale
                .into_iter()
                .filter_map(|reference| entries.remove(&reference).map(|e| (reference, e)))
                .collect()
        };

        let count = expired.len();
        for (reference, entry) in expired {
            tracing::warn!("Request {reference} ({}) timed out", entry.operation);
            let _ = entry.settle.send(Err(BridgeError::TimedOut {
                reference,
                operation: entry.operation,
            }));
        }
        count
    }

    /// Reject every entry with `error`.
    pub async fn fail_all(&self, error: &BridgeError) -> usize {
        let drained: Vec<PendingReply> = {
            let mut entries = self.entries.lock().await;
            entries.drain().map(|(_, entry)| entry).collect()
        };
        let count = drained.len();
        for entry in drained {
            let _ = entry.settle.send(Err(error.clone()));
        }
        count
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

impl Default for PendingReplies {
    fn default() -> Self {
        Self::new()
    }
}
