//! Shared worker status.
//!
//! The poll loop writes through a [`StatusHandle`]; the status server reads
//! [`WorkerStatus`] snapshots from a clone of the same handle.

use crate::error::Error;
use crate::fetcher::FetchOutcome;
use crate::mailbox::MessageRef;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;

/// Detail recorded when a message has no decodable body.
pub const NO_BODY: &str = "no-body";

/// Detail recorded when a body has no confirmation link.
pub const NO_LINK: &str = "no-link";

/// Outcome of handling one message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessingResult {
    /// The message handled.
    pub uid: MessageRef,
    /// Whether the confirmation request got a response.
    #[serde(rename = "ok")]
    pub succeeded: bool,
    /// Failure reason, or HTTP status and final URL.
    #[serde(rename = "info")]
    pub detail: String,
    /// When handling finished.
    #[serde(rename = "ts")]
    pub finished_at: DateTime<Utc>,
}

impl ProcessingResult {
    /// A message that was marked processed without a fetch.
    #[must_use]
    pub fn skipped(uid: MessageRef, reason: &str) -> Self {
        Self {
            uid,
            succeeded: false,
            detail: reason.to_string(),
            finished_at: Utc::now(),
        }
    }

    /// A message that could not be handled, e.g. because its fetch failed.
    #[must_use]
    pub fn errored(uid: MessageRef, error: &Error) -> Self {
        Self {
            uid,
            succeeded: false,
            detail: error.to_string(),
            finished_at: Utc::now(),
        }
    }

    /// A message whose confirmation link was requested.
    #[must_use]
    pub fn fetched(uid: MessageRef, outcome: &FetchOutcome) -> Self {
        Self {
            uid,
            succeeded: outcome.success,
            detail: outcome.to_string(),
            finished_at: Utc::now(),
        }
    }
}

/// Phase of the poll loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    /// Not started yet.
    #[default]
    Disconnected,
    /// Opening the first session.
    Connecting,
    /// Session open, scanning on the poll interval.
    Polling,
    /// Listing failed; waiting for or attempting a new session.
    Reconnecting,
    /// Terminated by a stop request or a failed first connect.
    Stopped,
}

/// Point-in-time copy of the worker status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorkerStatus {
    /// Whether the poll loop is running.
    pub running: bool,
    /// Loop phase.
    pub state: WorkerState,
    /// Messages handled since the process started.
    pub processed_count: u64,
    /// Most recent processing result.
    pub last_result: Option<ProcessingResult>,
}

/// Cloneable handle to the single worker status.
#[derive(Debug, Clone, Default)]
pub struct StatusHandle {
    inner: Arc<Mutex<WorkerStatus>>,
}

impl StatusHandle {
    /// Creates a handle in the not-running state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the current status.
    #[must_use]
    pub fn snapshot(&self) -> WorkerStatus {
        self.inner.lock().clone()
    }

    /// Returns whether the loop is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner.lock().running
    }

    /// Returns how many messages the loop has handled.
    #[must_use]
    pub fn processed_count(&self) -> u64 {
        self.inner.lock().processed_count
    }

    /// Marks the loop started and entering `state`.
    pub fn start(&self, state: WorkerState) {
        let mut status = self.inner.lock();
        status.running = true;
        status.state = state;
    }

    /// Records a phase change while running.
    pub fn set_state(&self, state: WorkerState) {
        self.inner.lock().state = state;
    }

    /// Marks the loop terminated.
    pub fn stop(&self) {
        let mut status = self.inner.lock();
        status.running = false;
        status.state = WorkerState::Stopped;
    }

    /// Counts a handled message and keeps its result as the latest.
    pub fn record(&self, result: ProcessingResult) {
        let mut status = self.inner.lock();
        status.processed_count += 1;
        status.last_result = Some(result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_increments_and_keeps_latest() {
        let status = StatusHandle::new();
        let reader = status.clone();

        status.record(ProcessingResult::skipped(MessageRef::new(1), NO_BODY));
        status.record(ProcessingResult::fetched(
            MessageRef::new(2),
            &FetchOutcome::completed(200, "https://c.test/ok"),
        ));

        let snapshot = reader.snapshot();
        assert_eq!(snapshot.processed_count, 2);
        let last = snapshot.last_result.unwrap();
        assert_eq!(last.uid, MessageRef::new(2));
        assert!(last.succeeded);
        assert_eq!(last.detail, "status=200,final=https://c.test/ok");
    }

    #[test]
    fn test_errored_result_carries_error_text() {
        let error = Error::FetchTimeout {
            uid: 4,
            timeout: std::time::Duration::from_secs(30),
        };
        let result = ProcessingResult::errored(MessageRef::new(4), &error);

        assert!(!result.succeeded);
        assert_eq!(result.detail, error.to_string());
    }

    #[test]
    fn test_lifecycle() {
        let status = StatusHandle::new();
        assert!(!status.is_running());
        assert_eq!(status.snapshot().state, WorkerState::Disconnected);

        status.start(WorkerState::Connecting);
        assert!(status.is_running());
        status.set_state(WorkerState::Polling);
        assert_eq!(status.snapshot().state, WorkerState::Polling);

        status.stop();
        let snapshot = status.snapshot();
        assert!(!snapshot.running);
        assert_eq!(snapshot.state, WorkerState::Stopped);
    }

    #[test]
    fn test_status_json_shape() {
        let status = StatusHandle::new();
        status.start(WorkerState::Polling);
        status.record(ProcessingResult::skipped(MessageRef::new(9), NO_LINK));

        let json = serde_json::to_value(status.snapshot()).unwrap();
        assert_eq!(json["running"], true);
        assert_eq!(json["state"], "polling");
        assert_eq!(json["processed_count"], 1);
        assert_eq!(json["last_result"]["uid"], 9);
        assert_eq!(json["last_result"]["ok"], false);
        assert_eq!(json["last_result"]["info"], "no-link");
        assert!(json["last_result"]["ts"].is_string());
    }
}
