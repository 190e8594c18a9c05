//! State - キュー内タスクの状態

use serde::{Deserialize, Serialize};

/// State of a task while it sits in the queue store.
///
/// State transitions:
/// - Queued -> Running -> (settled, removed)
/// - Queued -> Running -> RetryScheduled -> Running (until retries are used up)
///
/// Settled tasks leave the store, so there is no terminal variant here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Waiting behind the head (or at the head before its first attempt).
    Queued,

    /// Executor is in flight.
    Running,

    /// Failed retryably; waiting out the backoff at the head.
    RetryScheduled,
}

impl TaskState {
    pub fn is_in_flight(self) -> bool {
        matches!(self, TaskState::Running)
    }
}
