//! Task record: caller's executor + settle channel + bookkeeping.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::oneshot;

use crate::domain::{SubmitError, TaskState, TicketId, TxHash};
use crate::ports::TxExecutor;

pub(crate) type Settle = oneshot::Sender<Result<TxHash, SubmitError>>;

/// One submitted task while it lives in the queue store.
///
/// Design:
/// - `settle` is an `Option` so it can be taken exactly once.
/// - `executor` is shared (`Arc`) so the loop can run it without holding the store lock.
pub struct TaskRecord {
    pub ticket: TicketId,
    pub label: String,
    pub(crate) executor: Arc<dyn TxExecutor>,
    settle: Option<Settle>,

    pub state: TaskState,

    /// Tries made so far.
    pub attempt: u32,

    /// Retry ceiling captured at submission.
    pub max_retries: u32,

    /// Message of the most recent failed try.
    pub last_error: Option<String>,

    pub enqueued_at: DateTime<Utc>,
}

impl TaskRecord {
    pub(crate) fn new(
        label: String,
        executor: Arc<dyn TxExecutor>,
        settle: Settle,
        max_retries: u32,
    ) -> Self {
        Self {
            ticket: TicketId::generate(),
            label,
            executor,
            settle: Some(settle),
            state: TaskState::Queued,
            attempt: 0,
            max_retries,
            last_error: None,
            enqueued_at: Utc::now(),
        }
    }

    /// Mark as running (increment attempt).
    pub fn start_attempt(&mut self) -> u32 {
        self.state = TaskState::Running;
        self.attempt += 1;
        self.attempt
    }

    /// Record a retryable failure; the record stays at the head.
    pub fn schedule_retry(&mut self, error: String) {
        self.state = TaskState::RetryScheduled;
        self.last_error = Some(error);
    }

    /// Deliver the final result. Returns `false` if it was already settled
    /// or the caller dropped its handle.
    pub(crate) fn settle(&mut self, result: Result<TxHash, SubmitError>) -> bool {
        match self.settle.take() {
            Some(tx) => tx.send(result).is_ok(),
            None => false,
        }
    }

    pub fn is_settled(&self) -> bool {
        self.settle.is_none()
    }
}

impl fmt::Debug for TaskRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRecord")
            .field("ticket", &self.ticket)
            .field("label", &self.label)
            .field("state", &self.state)
            .field("attempt", &self.attempt)
            .field("max_retries", &self.max_retries)
            .field("last_error", &self.last_error)
            .field("settled", &self.is_settled())
            .finish()
    }
}
