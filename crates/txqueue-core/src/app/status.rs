//! Status - キューの point-in-time スナップショット

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{TaskState, TicketId};
use crate::queue::TaskRecord;

/// Lifetime counters of a queue instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueCounts {
    pub succeeded: u64,
    pub failed: u64,
    pub cancelled: u64,
    /// Retries scheduled (not tasks retried).
    pub retries: u64,
}

/// One pending task as seen from outside.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingTask {
    pub label: String,
    pub ticket: TicketId,
    pub attempt: u32,
    pub max_retries: u32,
    pub state: TaskState,
    pub enqueued_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl From<&TaskRecord> for PendingTask {
    fn from(record: &TaskRecord) -> Self {
        Self {
            label: record.label.clone(),
            ticket: record.ticket,
            attempt: record.attempt,
            max_retries: record.max_retries,
            state: record.state,
            enqueued_at: record.enqueued_at,
            last_error: record.last_error.clone(),
        }
    }
}

/// Snapshot returned by [`TxQueue::status`](crate::app::TxQueue::status).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueStatus {
    pub queue_size: usize,
    pub is_processing: bool,
    /// In queue order; the head comes first.
    pub pending: Vec<PendingTask>,
    pub counts: QueueCounts,
}

impl QueueStatus {
    pub fn is_idle(&self) -> bool {
        self.queue_size == 0 && !self.is_processing
    }
}
