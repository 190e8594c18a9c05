//! Events - キューで発生したイベント
//!
//! EventSink に渡される構造化イベント。UI 側の通知や監査ログ用。

use std::time::Duration;

use serde::Serialize;

use super::TicketId;

/// Something that happened to a task inside the queue.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum QueueEvent {
    Enqueued {
        ticket: TicketId,
        label: String,
        position: usize,
    },
    AttemptStarted {
        ticket: TicketId,
        label: String,
        attempt: u32,
    },
    Succeeded {
        ticket: TicketId,
        label: String,
        attempt: u32,
        tx_hash: String,
    },
    RetryScheduled {
        ticket: TicketId,
        label: String,
        attempt: u32,
        delay: Duration,
        error: String,
    },
    Failed {
        ticket: TicketId,
        label: String,
        attempt: u32,
        error: String,
    },
    Cancelled {
        ticket: TicketId,
        label: String,
    },
}

impl QueueEvent {
    pub fn ticket(&self) -> TicketId {
        match self {
            QueueEvent::Enqueued { ticket, .. }
            | QueueEvent::AttemptStarted { ticket, .. }
            | QueueEvent::Succeeded { ticket, .. }
            | QueueEvent::RetryScheduled { ticket, .. }
            | QueueEvent::Failed { ticket, .. }
            | QueueEvent::Cancelled { ticket, .. } => *ticket,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            QueueEvent::Enqueued { label, .. }
            | QueueEvent::AttemptStarted { label, .. }
            | QueueEvent::Succeeded { label, .. }
            | QueueEvent::RetryScheduled { label, .. }
            | QueueEvent::Failed { label, .. }
            | QueueEvent::Cancelled { label, .. } => label,
        }
    }
}
