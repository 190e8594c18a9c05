//! Queue store: ordered sequence of pending task records.

use std::collections::VecDeque;

use crate::domain::{SubmitError, TaskState, TicketId};

use super::TaskRecord;

/// Result of [`QueueStore::drain_and_cancel`].
#[derive(Debug, Default)]
pub struct Drained {
    /// Tasks whose handles were rejected with `SubmitError::Cancelled`.
    pub cancelled: Vec<(TicketId, String)>,

    /// The record whose executor was in flight. Removed from the store but
    /// not settled; whoever runs the executor settles it.
    pub in_flight: Option<TaskRecord>,
}

/// FIFO of task records. A retried record goes back to the head, so a
/// failing task blocks everything submitted after it.
///
/// Not synchronized by itself; the owner wraps it in a mutex.
#[derive(Debug, Default)]
pub struct QueueStore {
    tasks: VecDeque<TaskRecord>,
}

impl QueueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append to the tail. Returns the 0-based position.
    pub fn enqueue(&mut self, record: TaskRecord) -> usize {
        self.tasks.push_back(record);
        self.tasks.len() - 1
    }

    /// Put a record back at position 0 (after a retryable failure).
    pub fn requeue_at_head(&mut self, record: TaskRecord) {
        self.tasks.push_front(record);
    }

    pub fn peek_head(&self) -> Option<&TaskRecord> {
        self.tasks.front()
    }

    pub fn peek_head_mut(&mut self) -> Option<&mut TaskRecord> {
        self.tasks.front_mut()
    }

    pub fn dequeue_head(&mut self) -> Option<TaskRecord> {
        self.tasks.pop_front()
    }

    /// Remove the head only if it is `ticket`.
    pub fn dequeue_head_if(&mut self, ticket: TicketId) -> Option<TaskRecord> {
        match self.tasks.front() {
            Some(head) if head.ticket == ticket => self.tasks.pop_front(),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn size(&self) -> usize {
        self.tasks.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TaskRecord> {
        self.tasks.iter()
    }

    /// Remove every record; reject the ones not in flight with a cancellation.
    pub fn drain_and_cancel(&mut self) -> Drained {
        let mut drained = Drained::default();
        for mut record in self.tasks.drain(..) {
            if record.state.is_in_flight() {
                drained.in_flight = Some(record);
                continue;
            }
            record.settle(Err(SubmitError::Cancelled {
                label: record.label.clone(),
            }));
            drained.cancelled.push((record.ticket, record.label));
        }
        drained
    }
}
