//! TxQueue - caller 向けの表面（submit / status / cancel_all）
//!
//! # 構成
//! - `TxQueue` は `Arc<Shared>` を包む clone 可能なハンドル（グローバル singleton ではない）
//! - store と processing フラグは 1 つの Mutex の中にある
//!   → submit の追加と loop の起動判定が同じクリティカルセクションで行われる
//! - Mutex は await を跨がない（同期メソッドの中だけでロックする）

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use super::builder::{BuildError, TxQueueBuilder};
use super::status::{PendingTask, QueueCounts, QueueStatus};
use super::worker_loop::ProcessingLoop;
use crate::config::QueueConfig;
use crate::domain::{QueueEvent, SubmitError, TicketId, TxHash};
use crate::ports::{ErrorClassifier, EventSink, TxExecutor};
use crate::queue::{QueueStore, RetryPolicy, TaskRecord};

/// Mutable state guarded by the queue lock.
#[derive(Debug, Default)]
pub(crate) struct QueueState {
    pub(crate) store: QueueStore,

    /// A processing loop owns the in-flight slot.
    pub(crate) processing: bool,

    /// In-flight record removed from the store by `cancel_all`.
    /// The loop still settles it with the executor's real outcome.
    pub(crate) detached: Option<TaskRecord>,

    pub(crate) counts: QueueCounts,
}

impl QueueState {
    /// Take the record for `ticket`, wherever it currently lives.
    pub(crate) fn take_record(&mut self, ticket: TicketId) -> Option<TaskRecord> {
        self.store
            .dequeue_head_if(ticket)
            .or_else(|| self.detached.take_if(|r| r.ticket == ticket))
    }
}

pub(crate) struct Shared {
    state: Mutex<QueueState>,
    pub(crate) policy: RetryPolicy,
    pub(crate) inter_task_delay: Duration,
    pub(crate) executor_timeout: Option<Duration>,
    pub(crate) classifier: Arc<dyn ErrorClassifier>,
    pub(crate) events: Arc<dyn EventSink>,
    pub(crate) runtime: Handle,
}

impl Shared {
    pub(crate) fn new(
        config: &QueueConfig,
        classifier: Arc<dyn ErrorClassifier>,
        events: Arc<dyn EventSink>,
        runtime: Handle,
    ) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            policy: config.retry_policy(),
            inter_task_delay: config.inter_task_delay(),
            executor_timeout: config.executor_timeout(),
            classifier,
            events,
            runtime,
        }
    }

    /// A panic elsewhere must not wedge the queue, so poisoning is ignored.
    pub(crate) fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        // only reachable with leftovers if the runtime dropped the loop
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        let drained = state.store.drain_and_cancel();
        if !drained.cancelled.is_empty() {
            warn!(target: "txqueue", cancelled = drained.cancelled.len(), "queue discarded with pending tasks");
        }
    }
}

/// Single-flight transaction queue.
///
/// Cheap to clone; clones share one store and one processing loop.
///
/// # 使用例
/// ```ignore
/// let queue = TxQueue::builder().max_retries(2).build()?;
/// let hash = queue.submit("like-1", || async { send_like().await }).await?;
/// ```
#[derive(Clone)]
pub struct TxQueue {
    shared: Arc<Shared>,
}

impl TxQueue {
    pub fn builder() -> TxQueueBuilder {
        TxQueueBuilder::new()
    }

    /// Build a queue from config with the default classifier, on the current runtime.
    pub fn new(config: QueueConfig) -> Result<Self, BuildError> {
        TxQueueBuilder::from_config(config).build()
    }

    pub(crate) fn from_shared(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Enqueue one submission.
    ///
    /// The task is appended before this returns, so call order is queue
    /// order even if the handles are awaited later. Dropping the handle does
    /// not cancel the task.
    pub fn submit<E>(&self, label: impl Into<String>, executor: E) -> SubmitHandle
    where
        E: TxExecutor + 'static,
    {
        let label = label.into();
        let (tx, rx) = oneshot::channel();
        let record = TaskRecord::new(
            label.clone(),
            Arc::new(executor),
            tx,
            self.shared.policy.max_retries,
        );
        let ticket = record.ticket;

        {
            let mut state = self.shared.lock();
            let position = state.store.enqueue(record);
            debug!(target: "txqueue", %ticket, label = %label, position, "enqueued");
            self.shared.events.emit(QueueEvent::Enqueued {
                ticket,
                label: label.clone(),
                position,
            });
            ProcessingLoop::start(&self.shared, &mut state);
        }

        SubmitHandle { ticket, label, rx }
    }

    /// Point-in-time snapshot.
    pub fn status(&self) -> QueueStatus {
        let state = self.shared.lock();
        QueueStatus {
            queue_size: state.store.size(),
            is_processing: state.processing,
            pending: state.store.iter().map(PendingTask::from).collect(),
            counts: state.counts,
        }
    }

    /// Reject every pending task with [`SubmitError::Cancelled`] and empty the store.
    ///
    /// An executor already in flight is not aborted; its caller still gets
    /// the executor's real result, without further retries. Returns the
    /// number of tasks cancelled.
    pub fn cancel_all(&self) -> usize {
        let mut state = self.shared.lock();
        let drained = state.store.drain_and_cancel();
        let cancelled = drained.cancelled.len();
        state.counts.cancelled += cancelled as u64;
        if let Some(record) = drained.in_flight {
            debug!(target: "txqueue", ticket = %record.ticket, label = %record.label, "detached in-flight task");
            state.detached = Some(record);
        }
        for (ticket, label) in drained.cancelled {
            self.shared.events.emit(QueueEvent::Cancelled { ticket, label });
        }
        info!(target: "txqueue", cancelled, "queue cleared");
        cancelled
    }

    pub fn is_empty(&self) -> bool {
        self.shared.lock().store.is_empty()
    }

    pub fn len(&self) -> usize {
        self.shared.lock().store.size()
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.shared.policy
    }
}

/// Future returned by [`TxQueue::submit`]; settles exactly once.
#[must_use = "the submission runs regardless; await the handle to observe its result"]
#[derive(Debug)]
pub struct SubmitHandle {
    ticket: TicketId,
    label: String,
    rx: oneshot::Receiver<Result<TxHash, SubmitError>>,
}

impl SubmitHandle {
    pub fn ticket(&self) -> TicketId {
        self.ticket
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl Future for SubmitHandle {
    type Output = Result<TxHash, SubmitError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = &mut *self;
        match Pin::new(&mut this.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            // sender dropped without settling
            Poll::Ready(Err(_)) => Poll::Ready(Err(SubmitError::Abandoned {
                label: this.label.clone(),
            })),
            Poll::Pending => Poll::Pending,
        }
    }
}
