//! ProcessingLoop - 1 件ずつ store を消化するループ
//!
//! # フロー
//! 1. head を覗く（取り出さない）
//! 2. attempt を増やして executor を実行（別 task で spawn、timeout 付き）
//! 3. 成功: head を外して resolve、次へ
//! 4. 失敗: classifier に聞く
//!    - retryable かつ attempt <= max_retries: head に戻して base * attempt 待つ
//!    - それ以外: head を外して reject、次へ
//! 5. store が空になったら processing フラグを下ろして終了
//!
//! executor を呼ぶのはこのループだけなので、in-flight は構造的に高々 1 件。

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::runtime::{QueueState, Shared};
use crate::domain::{ExecutorError, ExecutorTimeout, QueueEvent, SubmitError, TicketId, TxHash};
use crate::ports::TxExecutor;
use crate::queue::TaskRecord;

/// One try of the head task, captured so the lock can be released.
struct Attempt {
    ticket: TicketId,
    label: String,
    attempt: u32,
    executor: Arc<dyn TxExecutor>,
}

enum AttemptOutcome {
    Success(TxHash),
    Failure(ExecutorError),
    Panicked,
}

/// What the loop does after a failed try.
enum NextStep {
    Continue,
    RetryAfter(Duration),
}

/// The single worker draining one queue.
pub(crate) struct ProcessingLoop {
    shared: Arc<Shared>,
}

impl ProcessingLoop {
    /// Start draining unless a loop already owns the queue.
    ///
    /// Must be called with the queue lock held (`state` is the guarded
    /// state), so the check and the flag update are atomic with the enqueue.
    pub(crate) fn start(shared: &Arc<Shared>, state: &mut QueueState) -> bool {
        if state.processing {
            return false;
        }
        state.processing = true;
        let worker = ProcessingLoop {
            shared: Arc::clone(shared),
        };
        shared.runtime.spawn(worker.run());
        true
    }

    async fn run(self) {
        let mut guard = LoopGuard {
            shared: &self.shared,
            armed: true,
        };
        debug!(target: "txqueue", "processing loop started");

        while let Some(attempt) = self.begin_attempt() {
            let outcome = self.invoke(&attempt).await;
            let next = match outcome {
                AttemptOutcome::Success(hash) => {
                    self.finish_success(&attempt, hash);
                    self.shared.inter_task_delay
                }
                AttemptOutcome::Failure(err) => match self.finish_failure(&attempt, err) {
                    NextStep::RetryAfter(delay) => delay,
                    NextStep::Continue => Duration::ZERO,
                },
                AttemptOutcome::Panicked => {
                    self.finish_panicked(&attempt);
                    Duration::ZERO
                }
            };
            if !next.is_zero() {
                tokio::time::sleep(next).await;
            }
        }

        // begin_attempt cleared the flag under the lock
        guard.armed = false;
        debug!(target: "txqueue", "processing loop idle");
    }

    /// Peek the head and mark a new try, or stop when the store is empty.
    fn begin_attempt(&self) -> Option<Attempt> {
        let mut state = self.shared.lock();
        let Some(head) = state.store.peek_head_mut() else {
            state.processing = false;
            return None;
        };

        let attempt = head.start_attempt();
        let task = Attempt {
            ticket: head.ticket,
            label: head.label.clone(),
            attempt,
            executor: Arc::clone(&head.executor),
        };
        debug!(
            target: "txqueue",
            ticket = %task.ticket,
            label = %task.label,
            attempt,
            max_retries = head.max_retries,
            "attempt started"
        );
        self.shared.events.emit(QueueEvent::AttemptStarted {
            ticket: task.ticket,
            label: task.label.clone(),
            attempt,
        });
        Some(task)
    }

    /// Run the executor in its own task so a panic is caught as a `JoinError`.
    async fn invoke(&self, task: &Attempt) -> AttemptOutcome {
        let executor = Arc::clone(&task.executor);
        let started = Instant::now();
        let mut join = self
            .shared
            .runtime
            .spawn(async move { executor.execute().await });

        let joined = match self.shared.executor_timeout {
            Some(limit) => match tokio::time::timeout(limit, &mut join).await {
                Ok(joined) => joined,
                Err(_) => {
                    let elapsed_ms = started.elapsed().as_millis();
                    // abort only lands once the current poll returns; wait for it
                    // so the timed-out try never overlaps the next one
                    join.abort();
                    let _ = join.await;
                    return AttemptOutcome::Failure(Box::new(ExecutorTimeout { elapsed_ms }));
                }
            },
            None => join.await,
        };

        match joined {
            Ok(Ok(hash)) => AttemptOutcome::Success(hash),
            Ok(Err(err)) => AttemptOutcome::Failure(err),
            Err(join_err) if join_err.is_panic() => AttemptOutcome::Panicked,
            Err(join_err) => AttemptOutcome::Failure(Box::new(join_err)),
        }
    }

    fn finish_success(&self, task: &Attempt, hash: TxHash) {
        let mut state = self.shared.lock();
        let Some(mut record) = state.take_record(task.ticket) else {
            warn!(target: "txqueue", ticket = %task.ticket, label = %task.label, "finished task no longer tracked");
            return;
        };
        state.counts.succeeded += 1;
        info!(
            target: "txqueue",
            ticket = %task.ticket,
            label = %task.label,
            attempt = task.attempt,
            tx_hash = %hash,
            "task succeeded"
        );
        self.shared.events.emit(QueueEvent::Succeeded {
            ticket: task.ticket,
            label: task.label.clone(),
            attempt: task.attempt,
            tx_hash: hash.clone(),
        });
        if !record.settle(Ok(hash)) {
            debug!(target: "txqueue", ticket = %task.ticket, "caller dropped its handle");
        }
    }

    fn finish_failure(&self, task: &Attempt, err: ExecutorError) -> NextStep {
        let retryable = self.shared.classifier.is_retryable(&err);
        let message = err.to_string();

        let mut state = self.shared.lock();
        if let Some(mut record) = state.store.dequeue_head_if(task.ticket) {
            if retryable && self.shared.policy.allows_retry(task.attempt) {
                let delay = self.shared.policy.next_delay(task.attempt);
                record.schedule_retry(message.clone());
                state.store.requeue_at_head(record);
                state.counts.retries += 1;
                warn!(
                    target: "txqueue",
                    ticket = %task.ticket,
                    label = %task.label,
                    attempt = task.attempt,
                    max_retries = self.shared.policy.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %message,
                    "retryable failure, backing off"
                );
                self.shared.events.emit(QueueEvent::RetryScheduled {
                    ticket: task.ticket,
                    label: task.label.clone(),
                    attempt: task.attempt,
                    delay,
                    error: message,
                });
                return NextStep::RetryAfter(delay);
            }
            self.reject(&mut state, task, record, err, message, retryable);
            return NextStep::Continue;
        }

        // detached by cancel_all: report the real outcome, no more retries
        let detached = state.detached.take_if(|r| r.ticket == task.ticket);
        match detached {
            Some(record) => self.reject(&mut state, task, record, err, message, retryable),
            None => {
                warn!(target: "txqueue", ticket = %task.ticket, label = %task.label, error = %message, "failed task no longer tracked");
            }
        }
        NextStep::Continue
    }

    fn reject(
        &self,
        state: &mut QueueState,
        task: &Attempt,
        mut record: TaskRecord,
        err: ExecutorError,
        message: String,
        retryable: bool,
    ) {
        state.counts.failed += 1;
        warn!(
            target: "txqueue",
            ticket = %task.ticket,
            label = %task.label,
            attempt = task.attempt,
            retryable,
            error = %message,
            "task failed"
        );
        self.shared.events.emit(QueueEvent::Failed {
            ticket: task.ticket,
            label: task.label.clone(),
            attempt: task.attempt,
            error: message,
        });
        record.settle(Err(SubmitError::Rejected(err)));
    }

    fn finish_panicked(&self, task: &Attempt) {
        let mut state = self.shared.lock();
        let Some(mut record) = state.take_record(task.ticket) else {
            return;
        };
        state.counts.failed += 1;
        error!(target: "txqueue", ticket = %task.ticket, label = %task.label, attempt = task.attempt, "executor panicked");
        self.shared.events.emit(QueueEvent::Failed {
            ticket: task.ticket,
            label: task.label.clone(),
            attempt: task.attempt,
            error: "executor panicked".to_string(),
        });
        record.settle(Err(SubmitError::Panicked {
            label: task.label.clone(),
        }));
    }
}

/// Releases the in-flight slot if the loop exits without draining
/// (a panic in the loop, or the runtime dropping the task).
struct LoopGuard<'a> {
    shared: &'a Arc<Shared>,
    armed: bool,
}

impl Drop for LoopGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = self.shared.lock();
        // the in-flight try has an unknown outcome; dropping its sender
        // settles the caller with SubmitError::Abandoned
        if state
            .store
            .peek_head()
            .is_some_and(|head| head.state.is_in_flight())
        {
            if let Some(record) = state.store.dequeue_head() {
                error!(target: "txqueue", ticket = %record.ticket, label = %record.label, "processing loop stopped mid-attempt");
            }
        }
        state.detached = None;
        state.processing = false;
        if !state.store.is_empty() {
            ProcessingLoop::start(self.shared, &mut state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::TxQueue;
    use crate::domain::TaskState;
    use crate::impls::MemoryEventSink;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn retry_keeps_task_at_head_with_state() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let queue = TxQueue::builder()
            .max_retries(1)
            .base_backoff(Duration::from_secs(5))
            .build()
            .unwrap();

        let handle = queue.submit("like-2", move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err::<TxHash, ExecutorError>("timeout".into())
                } else {
                    Ok("0xbbb".to_string())
                }
            }
        });
        let behind = queue.submit("like-3", || async { Ok::<_, ExecutorError>("0xccc".to_string()) });

        // let the first try fail, then look while the backoff is pending
        tokio::time::sleep(Duration::from_secs(1)).await;
        let status = queue.status();
        assert_eq!(status.queue_size, 2);
        assert_eq!(status.pending[0].label, "like-2");
        assert_eq!(status.pending[0].state, TaskState::RetryScheduled);
        assert_eq!(status.pending[0].attempt, 1);
        assert_eq!(status.pending[0].last_error.as_deref(), Some("timeout"));
        assert_eq!(status.pending[1].attempt, 0);
        assert_eq!(status.counts.retries, 1);

        assert_eq!(handle.await.unwrap(), "0xbbb");
        assert_eq!(behind.await.unwrap(), "0xccc");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn timed_out_attempt_is_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let queue = TxQueue::builder()
            .max_retries(1)
            .base_backoff(Duration::from_millis(100))
            .executor_timeout(Some(Duration::from_secs(2)))
            .build()
            .unwrap();

        let handle = queue.submit("slow", move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    // never settles on its own
                    std::future::pending::<()>().await;
                }
                Ok::<_, ExecutorError>("0xslow".to_string())
            }
        });

        assert_eq!(handle.await.unwrap(), "0xslow");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_without_retries_surfaces_timeout_error() {
        let queue = TxQueue::builder()
            .executor_timeout(Some(Duration::from_secs(1)))
            .build()
            .unwrap();

        let err = queue
            .submit("stuck", || async {
                std::future::pending::<()>().await;
                Ok::<_, ExecutorError>(String::new())
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timeout"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn timed_out_executor_finishes_before_next_starts() {
        let in_flight = Arc::new(AtomicU32::new(0));
        let max_in_flight = Arc::new(AtomicU32::new(0));
        let queue = TxQueue::builder()
            .executor_timeout(Some(Duration::from_millis(100)))
            .build()
            .unwrap();

        let (running, peak) = (Arc::clone(&in_flight), Arc::clone(&max_in_flight));
        let blocking = queue.submit("blocking", move || {
            let (running, peak) = (Arc::clone(&running), Arc::clone(&peak));
            async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                // blocks inside a single poll, so abort cannot interrupt it
                std::thread::sleep(Duration::from_millis(500));
                running.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, ExecutorError>("0xa".to_string())
            }
        });
        let (running, peak) = (Arc::clone(&in_flight), Arc::clone(&max_in_flight));
        let next = queue.submit("next", move || {
            let (running, peak) = (Arc::clone(&running), Arc::clone(&peak));
            async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                running.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, ExecutorError>("0xb".to_string())
            }
        });

        let err = blocking.await.unwrap_err();
        assert!(err.to_string().contains("timeout"));
        assert_eq!(next.await.unwrap(), "0xb");
        assert_eq!(max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn panicking_classifier_abandons_head_and_loop_recovers() {
        let queue = TxQueue::builder()
            .classifier(|_: &ExecutorError| -> bool { panic!("classifier bug") })
            .build()
            .unwrap();

        let head = queue.submit("head", || async {
            Err::<TxHash, ExecutorError>("nonce too low".into())
        });
        let next = queue.submit("next", || async { Ok::<_, ExecutorError>("0xb".to_string()) });

        assert!(matches!(
            head.await,
            Err(SubmitError::Abandoned { ref label }) if label == "head"
        ));
        assert_eq!(next.await.unwrap(), "0xb");

        tokio::task::yield_now().await;
        let status = queue.status();
        assert!(!status.is_processing);
        assert_eq!(status.queue_size, 0);
    }

    #[tokio::test]
    async fn panicking_executor_is_surfaced_and_loop_continues() {
        let sink = MemoryEventSink::new();
        let queue = TxQueue::builder()
            .max_retries(3)
            .event_sink(sink.clone())
            .build()
            .unwrap();

        let boom = queue.submit("boom", || async {
            if true {
                panic!("executor bug");
            }
            Ok::<_, ExecutorError>(String::new())
        });
        let next = queue.submit("next", || async { Ok::<_, ExecutorError>("0x1".to_string()) });

        assert!(matches!(boom.await, Err(SubmitError::Panicked { .. })));
        assert_eq!(next.await.unwrap(), "0x1");
        assert_eq!(queue.status().counts.failed, 1);
        let attempts = sink
            .events()
            .iter()
            .filter(|e| matches!(e, QueueEvent::AttemptStarted { .. }) && e.label() == "boom")
            .count();
        assert_eq!(attempts, 1);
    }

    #[tokio::test]
    async fn loop_restarts_after_draining() {
        let queue = TxQueue::builder().build().unwrap();
        queue
            .submit("first", || async { Ok::<_, ExecutorError>("0x1".to_string()) })
            .await
            .unwrap();

        // let the loop observe the empty store and stop
        tokio::task::yield_now().await;
        assert!(!queue.status().is_processing);

        let hash = queue
            .submit("second", || async { Ok::<_, ExecutorError>("0x2".to_string()) })
            .await
            .unwrap();
        assert_eq!(hash, "0x2");
    }

    #[tokio::test(start_paused = true)]
    async fn inter_task_delay_spaces_successes() {
        let queue = TxQueue::builder()
            .inter_task_delay(Duration::from_secs(3))
            .build()
            .unwrap();

        let start = tokio::time::Instant::now();
        let a = queue.submit("a", || async { Ok::<_, ExecutorError>("0x1".to_string()) });
        let b = queue.submit("b", || async { Ok::<_, ExecutorError>("0x2".to_string()) });
        a.await.unwrap();
        assert!(start.elapsed() < Duration::from_secs(3));
        b.await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(3));
    }
}
