//! EventSink port - キューイベントの受け口
//!
//! # 実装
//! - NoopEventSink: 何もしない（デフォルト）
//! - impls::MemoryEventSink: メモリに溜める（テスト・CLI 用）

use crate::domain::QueueEvent;

/// Receives structured queue events.
///
/// Called while the queue's internal lock is held, so events arrive in the
/// order they happened. Implementations must not block for long and must not
/// call back into the queue.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: QueueEvent);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn emit(&self, _event: QueueEvent) {}
}
