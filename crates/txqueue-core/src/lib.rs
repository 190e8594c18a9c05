//! txqueue-core
//!
//! Single-flight, ordered execution queue for transaction submissions.
//! Only one executor runs at a time per queue; transient failures are
//! retried at the head of the queue with linear backoff.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ticket, state, errors, events）
//! - **ports**: 抽象化レイヤー（TxExecutor, ErrorClassifier, EventSink）
//! - **queue**: TaskRecord, QueueStore, RetryPolicy
//! - **app**: TxQueueBuilder, TxQueue, ProcessingLoop, status
//! - **impls**: ports の実装（SubstringClassifier, MemoryEventSink）
//! - **config**: QueueConfig（TOML）

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod queue;

pub use app::{BuildError, QueueStatus, SubmitHandle, TxQueue, TxQueueBuilder};
pub use config::{ConfigError, QueueConfig};
pub use domain::{ExecutorError, SubmitError, TicketId, TxHash};
pub use impls::SubstringClassifier;
pub use ports::{ErrorClassifier, EventSink, TxExecutor};
