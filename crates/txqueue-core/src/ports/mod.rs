//! Ports - キューの外側との境界
//!
//! - **TxExecutor**: caller が渡す送信処理
//! - **ErrorClassifier**: 失敗が transient かどうかの判定
//! - **EventSink**: 構造化イベントの受け口

pub mod classifier;
pub mod event_sink;
pub mod executor;

pub use self::classifier::ErrorClassifier;
pub use self::event_sink::{EventSink, NoopEventSink};
pub use self::executor::TxExecutor;
