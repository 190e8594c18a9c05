//! App - キューのアプリケーション層
//!
//! # 主要コンポーネント
//! - **TxQueueBuilder**: 構築とワイヤリング
//! - **TxQueue**: submit / status / cancel_all の表面
//! - **ProcessingLoop**: store を 1 件ずつ消化するループ
//! - **Status**: point-in-time スナップショット

pub mod builder;
pub mod runtime;
pub mod status;
mod worker_loop;

pub use self::builder::{BuildError, TxQueueBuilder};
pub use self::runtime::{SubmitHandle, TxQueue};
pub use self::status::{PendingTask, QueueCounts, QueueStatus};
