//! Errors - submit 結果のエラー型
//!
//! # 分類
//! - Rejected: executor が返したエラーそのもの（permanent、または retry を使い切った transient）
//! - Cancelled: `cancel_all()` だけが作る合成エラー
//! - Panicked: executor が panic した（retry しない）
//! - Abandoned: queue が settle せずに消えた（loop の不具合や runtime 停止）

use thiserror::Error;

/// Error type produced by an executor.
///
/// The message (`Display`) is what the classifier inspects.
pub type ExecutorError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Final failure delivered to a caller's [`SubmitHandle`](crate::app::SubmitHandle).
#[derive(Debug, Error)]
pub enum SubmitError {
    /// The executor's own error, unwrapped.
    #[error(transparent)]
    Rejected(ExecutorError),

    #[error("transaction queue was cleared before `{label}` settled")]
    Cancelled { label: String },

    #[error("executor for `{label}` panicked")]
    Panicked { label: String },

    #[error("transaction queue dropped `{label}` without settling it")]
    Abandoned { label: String },
}

impl SubmitError {
    /// The original executor error, if this failure came from the executor.
    pub fn executor_error(&self) -> Option<&ExecutorError> {
        match self {
            SubmitError::Rejected(err) => Some(err),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, SubmitError::Cancelled { .. })
    }
}

/// Error synthesized when an executor attempt exceeds the configured timeout.
///
/// The message always contains `timeout` so the default classifier retries it.
#[derive(Debug, Error)]
#[error("executor timeout after {elapsed_ms}ms")]
pub struct ExecutorTimeout {
    pub elapsed_ms: u128,
}
