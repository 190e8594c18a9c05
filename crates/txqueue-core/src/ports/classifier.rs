//! ErrorClassifier port - 失敗を retry するかどうかの判定
//!
//! Decider と同じく純粋関数として扱う（副作用なし）。
//! デフォルト実装は `impls::lexical::SubstringClassifier`。

use crate::domain::ExecutorError;

/// Decides whether an executor failure is transient.
pub trait ErrorClassifier: Send + Sync {
    fn is_retryable(&self, error: &ExecutorError) -> bool;
}

/// Any predicate closure can act as a classifier (handy in tests).
impl<F> ErrorClassifier for F
where
    F: Fn(&ExecutorError) -> bool + Send + Sync,
{
    fn is_retryable(&self, error: &ExecutorError) -> bool {
        (self)(error)
    }
}
