//! Executor port - 1 回分の送信処理
//!
//! executor は caller が用意する「実際の副作用」（署名、RPC 送信など）。
//! キューは中身を知らず、結果の文字列かエラーだけを見ます。

use std::future::Future;

use async_trait::async_trait;

use crate::domain::{ExecutorError, TxHash};

/// Performs exactly one logical submission attempt per call.
///
/// Called again for each retry, so it must be safe to invoke repeatedly.
///
/// # 使用例
/// ```ignore
/// let handle = queue.submit("like-1", || async { Ok("0xaaa".to_string()) });
/// ```
#[async_trait]
pub trait TxExecutor: Send + Sync {
    async fn execute(&self) -> Result<TxHash, ExecutorError>;
}

#[async_trait]
impl<F, Fut> TxExecutor for F
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<TxHash, ExecutorError>> + Send + 'static,
{
    async fn execute(&self) -> Result<TxHash, ExecutorError> {
        (self)().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn closure_is_an_executor() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let exec = move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, ExecutorError>("0xabc".to_string())
            }
        };

        assert_eq!(exec.execute().await.unwrap(), "0xabc");
        assert_eq!(exec.execute().await.unwrap(), "0xabc");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn closure_errors_pass_through() {
        let exec = || async { Err::<TxHash, ExecutorError>("nonce too low".into()) };
        let err = exec.execute().await.unwrap_err();
        assert_eq!(err.to_string(), "nonce too low");
    }
}
