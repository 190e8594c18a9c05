//! TxQueueBuilder - queue の構築とワイヤリング
//!
//! # Fail-fast 設計
//! - tokio runtime の外で build() すると BuildError::NoRuntime
//! - retry を有効にしたのに backoff が 0 なら BuildError::InvalidConfig

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;

use super::runtime::{Shared, TxQueue};
use crate::config::QueueConfig;
use crate::impls::SubstringClassifier;
use crate::ports::{ErrorClassifier, EventSink, NoopEventSink};

/// BuildError は queue 構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("no tokio runtime available; build the queue inside a runtime or pass one with `runtime()`")]
    NoRuntime,

    #[error("invalid queue config: {0}")]
    InvalidConfig(String),
}

/// Builds a [`TxQueue`].
///
/// # 使用例
/// ```ignore
/// let queue = TxQueueBuilder::from_config(config)
///     .classifier(SubstringClassifier::new().with_pattern("mempool full"))
///     .build()?;
/// ```
pub struct TxQueueBuilder {
    config: QueueConfig,
    classifier: Option<Arc<dyn ErrorClassifier>>,
    events: Option<Arc<dyn EventSink>>,
    runtime: Option<Handle>,
}

impl TxQueueBuilder {
    pub fn new() -> Self {
        Self::from_config(QueueConfig::default())
    }

    pub fn from_config(config: QueueConfig) -> Self {
        Self {
            config,
            classifier: None,
            events: None,
            runtime: None,
        }
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.config.max_retries = max_retries;
        self
    }

    pub fn base_backoff(mut self, base: Duration) -> Self {
        self.config.base_backoff_ms = duration_to_ms(base);
        self
    }

    pub fn inter_task_delay(mut self, delay: Duration) -> Self {
        self.config.inter_task_delay_ms = duration_to_ms(delay);
        self
    }

    /// `None` waits for the executor forever.
    pub fn executor_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.executor_timeout_ms = timeout.map(duration_to_ms).unwrap_or(0);
        self
    }

    /// Replace the default [`SubstringClassifier`].
    pub fn classifier<C: ErrorClassifier + 'static>(mut self, classifier: C) -> Self {
        self.classifier = Some(Arc::new(classifier));
        self
    }

    pub fn event_sink<S: EventSink + 'static>(mut self, sink: S) -> Self {
        self.events = Some(Arc::new(sink));
        self
    }

    /// Run the processing loop on this runtime instead of the current one.
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    pub fn build(self) -> Result<TxQueue, BuildError> {
        if self.config.max_retries > 0 && self.config.base_backoff_ms == 0 {
            return Err(BuildError::InvalidConfig(
                "base_backoff_ms must be positive when max_retries > 0".to_string(),
            ));
        }
        let runtime = match self.runtime {
            Some(handle) => handle,
            None => Handle::try_current().map_err(|_| BuildError::NoRuntime)?,
        };
        let classifier = self
            .classifier
            .unwrap_or_else(|| Arc::new(SubstringClassifier::new()));
        let events = self.events.unwrap_or_else(|| Arc::new(NoopEventSink));

        let shared = Shared::new(&self.config, classifier, events, runtime);
        Ok(TxQueue::from_shared(Arc::new(shared)))
    }
}

impl Default for TxQueueBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn duration_to_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ExecutorError;

    #[test]
    fn build_outside_runtime_fails() {
        let result = TxQueueBuilder::new().build();
        assert!(matches!(result, Err(BuildError::NoRuntime)));
    }

    #[test]
    fn build_with_explicit_runtime() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        let queue = TxQueueBuilder::new().runtime(rt.handle().clone()).build();
        assert!(queue.is_ok());
    }

    #[tokio::test]
    async fn zero_backoff_with_retries_is_rejected() {
        let result = TxQueueBuilder::new()
            .max_retries(2)
            .base_backoff(Duration::ZERO)
            .build();
        assert!(matches!(result, Err(BuildError::InvalidConfig(_))));
    }

    #[test]
    fn setters_update_config() {
        let builder = TxQueueBuilder::new()
            .max_retries(3)
            .base_backoff(Duration::from_millis(250))
            .inter_task_delay(Duration::from_secs(1))
            .executor_timeout(None);
        let config = builder.config();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.base_backoff_ms, 250);
        assert_eq!(config.inter_task_delay_ms, 1000);
        assert_eq!(config.executor_timeout(), None);
    }

    #[tokio::test]
    async fn custom_classifier_is_used() {
        let queue = TxQueueBuilder::new()
            .max_retries(1)
            .base_backoff(Duration::from_millis(1))
            .classifier(|err: &ExecutorError| err.to_string() == "flaky")
            .build()
            .unwrap();

        // "timeout" would be retried by the default classifier, not by this one
        let err = queue
            .submit("t", || async { Err::<String, ExecutorError>("timeout".into()) })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "timeout");
        assert_eq!(queue.status().counts.retries, 0);
    }
}
