//! Queue configuration (TOML / serde).

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::queue::RetryPolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid queue config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Tunables of one queue instance.
///
/// ```toml
/// max_retries = 2
/// base_backoff_ms = 1000
/// inter_task_delay_ms = 0
/// executor_timeout_ms = 120000   # 0 disables the timeout
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QueueConfig {
    /// Retry ceiling. 0 means one attempt only.
    pub max_retries: u32,

    /// Linear backoff base.
    pub base_backoff_ms: u64,

    /// Pause after each successful task before the next one starts.
    /// Transports without fast nonce visibility should set this above zero.
    pub inter_task_delay_ms: u64,

    /// Per-attempt executor timeout; 0 waits forever.
    pub executor_timeout_ms: u64,
}

impl QueueConfig {
    pub const DEFAULT_BASE_BACKOFF_MS: u64 = 1_000;
    pub const DEFAULT_EXECUTOR_TIMEOUT_MS: u64 = 120_000;

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::linear(self.max_retries, self.base_backoff())
    }

    pub fn base_backoff(&self) -> Duration {
        Duration::from_millis(self.base_backoff_ms)
    }

    pub fn inter_task_delay(&self) -> Duration {
        Duration::from_millis(self.inter_task_delay_ms)
    }

    pub fn executor_timeout(&self) -> Option<Duration> {
        (self.executor_timeout_ms > 0).then(|| Duration::from_millis(self.executor_timeout_ms))
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            base_backoff_ms: Self::DEFAULT_BASE_BACKOFF_MS,
            inter_task_delay_ms: 0,
            executor_timeout_ms: Self::DEFAULT_EXECUTOR_TIMEOUT_MS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_allow_a_single_attempt() {
        let config = QueueConfig::default();
        assert_eq!(config.max_retries, 0);
        assert_eq!(config.base_backoff(), Duration::from_secs(1));
        assert_eq!(config.inter_task_delay(), Duration::ZERO);
        assert_eq!(config.executor_timeout(), Some(Duration::from_secs(120)));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = QueueConfig::from_toml_str("max_retries = 3\nbase_backoff_ms = 250\n").unwrap();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_policy().next_delay(2), Duration::from_millis(500));
        assert_eq!(
            config.executor_timeout_ms,
            QueueConfig::DEFAULT_EXECUTOR_TIMEOUT_MS
        );
    }

    #[test]
    fn zero_timeout_disables_it() {
        let config = QueueConfig::from_toml_str("executor_timeout_ms = 0").unwrap();
        assert_eq!(config.executor_timeout(), None);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = QueueConfig::from_toml_str("max_attempts = 3").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = QueueConfig::load("/nonexistent/txqueue.toml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/txqueue.toml"));
    }
}
