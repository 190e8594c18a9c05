//! SubstringClassifier - メッセージの部分一致による retry 判定
//!
//! # 方針
//! - メッセージを小文字化して allow-list の部分文字列を探す
//! - どれかに一致すれば transient（retry する）
//! - 一致しなければ permanent（"insufficient balance" や revert は retry しない）

use crate::domain::ExecutorError;
use crate::ports::ErrorClassifier;

/// Substrings historically associated with transient network/chain failures.
pub const DEFAULT_RETRYABLE_PATTERNS: &[&str] = &[
    "nonce too low",
    "nonce has already been used",
    "replacement transaction underpriced",
    "already known",
    "timeout",
    "timed out",
    "network error",
    "socket hang up",
    "econnreset",
    "econnrefused",
    "etimedout",
    "connection reset",
    "connection refused",
    "failed to fetch",
    "could not coalesce error",
    "header not found",
    "request deadline exceeded",
    "rate limit",
    "too many requests",
    "503",
    "502",
    "429",
];

/// Lexical classifier over an allow-list of lower-case substrings.
#[derive(Debug, Clone)]
pub struct SubstringClassifier {
    patterns: Vec<String>,
}

impl SubstringClassifier {
    /// Classifier over [`DEFAULT_RETRYABLE_PATTERNS`].
    pub fn new() -> Self {
        Self::from_patterns(DEFAULT_RETRYABLE_PATTERNS.iter().copied())
    }

    /// Replace the allow-list entirely.
    pub fn from_patterns<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            patterns: patterns
                .into_iter()
                .map(|p| p.as_ref().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    /// Add one more retryable substring.
    pub fn with_pattern(mut self, pattern: impl AsRef<str>) -> Self {
        let pattern = pattern.as_ref().to_lowercase();
        if !pattern.is_empty() && !self.patterns.contains(&pattern) {
            self.patterns.push(pattern);
        }
        self
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Check a raw message against the allow-list.
    pub fn matches(&self, message: &str) -> bool {
        let message = message.to_lowercase();
        self.patterns.iter().any(|p| message.contains(p.as_str()))
    }
}

impl Default for SubstringClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorClassifier for SubstringClassifier {
    fn is_retryable(&self, error: &ExecutorError) -> bool {
        self.matches(&error.to_string())
    }
}
