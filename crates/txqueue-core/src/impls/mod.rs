//! Impls - ports の実装

pub mod lexical;
pub mod memory_sink;

pub use self::lexical::{DEFAULT_RETRYABLE_PATTERNS, SubstringClassifier};
pub use self::memory_sink::MemoryEventSink;
