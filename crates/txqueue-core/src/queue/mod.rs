//! Queue module: task records, ordered store, and retry policy.

mod record;
mod retry;
mod store;

pub use record::TaskRecord;
pub use retry::RetryPolicy;
pub use store::{Drained, QueueStore};
