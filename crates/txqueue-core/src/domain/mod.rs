//! Domain model (tickets, task state, errors, events).

pub mod errors;
pub mod events;
pub mod ids;
pub mod state;

pub use self::errors::{ExecutorError, ExecutorTimeout, SubmitError};
pub use self::events::QueueEvent;
pub use self::ids::TicketId;
pub use self::state::TaskState;

/// Identifier the executor returns on acceptance (e.g. a transaction hash).
pub type TxHash = String;
