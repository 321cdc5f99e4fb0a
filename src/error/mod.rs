//! Error types for validation failures.
//!
//! [`ErrorRecord`] describes one failing leaf with its full path,
//! [`ValidationErrors`] is the single non-empty container returned per call,
//! and [`ErrorAccumulator`] gathers records while a node is being validated.
//! [`StageError`] is what caller-supplied stage functions raise, and
//! [`SchemaFault`] is the unrecoverable side that never becomes a record.

mod accumulator;
mod fault;
mod record;

pub use accumulator::ErrorAccumulator;
pub use fault::{SchemaFault, StageError};
pub use record::{ErrorContext, ErrorKind, ErrorRecord, ValidationErrors};

pub(crate) use record::fill_template;
