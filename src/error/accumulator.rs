//! Per-node error collection.

use stillwater::Validation;

use super::fault::StageError;
use super::record::{ErrorRecord, ValidationErrors};

/// Collects error records while a composite node validates its children.
///
/// Child failures are absorbed rather than returned, so every failing leaf is
/// reported; faults are passed straight back to the caller.
///
/// # Example
///
/// ```rust
/// use schemata::{ErrorAccumulator, ErrorKind, ErrorRecord, Location, Value};
///
/// let mut acc = ErrorAccumulator::new();
/// acc.push(ErrorRecord::new(ErrorKind::Missing, Location::root().push("a")));
/// acc.push(ErrorRecord::new(ErrorKind::Missing, Location::root().push("b")));
///
/// let outcome = acc.finish(Value::None);
/// assert!(outcome.is_failure());
/// ```
#[derive(Debug, Default)]
pub struct ErrorAccumulator {
    records: Vec<ErrorRecord>,
}

impl ErrorAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: ErrorRecord) {
        self.records.push(record);
    }

    /// Appends every record of a container.
    pub fn extend(&mut self, errors: ValidationErrors) {
        self.records.extend(errors);
    }

    /// Takes a child result: successes are returned, validation failures are
    /// recorded, faults propagate.
    pub fn absorb<T>(&mut self, result: Result<T, StageError>) -> Result<Option<T>, StageError> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(StageError::Invalid(errors)) => {
                self.extend(errors);
                Ok(None)
            }
            Err(other) => Err(other),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Strips the input from every collected record.
    pub fn redact_inputs(&mut self) {
        for record in &mut self.records {
            record.input = None;
        }
    }

    /// Returns the collected records as a container, if there are any.
    pub fn into_errors(self) -> Option<ValidationErrors> {
        ValidationErrors::from_vec(self.records)
    }

    /// Succeeds with `value` when nothing was collected.
    pub fn finish<T>(self, value: T) -> Validation<T, ValidationErrors> {
        match self.into_errors() {
            None => Validation::Success(value),
            Some(errors) => Validation::Failure(errors),
        }
    }

    /// Like [`finish`](Self::finish), shaped for the runner's `?` flow.
    pub fn into_result<T>(self, value: T) -> Result<T, StageError> {
        match self.into_errors() {
            None => Ok(value),
            Some(errors) => Err(StageError::Invalid(errors)),
        }
    }
}
