//! Errors raised by stage code, and the faults that escape validation.

use crate::path::Location;
use crate::value::Value;

use super::record::{ErrorContext, ErrorKind, ErrorRecord, ValidationErrors};

/// What a stage function (or a `Next` continuation) can fail with.
///
/// `Value`, `Assertion` and `Custom` are user-raised validation failures and
/// become [`ErrorRecord`]s at the stage's location. `Invalid` carries records
/// that already know their paths. `Fault` is not a validation failure: it
/// aborts the whole call and surfaces as [`SchemaFault`].
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error("Value error, {0}")]
    Value(String),

    #[error("Assertion failed, {0}")]
    Assertion(String),

    #[error("{kind}: {message}")]
    Custom {
        kind: String,
        message: String,
        context: ErrorContext,
    },

    #[error("{0}")]
    Invalid(ValidationErrors),

    #[error(transparent)]
    Fault(#[from] SchemaFault),
}

impl StageError {
    /// A generic failure, reported as `value_error`.
    pub fn value(message: impl Into<String>) -> Self {
        StageError::Value(message.into())
    }

    /// A failed check, reported as `assertion_error`.
    pub fn assertion(message: impl Into<String>) -> Self {
        StageError::Assertion(message.into())
    }

    /// A failure with its own kind; `{key}` placeholders in `message` are
    /// filled from `context`.
    pub fn custom(kind: impl Into<String>, message: impl Into<String>, context: ErrorContext) -> Self {
        StageError::Custom {
            kind: kind.into(),
            message: message.into(),
            context,
        }
    }

    /// Wraps an arbitrary error as an unrecoverable fault.
    pub fn fault<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        StageError::Fault(SchemaFault::Stage(Box::new(error)))
    }

    /// Turns user-raised failures into located records; `Invalid` and
    /// `Fault` pass through unchanged.
    pub(crate) fn locate(self, path: &Location, input: &Value) -> StageError {
        let record = match self {
            StageError::Value(message) => {
                let mut context = ErrorContext::new();
                context.insert("error".into(), Value::Str(message));
                ErrorRecord::with_rendered_context(ErrorKind::ValueError, path.clone(), context)
            }
            StageError::Assertion(message) => {
                let mut context = ErrorContext::new();
                context.insert("error".into(), Value::Str(message));
                ErrorRecord::with_rendered_context(ErrorKind::AssertionError, path.clone(), context)
            }
            StageError::Custom {
                kind,
                message,
                context,
            } => {
                let rendered = super::fill_template(&message, &context);
                ErrorRecord::with_rendered_context(ErrorKind::Custom(kind), path.clone(), context)
                    .with_message(rendered)
            }
            other => return other,
        };
        StageError::Invalid(ValidationErrors::single(record.with_input(input.clone())))
    }
}

impl From<ValidationErrors> for StageError {
    fn from(errors: ValidationErrors) -> Self {
        StageError::Invalid(errors)
    }
}

/// An unrecoverable failure: the validation logic itself is broken.
#[derive(Debug, thiserror::Error)]
pub enum SchemaFault {
    /// A stage or discriminator function raised something other than a
    /// validation failure.
    #[error("stage function failed: {0}")]
    Stage(Box<dyn std::error::Error + Send + Sync>),

    /// A reference points at an id missing from the compiled arena.
    #[error("schema '{0}' is not registered")]
    UnknownNode(String),

    /// A custom serializer raised a validation failure while dumping.
    #[error("serialization failed: {0}")]
    Serialization(String),
}
