//! Error records and the per-call error container.

use std::fmt::{self, Display};

use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use stillwater::prelude::*;

use crate::path::Location;
use crate::value::Value;

/// Kind-specific key/value details attached to an [`ErrorRecord`].
pub type ErrorContext = IndexMap<String, Value>;

/// The error taxonomy.
///
/// Structural and coercion kinds are produced by the runner; `ValueError`,
/// `AssertionError` and `Custom` come from stage functions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Missing,
    ExtraForbidden,
    ModelType,
    ModelAttributesType,
    IntType,
    IntParsing,
    IntFromFloat,
    FloatType,
    FloatParsing,
    StringType,
    BoolType,
    BoolParsing,
    NoneRequired,
    LiteralError,
    ListType,
    DictType,
    StringTooShort,
    StringTooLong,
    StringPatternMismatch,
    TooShort,
    TooLong,
    GreaterThan,
    GreaterThanEqual,
    LessThan,
    LessThanEqual,
    MultipleOf,
    UnionTagNotFound,
    UnionTagInvalid,
    RecursionLoop,
    JsonInvalid,
    ValueError,
    AssertionError,
    Custom(String),
}

impl ErrorKind {
    pub fn as_str(&self) -> &str {
        match self {
            ErrorKind::Missing => "missing",
            ErrorKind::ExtraForbidden => "extra_forbidden",
            ErrorKind::ModelType => "model_type",
            ErrorKind::ModelAttributesType => "model_attributes_type",
            ErrorKind::IntType => "int_type",
            ErrorKind::IntParsing => "int_parsing",
            ErrorKind::IntFromFloat => "int_from_float",
            ErrorKind::FloatType => "float_type",
            ErrorKind::FloatParsing => "float_parsing",
            ErrorKind::StringType => "string_type",
            ErrorKind::BoolType => "bool_type",
            ErrorKind::BoolParsing => "bool_parsing",
            ErrorKind::NoneRequired => "none_required",
            ErrorKind::LiteralError => "literal_error",
            ErrorKind::ListType => "list_type",
            ErrorKind::DictType => "dict_type",
            ErrorKind::StringTooShort => "string_too_short",
            ErrorKind::StringTooLong => "string_too_long",
            ErrorKind::StringPatternMismatch => "string_pattern_mismatch",
            ErrorKind::TooShort => "too_short",
            ErrorKind::TooLong => "too_long",
            ErrorKind::GreaterThan => "greater_than",
            ErrorKind::GreaterThanEqual => "greater_than_equal",
            ErrorKind::LessThan => "less_than",
            ErrorKind::LessThanEqual => "less_than_equal",
            ErrorKind::MultipleOf => "multiple_of",
            ErrorKind::UnionTagNotFound => "union_tag_not_found",
            ErrorKind::UnionTagInvalid => "union_tag_invalid",
            ErrorKind::RecursionLoop => "recursion_loop",
            ErrorKind::JsonInvalid => "json_invalid",
            ErrorKind::ValueError => "value_error",
            ErrorKind::AssertionError => "assertion_error",
            ErrorKind::Custom(kind) => kind,
        }
    }

    /// Message template; `{key}` placeholders are filled from the context.
    fn template(&self) -> &str {
        match self {
            ErrorKind::Missing => "Field required",
            ErrorKind::ExtraForbidden => "Extra inputs are not permitted",
            ErrorKind::ModelType => "Input should be a valid dictionary or instance of {class_name}",
            ErrorKind::ModelAttributesType => {
                "Input should be a valid dictionary or object to extract fields from"
            }
            ErrorKind::IntType => "Input should be a valid integer",
            ErrorKind::IntParsing => {
                "Input should be a valid integer, unable to parse string as an integer"
            }
            ErrorKind::IntFromFloat => {
                "Input should be a valid integer, got a number with a fractional part"
            }
            ErrorKind::FloatType => "Input should be a valid number",
            ErrorKind::FloatParsing => {
                "Input should be a valid number, unable to parse string as a number"
            }
            ErrorKind::StringType => "Input should be a valid string",
            ErrorKind::BoolType => "Input should be a valid boolean",
            ErrorKind::BoolParsing => "Input should be a valid boolean, unable to interpret input",
            ErrorKind::NoneRequired => "Input should be None",
            ErrorKind::LiteralError => "Input should be {expected}",
            ErrorKind::ListType => "Input should be a valid list",
            ErrorKind::DictType => "Input should be a valid dictionary",
            ErrorKind::StringTooShort => "String should have at least {min_length} characters",
            ErrorKind::StringTooLong => "String should have at most {max_length} characters",
            ErrorKind::StringPatternMismatch => "String should match pattern '{pattern}'",
            ErrorKind::TooShort => {
                "{field_type} should have at least {min_length} items after validation, not {actual_length}"
            }
            ErrorKind::TooLong => {
                "{field_type} should have at most {max_length} items after validation, not {actual_length}"
            }
            ErrorKind::GreaterThan => "Input should be greater than {gt}",
            ErrorKind::GreaterThanEqual => "Input should be greater than or equal to {ge}",
            ErrorKind::LessThan => "Input should be less than {lt}",
            ErrorKind::LessThanEqual => "Input should be less than or equal to {le}",
            ErrorKind::MultipleOf => "Input should be a multiple of {multiple_of}",
            ErrorKind::UnionTagNotFound => "Unable to extract tag using discriminator {discriminator}",
            ErrorKind::UnionTagInvalid => {
                "Input tag '{tag}' found using {discriminator} does not match any of the expected tags: {expected_tags}"
            }
            ErrorKind::RecursionLoop => "Recursion error - cyclic reference detected",
            ErrorKind::JsonInvalid => "Invalid JSON: {error}",
            ErrorKind::ValueError => "Value error, {error}",
            ErrorKind::AssertionError => "Assertion failed, {error}",
            ErrorKind::Custom(_) => "{error}",
        }
    }

    /// Renders this kind's default message against `context`.
    pub fn render(&self, context: &ErrorContext) -> String {
        fill_template(self.template(), context)
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PartialEq<&str> for ErrorKind {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

impl Serialize for ErrorKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Replaces `{key}` placeholders with the matching context value.
pub(crate) fn fill_template(template: &str, context: &ErrorContext) -> String {
    let mut message = template.to_string();
    for (key, value) in context {
        let placeholder = format!("{{{}}}", key);
        if message.contains(&placeholder) {
            message = message.replace(&placeholder, &value.to_string());
        }
    }
    message
}

/// A single validation failure.
///
/// Serializes to the wire shape
/// `{ kind, path, message, input?, context? }`.
///
/// # Example
///
/// ```rust
/// use schemata::{ErrorKind, ErrorRecord, Location, Value};
///
/// let record = ErrorRecord::new(ErrorKind::Missing, Location::root().push("name"))
///     .with_input(Value::None);
///
/// assert_eq!(record.kind, "missing");
/// assert_eq!(record.message, "Field required");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorRecord {
    pub kind: ErrorKind,
    pub path: Location,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<ErrorContext>,
}

impl ErrorRecord {
    /// Creates a record with the kind's default message.
    pub fn new(kind: ErrorKind, path: Location) -> Self {
        let message = kind.render(&ErrorContext::new());
        Self {
            kind,
            path,
            message,
            input: None,
            context: None,
        }
    }

    /// Creates a record whose message is rendered from `context`.
    pub fn with_rendered_context(kind: ErrorKind, path: Location, context: ErrorContext) -> Self {
        let message = kind.render(&context);
        Self {
            kind,
            path,
            message,
            input: None,
            context: if context.is_empty() {
                None
            } else {
                Some(context)
            },
        }
    }

    /// Sets the offending input.
    pub fn with_input(mut self, input: Value) -> Self {
        self.input = Some(input);
        self
    }

    /// Overrides the message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Adds one context entry and re-renders the default message.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let context = self.context.get_or_insert_with(ErrorContext::new);
        context.insert(key.into(), value.into());
        self.message = self.kind.render(context);
        self
    }

    /// Drops the input, as models configured to hide input require.
    pub fn redacted(mut self) -> Self {
        self.input = None;
        self
    }
}

impl Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_root() {
            write!(f, "(root)")?;
        } else {
            write!(f, "{}", self.path)?;
        }
        write!(f, ": {} [kind={}", self.message, self.kind)?;
        if let Some(input) = &self.input {
            write!(f, ", input={}", input.repr())?;
        }
        write!(f, "]")
    }
}

impl std::error::Error for ErrorRecord {}

/// The single error container produced by one failing validation call.
///
/// Wraps a `NonEmptyVec` so a failure always has at least one record, and
/// implements `Semigroup` so partial failures can be combined.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationErrors(NonEmptyVec<ErrorRecord>);

impl ValidationErrors {
    /// Creates a container holding one record.
    pub fn single(record: ErrorRecord) -> Self {
        Self(NonEmptyVec::singleton(record))
    }

    /// Creates a container from a `NonEmptyVec`.
    pub fn from_non_empty(records: NonEmptyVec<ErrorRecord>) -> Self {
        Self(records)
    }

    /// Creates a container from a vec, or `None` if it is empty.
    pub fn from_vec(records: Vec<ErrorRecord>) -> Option<Self> {
        NonEmptyVec::from_vec(records).map(Self)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; kept for API symmetry.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn iter(&self) -> impl Iterator<Item = &ErrorRecord> {
        self.0.iter()
    }

    pub fn first(&self) -> &ErrorRecord {
        self.0.head()
    }

    /// Returns every record located exactly at `path`.
    pub fn at_path(&self, path: &Location) -> Vec<&ErrorRecord> {
        self.0.iter().filter(|e| &e.path == path).collect()
    }

    /// Returns every record of the given kind.
    pub fn with_kind(&self, kind: &str) -> Vec<&ErrorRecord> {
        self.0.iter().filter(|e| e.kind == kind).collect()
    }

    pub fn into_vec(self) -> Vec<ErrorRecord> {
        self.0.into_vec()
    }

    /// Renders the container in its wire shape: a JSON array of records.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Array(
            self.iter()
                .map(|record| serde_json::to_value(record).unwrap_or(serde_json::Value::Null))
                .collect(),
        )
    }
}

impl Semigroup for ValidationErrors {
    fn combine(self, other: Self) -> Self {
        ValidationErrors(self.0.combine(other.0))
    }
}

impl Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} validation error(s):", self.len())?;
        for record in self.iter() {
            writeln!(f, "  {}", record)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

impl IntoIterator for ValidationErrors {
    type Item = ErrorRecord;
    type IntoIter = std::vec::IntoIter<ErrorRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_vec().into_iter()
    }
}

const _: () = {
    const fn assert_send<T: Send>() {}
    const fn assert_sync<T: Sync>() {}
    assert_send::<ValidationErrors>();
    assert_sync::<ValidationErrors>();
};

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_messages() {
        let record = ErrorRecord::new(ErrorKind::ExtraForbidden, Location::root().push("x"));
        assert_eq!(record.message, "Extra inputs are not permitted");
        assert!(record.context.is_none());
    }

    #[test]
    fn test_context_renders_message() {
        let record = ErrorRecord::new(ErrorKind::StringTooShort, Location::root())
            .with_context("min_length", 3);
        assert_eq!(record.message, "String should have at least 3 characters");
    }

    #[test]
    fn test_custom_kind_template() {
        let mut context = ErrorContext::new();
        context.insert("error".into(), Value::from("not a prime"));
        let record = ErrorRecord::with_rendered_context(
            ErrorKind::Custom("prime".into()),
            Location::root(),
            context,
        );
        assert_eq!(record.kind, "prime");
        assert_eq!(record.message, "not a prime");
    }

    #[test]
    fn test_wire_shape() {
        let record = ErrorRecord::new(ErrorKind::IntType, Location::root().push("age").push(2))
            .with_input(Value::from("x"));
        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({
                "kind": "int_type",
                "path": ["age", 2],
                "message": "Input should be a valid integer",
                "input": "x"
            })
        );
    }

    #[test]
    fn test_redacted_wire_shape_omits_input() {
        let record = ErrorRecord::new(ErrorKind::IntType, Location::root())
            .with_input(Value::Int(1))
            .redacted();
        let wire = serde_json::to_value(&record).unwrap();
        assert!(wire.get("input").is_none());
    }

    #[test]
    fn test_container_combine_and_query() {
        let a = Location::root().push("a");
        let errors = ValidationErrors::single(ErrorRecord::new(ErrorKind::Missing, a.clone()))
            .combine(ValidationErrors::single(ErrorRecord::new(
                ErrorKind::IntType,
                Location::root().push("b"),
            )))
            .combine(ValidationErrors::single(ErrorRecord::new(
                ErrorKind::IntParsing,
                a.clone(),
            )));

        assert_eq!(errors.len(), 3);
        assert_eq!(errors.at_path(&a).len(), 2);
        assert_eq!(errors.with_kind("int_type").len(), 1);
        assert_eq!(errors.first().kind, ErrorKind::Missing);
        assert_eq!(errors.to_json().as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_from_empty_vec_is_none() {
        assert!(ValidationErrors::from_vec(Vec::new()).is_none());
    }

    #[test]
    fn test_display_lists_every_record() {
        let errors = ValidationErrors::single(ErrorRecord::new(
            ErrorKind::Missing,
            Location::root().push("name"),
        ));
        let text = errors.to_string();
        assert!(text.contains("1 validation error(s)"));
        assert!(text.contains("name: Field required"));
    }
}
