//! Scalar schema validation.
//!
//! This module provides [`ScalarSchema`] for the leaf types (`any`, `none`,
//! `bool`, `int`, `float`, `str` and literals) together with their
//! [`Constraints`]. Coercion follows the lax/strict split: strict mode only
//! accepts the exact runtime type, lax mode also accepts well-formed
//! conversions (numeric strings, whole floats, `"yes"`/`"no"` and so on).

use std::cmp::Ordering;
use std::fmt;

use regex::Regex;

use crate::error::{ErrorAccumulator, ErrorKind, ErrorRecord, StageError, ValidationErrors};
use crate::path::Location;
use crate::validator::Exactness;
use crate::value::Value;

/// The leaf type a [`ScalarSchema`] checks for.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarKind {
    Any,
    None,
    Bool,
    Int,
    Float,
    Str,
    /// One of a fixed set of values.
    Literal(Vec<Value>),
}

impl ScalarKind {
    /// Short name used as a union member label.
    pub fn label(&self) -> String {
        match self {
            ScalarKind::Any => "any".to_string(),
            ScalarKind::None => "none".to_string(),
            ScalarKind::Bool => "bool".to_string(),
            ScalarKind::Int => "int".to_string(),
            ScalarKind::Float => "float".to_string(),
            ScalarKind::Str => "str".to_string(),
            ScalarKind::Literal(values) => {
                let inner: Vec<String> = values.iter().map(Value::repr).collect();
                format!("literal[{}]", inner.join(","))
            }
        }
    }
}

/// A compiled regex together with its source text.
#[derive(Clone)]
pub struct Pattern {
    regex: Regex,
    source: String,
}

impl Pattern {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            regex: Regex::new(pattern)?,
            source: pattern.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, s: &str) -> bool {
        self.regex.is_match(s)
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pattern({:?})", self.source)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

/// Checks applied after a value has been coerced to its kind.
///
/// Lengths apply to strings (characters) and to sequences and mappings
/// (items); bounds apply to numbers and are kept as the original values so
/// messages show them as declared.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Constraints {
    /// Overrides the call's strictness for this node.
    pub strict: Option<bool>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub pattern: Option<Pattern>,
    pub gt: Option<Value>,
    pub ge: Option<Value>,
    pub lt: Option<Value>,
    pub le: Option<Value>,
    pub multiple_of: Option<Value>,
}

impl Constraints {
    /// Checks item counts of a sequence or mapping.
    pub(crate) fn check_items(
        &self,
        field_type: &str,
        actual: usize,
        path: &Location,
        input: &Value,
        acc: &mut ErrorAccumulator,
    ) {
        if let Some(min) = self.min_length {
            if actual < min {
                acc.push(
                    ErrorRecord::new(ErrorKind::TooShort, path.clone())
                        .with_context("field_type", field_type)
                        .with_context("min_length", min as i64)
                        .with_context("actual_length", actual as i64)
                        .with_input(input.clone()),
                );
            }
        }
        if let Some(max) = self.max_length {
            if actual > max {
                acc.push(
                    ErrorRecord::new(ErrorKind::TooLong, path.clone())
                        .with_context("field_type", field_type)
                        .with_context("max_length", max as i64)
                        .with_context("actual_length", actual as i64)
                        .with_input(input.clone()),
                );
            }
        }
    }

    fn check_str(&self, s: &str, path: &Location, input: &Value, acc: &mut ErrorAccumulator) {
        let len = s.chars().count();
        if let Some(min) = self.min_length {
            if len < min {
                acc.push(
                    ErrorRecord::new(ErrorKind::StringTooShort, path.clone())
                        .with_context("min_length", min as i64)
                        .with_input(input.clone()),
                );
            }
        }
        if let Some(max) = self.max_length {
            if len > max {
                acc.push(
                    ErrorRecord::new(ErrorKind::StringTooLong, path.clone())
                        .with_context("max_length", max as i64)
                        .with_input(input.clone()),
                );
            }
        }
        if let Some(pattern) = &self.pattern {
            if !pattern.is_match(s) {
                acc.push(
                    ErrorRecord::new(ErrorKind::StringPatternMismatch, path.clone())
                        .with_context("pattern", pattern.as_str())
                        .with_input(input.clone()),
                );
            }
        }
    }

    fn check_number(&self, n: &Value, path: &Location, input: &Value, acc: &mut ErrorAccumulator) {
        let bounds = [
            (&self.gt, ErrorKind::GreaterThan, "gt", Ordering::Greater, false),
            (&self.ge, ErrorKind::GreaterThanEqual, "ge", Ordering::Greater, true),
            (&self.lt, ErrorKind::LessThan, "lt", Ordering::Less, false),
            (&self.le, ErrorKind::LessThanEqual, "le", Ordering::Less, true),
        ];
        for (bound, kind, key, wanted, or_equal) in bounds {
            let Some(bound) = bound else { continue };
            let ok = match compare_numbers(n, bound) {
                Some(Ordering::Equal) => or_equal,
                Some(ord) => ord == wanted,
                None => false,
            };
            if !ok {
                acc.push(
                    ErrorRecord::new(kind, path.clone())
                        .with_context(key, bound.clone())
                        .with_input(input.clone()),
                );
            }
        }
        if let Some(multiple_of) = &self.multiple_of {
            if !is_multiple_of(n, multiple_of) {
                acc.push(
                    ErrorRecord::new(ErrorKind::MultipleOf, path.clone())
                        .with_context("multiple_of", multiple_of.clone())
                        .with_input(input.clone()),
                );
            }
        }
    }
}

fn compare_numbers(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Some(x.cmp(y)),
        _ => a.as_f64()?.partial_cmp(&b.as_f64()?),
    }
}

fn is_multiple_of(n: &Value, m: &Value) -> bool {
    match (n, m) {
        (Value::Int(_), Value::Int(0)) => false,
        (Value::Int(x), Value::Int(y)) => x.checked_rem(*y).map_or(true, |r| r == 0),
        _ => match (n.as_f64(), m.as_f64()) {
            (Some(x), Some(y)) if y != 0.0 => {
                let rem = x % y;
                let threshold = x.abs() / 1e9;
                rem.abs() <= threshold || (rem - y).abs() <= threshold
            }
            _ => false,
        },
    }
}

/// A schema for validating leaf values.
///
/// # Example
///
/// ```rust
/// use schemata::{CompiledSchema, Schema, Value};
///
/// let schema = CompiledSchema::new(Schema::int().ge(0).lt(10)).unwrap();
///
/// let result = schema.validate(&Value::from("7")).unwrap();
/// assert_eq!(result.into_result().unwrap(), Value::Int(7));
///
/// let result = schema.validate(&Value::Int(12)).unwrap();
/// assert!(result.is_failure());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarSchema {
    pub kind: ScalarKind,
    pub constraints: Constraints,
}

impl ScalarSchema {
    /// Creates an unconstrained schema of the given kind.
    pub fn new(kind: ScalarKind) -> Self {
        Self {
            kind,
            constraints: Constraints::default(),
        }
    }

    /// Overrides the call's strictness for this node.
    pub fn strict(mut self, strict: bool) -> Self {
        self.constraints.strict = Some(strict);
        self
    }

    /// Requires at least `min` characters.
    pub fn min_length(mut self, min: usize) -> Self {
        self.constraints.min_length = Some(min);
        self
    }

    /// Allows at most `max` characters.
    pub fn max_length(mut self, max: usize) -> Self {
        self.constraints.max_length = Some(max);
        self
    }

    /// Requires strings to match a regex.
    ///
    /// Returns an error if the regex pattern is invalid.
    ///
    /// # Example
    ///
    /// ```rust
    /// use schemata::Schema;
    ///
    /// assert!(Schema::str().pattern(r"^\d+$").is_ok());
    /// assert!(Schema::str().pattern(r"(unclosed").is_err());
    /// ```
    pub fn pattern(mut self, pattern: &str) -> Result<Self, regex::Error> {
        self.constraints.pattern = Some(Pattern::new(pattern)?);
        Ok(self)
    }

    pub fn gt(mut self, bound: impl Into<Value>) -> Self {
        self.constraints.gt = Some(bound.into());
        self
    }

    pub fn ge(mut self, bound: impl Into<Value>) -> Self {
        self.constraints.ge = Some(bound.into());
        self
    }

    pub fn lt(mut self, bound: impl Into<Value>) -> Self {
        self.constraints.lt = Some(bound.into());
        self
    }

    pub fn le(mut self, bound: impl Into<Value>) -> Self {
        self.constraints.le = Some(bound.into());
        self
    }

    pub fn multiple_of(mut self, factor: impl Into<Value>) -> Self {
        self.constraints.multiple_of = Some(factor.into());
        self
    }

    /// Coerces `input` to this kind and applies the constraints.
    ///
    /// Returns the validated value and how exactly the input matched.
    pub(crate) fn validate(
        &self,
        input: &Value,
        strict: bool,
        path: &Location,
    ) -> Result<(Value, Exactness), StageError> {
        let strict = self.constraints.strict.unwrap_or(strict);
        let (value, exactness) = self
            .coerce(input, strict)
            .map_err(|kind| self.type_error(kind, path, input))?;

        let mut acc = ErrorAccumulator::new();
        match &value {
            Value::Str(s) => self.constraints.check_str(s, path, input, &mut acc),
            Value::Int(_) | Value::Float(_) => {
                self.constraints.check_number(&value, path, input, &mut acc)
            }
            _ => {}
        }
        acc.into_result((value, exactness))
    }

    fn type_error(&self, kind: ErrorKind, path: &Location, input: &Value) -> StageError {
        let mut record = ErrorRecord::new(kind, path.clone());
        if let ScalarKind::Literal(expected) = &self.kind {
            record = record.with_context("expected", expected_literals(expected));
        }
        StageError::Invalid(ValidationErrors::single(record.with_input(input.clone())))
    }

    fn coerce(&self, input: &Value, strict: bool) -> Result<(Value, Exactness), ErrorKind> {
        use Exactness::{Exact, Lax, Strict};

        match (&self.kind, input) {
            (ScalarKind::Any, v) => Ok((v.clone(), Exact)),

            (ScalarKind::None, Value::None) => Ok((Value::None, Exact)),
            (ScalarKind::None, _) => Err(ErrorKind::NoneRequired),

            (ScalarKind::Bool, Value::Bool(b)) => Ok((Value::Bool(*b), Exact)),
            (ScalarKind::Bool, _) if strict => Err(ErrorKind::BoolType),
            (ScalarKind::Bool, Value::Int(0)) => Ok((Value::Bool(false), Lax)),
            (ScalarKind::Bool, Value::Int(1)) => Ok((Value::Bool(true), Lax)),
            (ScalarKind::Bool, Value::Int(_)) => Err(ErrorKind::BoolParsing),
            (ScalarKind::Bool, Value::Float(f)) if *f == 0.0 => Ok((Value::Bool(false), Lax)),
            (ScalarKind::Bool, Value::Float(f)) if *f == 1.0 => Ok((Value::Bool(true), Lax)),
            (ScalarKind::Bool, Value::Float(_)) => Err(ErrorKind::BoolParsing),
            (ScalarKind::Bool, Value::Str(s)) => parse_bool(s)
                .map(|b| (Value::Bool(b), Lax))
                .ok_or(ErrorKind::BoolParsing),
            (ScalarKind::Bool, _) => Err(ErrorKind::BoolType),

            (ScalarKind::Int, Value::Int(i)) => Ok((Value::Int(*i), Exact)),
            (ScalarKind::Int, _) if strict => Err(ErrorKind::IntType),
            (ScalarKind::Int, Value::Bool(b)) => Ok((Value::Int(i64::from(*b)), Lax)),
            (ScalarKind::Int, Value::Float(f)) => float_to_int(*f).map(|i| (Value::Int(i), Lax)),
            (ScalarKind::Int, Value::Str(s)) => s
                .trim()
                .parse::<i64>()
                .map(|i| (Value::Int(i), Lax))
                .map_err(|_| ErrorKind::IntParsing),
            (ScalarKind::Int, _) => Err(ErrorKind::IntType),

            (ScalarKind::Float, Value::Float(f)) => Ok((Value::Float(*f), Exact)),
            (ScalarKind::Float, Value::Int(i)) => Ok((Value::Float(*i as f64), Strict)),
            (ScalarKind::Float, _) if strict => Err(ErrorKind::FloatType),
            (ScalarKind::Float, Value::Bool(b)) => Ok((Value::Float(if *b { 1.0 } else { 0.0 }), Lax)),
            (ScalarKind::Float, Value::Str(s)) => s
                .trim()
                .parse::<f64>()
                .map(|f| (Value::Float(f), Lax))
                .map_err(|_| ErrorKind::FloatParsing),
            (ScalarKind::Float, _) => Err(ErrorKind::FloatType),

            (ScalarKind::Str, Value::Str(s)) => Ok((Value::Str(s.clone()), Exact)),
            (ScalarKind::Str, _) => Err(ErrorKind::StringType),

            (ScalarKind::Literal(expected), v) => {
                if expected.iter().any(|e| e == v) {
                    Ok((v.clone(), Exact))
                } else {
                    Err(ErrorKind::LiteralError)
                }
            }
        }
    }
}

fn float_to_int(f: f64) -> Result<i64, ErrorKind> {
    if !f.is_finite() {
        return Err(ErrorKind::IntParsing);
    }
    if f.fract() != 0.0 {
        return Err(ErrorKind::IntFromFloat);
    }
    // i64::MAX rounds up to 2^63 as f64, so the upper bound is exclusive.
    if f < i64::MIN as f64 || f >= 9_223_372_036_854_775_808.0 {
        return Err(ErrorKind::IntParsing);
    }
    Ok(f as i64)
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "on" | "1" => Some(true),
        "false" | "f" | "no" | "n" | "off" | "0" => Some(false),
        _ => None,
    }
}

/// Renders literal choices as `'a', 'b' or 'c'`.
pub(crate) fn expected_literals(values: &[Value]) -> String {
    let reprs: Vec<String> = values.iter().map(Value::repr).collect();
    match reprs.split_last() {
        None => String::new(),
        Some((last, [])) => last.clone(),
        Some((last, rest)) => format!("{} or {}", rest.join(", "), last),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Schema;

    fn ok(schema: &ScalarSchema, input: Value, strict: bool) -> (Value, Exactness) {
        schema
            .validate(&input, strict, &Location::root())
            .unwrap_or_else(|e| panic!("expected success, got {e}"))
    }

    fn kinds(schema: &ScalarSchema, input: Value, strict: bool) -> Vec<String> {
        match schema.validate(&input, strict, &Location::root()) {
            Err(StageError::Invalid(errors)) => errors.iter().map(|e| e.kind.to_string()).collect(),
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn test_int_coercion() {
        let int = Schema::int();
        assert_eq!(ok(&int, Value::Int(3), false), (Value::Int(3), Exactness::Exact));
        assert_eq!(ok(&int, Value::from(" 42 "), false), (Value::Int(42), Exactness::Lax));
        assert_eq!(ok(&int, Value::Float(2.0), false), (Value::Int(2), Exactness::Lax));
        assert_eq!(kinds(&int, Value::Float(2.5), false), vec!["int_from_float"]);
        assert_eq!(kinds(&int, Value::from("x"), false), vec!["int_parsing"]);
        assert_eq!(kinds(&int, Value::from("42"), true), vec!["int_type"]);
    }

    #[test]
    fn test_float_accepts_int_at_strict_tier() {
        let float = Schema::float();
        assert_eq!(ok(&float, Value::Int(1), true), (Value::Float(1.0), Exactness::Strict));
        assert_eq!(ok(&float, Value::from("1.5"), false).0, Value::Float(1.5));
        assert_eq!(kinds(&float, Value::from("abc"), false), vec!["float_parsing"]);
    }

    #[test]
    fn test_bool_coercion() {
        let b = Schema::bool();
        assert_eq!(ok(&b, Value::from("yes"), false).0, Value::Bool(true));
        assert_eq!(ok(&b, Value::Int(0), false).0, Value::Bool(false));
        assert_eq!(kinds(&b, Value::Int(2), false), vec!["bool_parsing"]);
        assert_eq!(kinds(&b, Value::from("maybe"), false), vec!["bool_parsing"]);
        assert_eq!(kinds(&b, Value::Int(1), true), vec!["bool_type"]);
    }

    #[test]
    fn test_str_is_never_coerced() {
        assert_eq!(kinds(&Schema::str(), Value::Int(1), false), vec!["string_type"]);
    }

    #[test]
    fn test_node_strict_overrides_call() {
        let int = Schema::int().strict(true);
        assert_eq!(kinds(&int, Value::from("1"), false), vec!["int_type"]);
        let lax = Schema::int().strict(false);
        assert_eq!(ok(&lax, Value::from("1"), true).0, Value::Int(1));
    }

    #[test]
    fn test_string_constraints_accumulate() {
        let s = Schema::str().min_length(3).pattern("^[a-z]+$").unwrap();
        let found = kinds(&s, Value::from("A"), false);
        assert_eq!(found, vec!["string_too_short", "string_pattern_mismatch"]);
    }

    #[test]
    fn test_numeric_bounds() {
        let n = Schema::int().gt(0).le(10).multiple_of(2);
        assert!(n.validate(&Value::Int(4), false, &Location::root()).is_ok());
        assert_eq!(kinds(&n, Value::Int(0), false), vec!["greater_than"]);
        assert_eq!(kinds(&n, Value::Int(11), false), vec!["less_than_equal", "multiple_of"]);

        let f = Schema::float().multiple_of(0.1);
        assert!(f.validate(&Value::Float(0.3), false, &Location::root()).is_ok());
    }

    #[test]
    fn test_bound_message_uses_declared_value() {
        let n = Schema::float().ge(1.5);
        match n.validate(&Value::Float(1.0), false, &Location::root()) {
            Err(StageError::Invalid(errors)) => {
                assert_eq!(errors.first().message, "Input should be greater than or equal to 1.5")
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_literal() {
        let lit = Schema::literal(["cat", "dog"]);
        assert_eq!(ok(&lit, Value::from("cat"), false).1, Exactness::Exact);
        match lit.validate(&Value::from("fish"), false, &Location::root()) {
            Err(StageError::Invalid(errors)) => {
                assert_eq!(errors.first().kind, "literal_error");
                assert_eq!(errors.first().message, "Input should be 'cat' or 'dog'");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_expected_literals_formatting() {
        let values = vec![Value::from("a"), Value::from("b"), Value::Int(3)];
        assert_eq!(expected_literals(&values), "'a', 'b' or 3");
        assert_eq!(expected_literals(&values[..1]), "'a'");
    }
}
