//! The dynamic value flowing through validation and serialization.
//!
//! Input arrives as a [`Value`] (usually converted from `serde_json::Value`),
//! validation produces a [`Value`] in which model-shaped data has become
//! [`Value::Model`], and serialization turns it back into plain dicts.

use std::fmt::{self, Display};
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

/// Insertion-ordered string-keyed map used for dicts, fields and extras.
pub type Dict = IndexMap<String, Value>;

/// A dynamically typed value.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Dict(Dict),
    /// A validated model instance.
    Model(Arc<ModelInstance>),
}

impl Value {
    /// Returns the short type name used in messages and serialization warnings.
    pub fn type_name(&self) -> &str {
        match self {
            Value::None => "none",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Dict(_) => "dict",
            Value::Model(m) => m.type_name(),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&Dict> {
        match self {
            Value::Dict(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_model(&self) -> Option<&Arc<ModelInstance>> {
        match self {
            Value::Model(m) => Some(m),
            _ => None,
        }
    }

    /// Looks up `key` in a dict, or a field or extra of a model instance.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Dict(d) => d.get(key),
            Value::Model(m) => m.get(key),
            _ => None,
        }
    }

    /// Converts into plain JSON. Model instances become objects holding
    /// their fields followed by their extras; non-finite floats become null.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::None => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Str(s) => serde_json::Value::String(s.clone()),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Dict(d) => serde_json::Value::Object(
                d.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
            Value::Model(m) => serde_json::Value::Object(
                m.fields()
                    .iter()
                    .chain(m.extra().iter())
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }

    /// Renders the value in a compact, repr-like form for messages.
    pub fn repr(&self) -> String {
        match self {
            Value::Str(s) => format!("'{}'", s),
            other => other.to_string(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Dict(a), Value::Dict(b)) => a == b,
            (Value::Model(a), Value::Model(b)) => Arc::ptr_eq(a, b) || a == b,
            _ => false,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "None"),
            Value::Bool(true) => write!(f, "True"),
            Value::Bool(false) => write!(f, "False"),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{:?}", x),
            Value::Str(s) => write!(f, "{}", s),
            Value::List(_) | Value::Dict(_) => write!(f, "{}", self.to_json()),
            Value::Model(m) => {
                write!(f, "{}(", m.type_name())?;
                for (i, (k, v)) in m.fields().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}={}", k, v.repr())?;
                }
                write!(f, ")")
            }
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::None,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Dict(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<Dict> for Value {
    fn from(d: Dict) -> Self {
        Value::Dict(d)
    }
}

impl From<ModelInstance> for Value {
    fn from(m: ModelInstance) -> Self {
        Value::Model(Arc::new(m))
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::None => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::Str(s) => serializer.serialize_str(s),
            Value::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Dict(d) => {
                let mut map = serializer.serialize_map(Some(d.len()))?;
                for (k, v) in d {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
            Value::Model(m) => {
                let mut map =
                    serializer.serialize_map(Some(m.fields().len() + m.extra().len()))?;
                for (k, v) in m.fields().iter().chain(m.extra().iter()) {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}

/// A validated instance of a model.
///
/// `type_name` is the id of the model node that produced it (or of a richer
/// subtype), which lets the serializer find the runtime field set when duck
/// typing is requested.
#[derive(Debug, Clone)]
pub struct ModelInstance {
    type_name: String,
    fields: Dict,
    fields_set: IndexSet<String>,
    extra: Dict,
}

impl ModelInstance {
    /// Creates an instance whose every field counts as explicitly set.
    pub fn new(type_name: impl Into<String>, fields: Dict) -> Self {
        let fields_set = fields.keys().cloned().collect();
        Self {
            type_name: type_name.into(),
            fields,
            fields_set,
            extra: Dict::new(),
        }
    }

    pub(crate) fn from_parts(
        type_name: String,
        fields: Dict,
        fields_set: IndexSet<String>,
        extra: Dict,
    ) -> Self {
        Self {
            type_name,
            fields,
            fields_set,
            extra,
        }
    }

    /// Replaces the set of explicitly supplied fields.
    pub fn with_fields_set<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields_set = names.into_iter().map(Into::into).collect();
        self
    }

    /// Adds captured extra entries.
    pub fn with_extra(mut self, extra: Dict) -> Self {
        self.extra = extra;
        self
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn fields(&self) -> &Dict {
        &self.fields
    }

    pub fn fields_set(&self) -> &IndexSet<String> {
        &self.fields_set
    }

    pub fn extra(&self) -> &Dict {
        &self.extra
    }

    /// Looks up a field, falling back to captured extras.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name).or_else(|| self.extra.get(name))
    }
}

impl PartialEq for ModelInstance {
    fn eq(&self, other: &Self) -> bool {
        self.type_name == other.type_name
            && self.fields == other.fields
            && self.extra == other.extra
    }
}
