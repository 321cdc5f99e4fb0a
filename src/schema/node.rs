//! The schema tree.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::alias::AliasPath;
use crate::chain::{Next, StageInfo, ValidatorChain, ValidatorStage};
use crate::error::StageError;
use crate::serializer::{SerializeInfo, SerializeNext, SerializerStage};
use crate::value::Value;

use super::model::ModelSchema;
use super::scalar::{Constraints, ScalarKind, ScalarSchema};

/// Stable id of a node registered in a [`SchemaRegistry`](crate::SchemaRegistry).
pub type NodeId = String;

/// An immutable description of one type.
///
/// Children are shared behind `Arc`; recursive shapes go through
/// [`SchemaNode::Ref`], which is resolved against the compiled arena at
/// validation time.
#[derive(Debug, Clone)]
pub enum SchemaNode {
    Scalar(ScalarSchema),
    Sequence(SequenceSchema),
    Mapping(MappingSchema),
    Model(ModelSchema),
    Union(UnionSchema),
    Wrapped(WrappedSchema),
    Ref(NodeId),
}

impl SchemaNode {
    /// Label used as the error path segment when this node is a union member.
    pub fn label(&self) -> String {
        match self {
            SchemaNode::Scalar(s) => s.kind.label(),
            SchemaNode::Sequence(s) => format!("list[{}]", s.item.label()),
            SchemaNode::Mapping(m) => format!("dict[{},{}]", m.key.label(), m.value.label()),
            SchemaNode::Model(m) => m.name.clone(),
            SchemaNode::Union(u) => {
                let members: Vec<String> = u.members.iter().map(UnionMember::label).collect();
                format!("union[{}]", members.join(","))
            }
            SchemaNode::Wrapped(w) => w.inner.label(),
            SchemaNode::Ref(id) => id.clone(),
        }
    }

    /// Visits this node and every node nested in it, without following
    /// references.
    pub fn walk<'n>(&'n self, visit: &mut dyn FnMut(&'n SchemaNode)) {
        visit(self);
        match self {
            SchemaNode::Scalar(_) | SchemaNode::Ref(_) => {}
            SchemaNode::Sequence(s) => s.item.walk(visit),
            SchemaNode::Mapping(m) => {
                m.key.walk(visit);
                m.value.walk(visit);
            }
            SchemaNode::Model(m) => {
                for field in &m.fields {
                    field.schema.walk(visit);
                }
                if let Some(extras) = &m.extras_schema {
                    extras.walk(visit);
                }
            }
            SchemaNode::Union(u) => {
                for member in &u.members {
                    member.schema.walk(visit);
                }
            }
            SchemaNode::Wrapped(w) => w.inner.walk(visit),
        }
    }

    /// Ids of every reference reachable without following references.
    pub fn refs(&self) -> Vec<NodeId> {
        let mut found = Vec::new();
        self.walk(&mut |node| {
            if let SchemaNode::Ref(id) = node {
                found.push(id.clone());
            }
        });
        found
    }

    /// The model this node describes, looking through wrappers.
    pub fn as_model(&self) -> Option<&ModelSchema> {
        match self {
            SchemaNode::Model(m) => Some(m),
            SchemaNode::Wrapped(w) => w.inner.as_model(),
            _ => None,
        }
    }
}

macro_rules! impl_into_node {
    ($($schema:ident => $variant:ident),* $(,)?) => {
        $(
            impl From<$schema> for SchemaNode {
                fn from(schema: $schema) -> Self {
                    SchemaNode::$variant(schema)
                }
            }

            impl From<$schema> for UnionMember {
                fn from(schema: $schema) -> Self {
                    UnionMember::new(schema)
                }
            }
        )*
    };
}

impl_into_node! {
    ScalarSchema => Scalar,
    SequenceSchema => Sequence,
    MappingSchema => Mapping,
    ModelSchema => Model,
    UnionSchema => Union,
    WrappedSchema => Wrapped,
}

impl From<SchemaNode> for UnionMember {
    fn from(schema: SchemaNode) -> Self {
        UnionMember::new(schema)
    }
}

/// A homogeneous list.
#[derive(Debug, Clone)]
pub struct SequenceSchema {
    pub item: Arc<SchemaNode>,
    pub constraints: Constraints,
    /// Stop at the first failing element instead of collecting them all.
    pub fail_fast: bool,
}

impl SequenceSchema {
    pub fn new(item: impl Into<SchemaNode>) -> Self {
        Self {
            item: Arc::new(item.into()),
            constraints: Constraints::default(),
            fail_fast: false,
        }
    }

    pub fn min_length(mut self, min: usize) -> Self {
        self.constraints.min_length = Some(min);
        self
    }

    pub fn max_length(mut self, max: usize) -> Self {
        self.constraints.max_length = Some(max);
        self
    }

    pub fn fail_fast(mut self) -> Self {
        self.fail_fast = true;
        self
    }
}

/// A string-keyed mapping with typed keys and values.
#[derive(Debug, Clone)]
pub struct MappingSchema {
    pub key: Arc<SchemaNode>,
    pub value: Arc<SchemaNode>,
    pub constraints: Constraints,
}

impl MappingSchema {
    pub fn new(key: impl Into<SchemaNode>, value: impl Into<SchemaNode>) -> Self {
        Self {
            key: Arc::new(key.into()),
            value: Arc::new(value.into()),
            constraints: Constraints::default(),
        }
    }

    pub fn min_length(mut self, min: usize) -> Self {
        self.constraints.min_length = Some(min);
        self
    }

    pub fn max_length(mut self, max: usize) -> Self {
        self.constraints.max_length = Some(max);
        self
    }
}

/// A literal discriminator value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum Tag {
    Str(String),
    Int(i64),
    Bool(bool),
}

impl Tag {
    /// Reads a tag out of a value; only strings, ints and bools qualify.
    pub fn from_value(value: &Value) -> Option<Tag> {
        match value {
            Value::Str(s) => Some(Tag::Str(s.clone())),
            Value::Int(i) => Some(Tag::Int(*i)),
            Value::Bool(b) => Some(Tag::Bool(*b)),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Tag::Str(s) => Value::Str(s.clone()),
            Tag::Int(i) => Value::Int(*i),
            Tag::Bool(b) => Value::Bool(*b),
        }
    }

    pub(crate) fn repr(&self) -> String {
        self.to_value().repr()
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_value())
    }
}

impl From<&str> for Tag {
    fn from(s: &str) -> Self {
        Tag::Str(s.to_string())
    }
}

impl From<String> for Tag {
    fn from(s: String) -> Self {
        Tag::Str(s)
    }
}

impl From<i64> for Tag {
    fn from(i: i64) -> Self {
        Tag::Int(i)
    }
}

impl From<i32> for Tag {
    fn from(i: i32) -> Self {
        Tag::Int(i64::from(i))
    }
}

impl From<bool> for Tag {
    fn from(b: bool) -> Self {
        Tag::Bool(b)
    }
}

pub type DiscriminatorFn = Arc<dyn Fn(&Value) -> Option<Value> + Send + Sync>;

/// Extracts the tag of a discriminated union's input.
#[derive(Clone)]
pub enum Discriminator {
    /// Reads a key of a dict or an attribute of a model instance.
    Field(AliasPath),
    /// Calls a function; `None` means no tag could be found.
    Callable { name: String, func: DiscriminatorFn },
}

impl Discriminator {
    pub fn field(name: impl Into<String>) -> Self {
        Discriminator::Field(AliasPath::new(name))
    }

    pub fn path(path: AliasPath) -> Self {
        Discriminator::Field(path)
    }

    pub fn callable<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Value) -> Option<Value> + Send + Sync + 'static,
    {
        Discriminator::Callable {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    /// How the discriminator is named in error messages, e.g. `'kind'`.
    pub fn describe(&self) -> String {
        match self {
            Discriminator::Field(path) => {
                let parts: Vec<String> = path
                    .items()
                    .iter()
                    .map(|item| match item.as_key() {
                        Some(key) => format!("'{}'", key),
                        None => item.to_string(),
                    })
                    .collect();
                parts.join(".")
            }
            Discriminator::Callable { name, .. } => format!("{}()", name),
        }
    }

    /// Extracts the raw tag value.
    pub(crate) fn extract(&self, input: &Value) -> Option<Value> {
        match self {
            Discriminator::Field(path) => path.lookup(input).cloned(),
            Discriminator::Callable { func, .. } => func(input),
        }
    }
}

impl fmt::Debug for Discriminator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Discriminator({})", self.describe())
    }
}

/// How an untagged union picks its member.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnionMode {
    /// Best match by populated fields, then exactness.
    #[default]
    Smart,
    /// First member that validates.
    LeftToRight,
}

/// One alternative of a union.
#[derive(Debug, Clone)]
pub struct UnionMember {
    pub schema: Arc<SchemaNode>,
    pub tags: Vec<Tag>,
    label: Option<String>,
}

impl UnionMember {
    pub fn new(schema: impl Into<SchemaNode>) -> Self {
        Self {
            schema: Arc::new(schema.into()),
            tags: Vec::new(),
            label: None,
        }
    }

    /// Maps another tag to this member.
    pub fn tag(mut self, tag: impl Into<Tag>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Overrides the error path segment for this member.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn label(&self) -> String {
        self.label.clone().unwrap_or_else(|| self.schema.label())
    }
}

/// A choice between alternatives.
///
/// With a [`Discriminator`] the union is tagged: only the member mapped to
/// the input's tag is validated. Otherwise [`UnionMode`] decides.
///
/// # Example
///
/// ```rust
/// use schemata::{CompiledSchema, Schema, Value};
///
/// let schema = CompiledSchema::new(Schema::union([Schema::int(), Schema::str()])).unwrap();
///
/// // "1" is a valid str as-is, so it is not coerced to an int
/// let result = schema.validate(&Value::from("1")).unwrap();
/// assert_eq!(result.into_result().unwrap(), Value::from("1"));
/// ```
#[derive(Debug, Clone)]
pub struct UnionSchema {
    pub members: Vec<UnionMember>,
    pub mode: UnionMode,
    pub discriminator: Option<Discriminator>,
    tag_index: HashMap<Tag, usize>,
}

impl UnionSchema {
    pub fn new<I, M>(members: I) -> Self
    where
        I: IntoIterator<Item = M>,
        M: Into<UnionMember>,
    {
        Self {
            members: members.into_iter().map(Into::into).collect(),
            mode: UnionMode::Smart,
            discriminator: None,
            tag_index: HashMap::new(),
        }
    }

    pub fn mode(mut self, mode: UnionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn left_to_right(self) -> Self {
        self.mode(UnionMode::LeftToRight)
    }

    /// Makes this a tagged union.
    ///
    /// Members without explicit tags whose schema is a model with a literal
    /// field at the discriminator key get that literal's values as tags.
    pub fn discriminator(mut self, discriminator: Discriminator) -> Self {
        if let Discriminator::Field(path) = &discriminator {
            if let (Some(key), 1) = (path.first_key(), path.items().len()) {
                for member in &mut self.members {
                    if member.tags.is_empty() {
                        member.tags = inferred_tags(&member.schema, key);
                    }
                }
            }
        }
        self.discriminator = Some(discriminator);
        self.index_tags();
        self
    }

    /// Index of the member a tag maps to.
    pub fn member_for(&self, tag: &Tag) -> Option<usize> {
        self.tag_index.get(tag).copied()
    }

    /// Every mapped tag, in member order.
    pub fn expected_tags(&self) -> Vec<&Tag> {
        self.members.iter().flat_map(|m| m.tags.iter()).collect()
    }

    fn index_tags(&mut self) {
        self.tag_index.clear();
        for (idx, member) in self.members.iter().enumerate() {
            for tag in &member.tags {
                self.tag_index.entry(tag.clone()).or_insert(idx);
            }
        }
    }
}

fn inferred_tags(schema: &SchemaNode, key: &str) -> Vec<Tag> {
    let Some(model) = schema.as_model() else {
        return Vec::new();
    };
    let field = model.resolved_fields().find(|(f, aliases)| {
        f.name == key || aliases.validation.first().and_then(AliasPath::first_key) == Some(key)
    });
    match field.map(|(f, _)| f.schema.as_ref()) {
        Some(SchemaNode::Scalar(ScalarSchema {
            kind: ScalarKind::Literal(values),
            ..
        })) => values.iter().filter_map(Tag::from_value).collect(),
        _ => Vec::new(),
    }
}

/// A node with validator stages and an optional custom serializer.
///
/// # Example
///
/// ```rust
/// use schemata::{CompiledSchema, Schema, Value};
///
/// let trimmed = Schema::wrapped(Schema::str().min_length(1))
///     .before(|v, _| Ok(match v {
///         Value::Str(s) => Value::Str(s.trim().to_string()),
///         other => other,
///     }));
///
/// let schema = CompiledSchema::new(trimmed).unwrap();
/// assert!(schema.validate(&Value::from("   ")).unwrap().is_failure());
/// ```
#[derive(Debug, Clone)]
pub struct WrappedSchema {
    pub inner: Arc<SchemaNode>,
    pub chain: ValidatorChain,
    pub serializer: Option<SerializerStage>,
}

impl WrappedSchema {
    pub fn new(inner: impl Into<SchemaNode>) -> Self {
        Self {
            inner: Arc::new(inner.into()),
            chain: ValidatorChain::new(),
            serializer: None,
        }
    }

    /// Appends a stage; later stages run outside earlier ones.
    pub fn stage(mut self, stage: ValidatorStage) -> Self {
        self.chain.push(stage);
        self
    }

    pub fn before<F>(self, f: F) -> Self
    where
        F: Fn(Value, &StageInfo<'_>) -> Result<Value, StageError> + Send + Sync + 'static,
    {
        self.stage(ValidatorStage::before(f))
    }

    pub fn after<F>(self, f: F) -> Self
    where
        F: Fn(Value, &StageInfo<'_>) -> Result<Value, StageError> + Send + Sync + 'static,
    {
        self.stage(ValidatorStage::after(f))
    }

    pub fn wrap<F>(self, f: F) -> Self
    where
        F: Fn(Value, &mut Next<'_>, &StageInfo<'_>) -> Result<Value, StageError>
            + Send
            + Sync
            + 'static,
    {
        self.stage(ValidatorStage::wrap(f))
    }

    pub fn plain<F>(self, f: F) -> Self
    where
        F: Fn(Value, &StageInfo<'_>) -> Result<Value, StageError> + Send + Sync + 'static,
    {
        self.stage(ValidatorStage::plain(f))
    }

    /// Replaces how the inner node is dumped.
    pub fn serialize_plain<F>(mut self, f: F) -> Self
    where
        F: Fn(Value, &SerializeInfo<'_>) -> Result<Value, StageError> + Send + Sync + 'static,
    {
        self.serializer = Some(SerializerStage::plain(f));
        self
    }

    /// Wraps how the inner node is dumped.
    pub fn serialize_wrap<F>(mut self, f: F) -> Self
    where
        F: Fn(Value, &mut SerializeNext<'_>, &SerializeInfo<'_>) -> Result<Value, StageError>
            + Send
            + Sync
            + 'static,
    {
        self.serializer = Some(SerializerStage::wrap(f));
        self
    }
}
