//! Serialization of validated values.
//!
//! [`SerializationRunner`] mirrors validation: it walks the declared schema
//! alongside a value and turns model instances back into dicts, applying
//! aliases, include/exclude [`Selector`]s and the `exclude_*` filters.
//!
//! By default the declared schema decides which fields are emitted. With duck
//! typing (`serialize_as_any`, a field's `serialize_as`, or a model's config)
//! the runtime instance's own model is looked up in the arena instead, and the
//! choice carries down until a node asks for [`SerializeAs::Declared`].

mod selector;
mod stage;

pub use selector::{Selector, ALL};
pub use stage::{PlainSerializeFn, SerializeInfo, SerializeNext, SerializerStage, WrapSerializeFn};

use serde::{Deserialize, Serialize};

use crate::error::{SchemaFault, StageError};
use crate::registry::SchemaArena;
use crate::schema::{
    ModelSchema, ScalarKind, SchemaNode, SerializeAs, Tag, UnionSchema, WrappedSchema,
};
use crate::value::{Dict, ModelInstance, Value};

use selector::Filters;

/// Output flavor of a dump.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DumpMode {
    /// Structured values; models become dicts.
    #[default]
    Python,
    /// JSON-compatible values only.
    Json,
}

/// Per-call serialization options.
///
/// # Example
///
/// ```rust
/// use schemata::{DumpOptions, Selector};
///
/// let options = DumpOptions::new()
///     .by_alias(true)
///     .exclude(Selector::keys(["password"]))
///     .exclude_none(true);
///
/// assert!(options.by_alias);
/// ```
#[derive(Debug, Clone, Default)]
pub struct DumpOptions {
    pub by_alias: bool,
    pub include: Option<Selector>,
    pub exclude: Option<Selector>,
    pub exclude_unset: bool,
    pub exclude_defaults: bool,
    pub exclude_none: bool,
    pub mode: DumpMode,
    pub serialize_as_any: bool,
    pub context: Option<Value>,
}

impl DumpOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn by_alias(mut self, enabled: bool) -> Self {
        self.by_alias = enabled;
        self
    }

    pub fn include(mut self, selector: Selector) -> Self {
        self.include = Some(selector);
        self
    }

    pub fn exclude(mut self, selector: Selector) -> Self {
        self.exclude = Some(selector);
        self
    }

    pub fn exclude_unset(mut self, enabled: bool) -> Self {
        self.exclude_unset = enabled;
        self
    }

    pub fn exclude_defaults(mut self, enabled: bool) -> Self {
        self.exclude_defaults = enabled;
        self
    }

    pub fn exclude_none(mut self, enabled: bool) -> Self {
        self.exclude_none = enabled;
        self
    }

    pub fn mode(mut self, mode: DumpMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn serialize_as_any(mut self, enabled: bool) -> Self {
        self.serialize_as_any = enabled;
        self
    }

    pub fn context(mut self, context: impl Into<Value>) -> Self {
        self.context = Some(context.into());
        self
    }
}

/// Errors that can occur while dumping.
#[derive(Debug, thiserror::Error)]
pub enum SerializeError {
    #[error(transparent)]
    Fault(#[from] SchemaFault),

    #[error("failed to render JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Where the runner is within the value.
#[derive(Debug, Clone, Default)]
struct Frame {
    filters: Filters,
    duck: bool,
    field_name: Option<String>,
    depth: usize,
}

/// Drives one dump against a compiled arena.
pub struct SerializationRunner<'a> {
    arena: &'a SchemaArena,
    options: &'a DumpOptions,
}

impl<'a> SerializationRunner<'a> {
    pub fn new(arena: &'a SchemaArena, options: &'a DumpOptions) -> Self {
        Self { arena, options }
    }

    /// Dumps `value` as declared by `node`.
    pub fn dump(&self, node: &SchemaNode, value: &Value) -> Result<Value, SerializeError> {
        let frame = Frame {
            filters: Filters::new(self.options.include.clone(), self.options.exclude.clone()),
            duck: self.options.serialize_as_any,
            ..Frame::default()
        };
        let dumped = self.dump_node(node, value, &frame).map_err(|err| match err {
            StageError::Fault(fault) => SerializeError::Fault(fault),
            other => SerializeError::Fault(SchemaFault::Serialization(other.to_string())),
        })?;
        Ok(match self.options.mode {
            DumpMode::Python => dumped,
            DumpMode::Json => Value::from(dumped.to_json()),
        })
    }

    fn dump_node(&self, node: &SchemaNode, value: &Value, frame: &Frame) -> Result<Value, StageError> {
        match node {
            SchemaNode::Scalar(_) => self.infer(value, frame),
            SchemaNode::Sequence(seq) => match value {
                Value::List(items) => self.dump_list(items, frame, |item, child| {
                    self.dump_node(&seq.item, item, child)
                }),
                _ => self.fallback(node, value, frame),
            },
            SchemaNode::Mapping(map) => match value {
                Value::Dict(entries) => self.dump_dict(entries, frame, |entry, child| {
                    self.dump_node(&map.value, entry, child)
                }),
                _ => self.fallback(node, value, frame),
            },
            SchemaNode::Model(model) => self.dump_model(node, model, value, frame),
            SchemaNode::Union(union) => self.dump_union(node, union, value, frame),
            SchemaNode::Wrapped(wrapped) => self.dump_wrapped(wrapped, value, frame),
            SchemaNode::Ref(id) => {
                let target = self
                    .arena
                    .get(id)
                    .ok_or_else(|| SchemaFault::UnknownNode(id.clone()))?;
                if frame.depth >= self.arena.max_depth() {
                    return Err(StageError::Fault(SchemaFault::Serialization(format!(
                        "reference depth limit reached at '{}'",
                        id
                    ))));
                }
                let deeper = Frame {
                    depth: frame.depth + 1,
                    ..frame.clone()
                };
                self.dump_node(target, value, &deeper)
            }
        }
    }

    fn dump_list<F>(&self, items: &[Value], frame: &Frame, dump_item: F) -> Result<Value, StageError>
    where
        F: Fn(&Value, &Frame) -> Result<Value, StageError>,
    {
        let mut out = Vec::with_capacity(items.len());
        for (idx, item) in items.iter().enumerate() {
            let Some(filters) = frame.filters.for_index(idx, items.len()) else {
                continue;
            };
            let child = Frame {
                filters,
                ..frame.clone()
            };
            out.push(dump_item(item, &child)?);
        }
        Ok(Value::List(out))
    }

    fn dump_dict<F>(&self, entries: &Dict, frame: &Frame, dump_entry: F) -> Result<Value, StageError>
    where
        F: Fn(&Value, &Frame) -> Result<Value, StageError>,
    {
        let mut out = Dict::with_capacity(entries.len());
        for (key, entry) in entries {
            let Some(filters) = frame.filters.for_key(key) else {
                continue;
            };
            let child = Frame {
                filters,
                ..frame.clone()
            };
            out.insert(key.clone(), dump_entry(entry, &child)?);
        }
        Ok(Value::Dict(out))
    }

    fn dump_model(
        &self,
        node: &SchemaNode,
        model: &ModelSchema,
        value: &Value,
        frame: &Frame,
    ) -> Result<Value, StageError> {
        let Value::Model(instance) = value else {
            return self.fallback(node, value, frame);
        };
        let fits = instance.type_name() == model.name
            || self.arena.is_subtype(instance.type_name(), &model.name);
        if !fits {
            return self.fallback(node, value, frame);
        }

        let duck = model
            .config
            .serialize_as
            .map_or(frame.duck, |mode| mode == SerializeAs::Runtime);
        let schema = if duck {
            self.arena.model(instance.type_name()).unwrap_or(model)
        } else {
            model
        };
        self.dump_fields(schema, instance, duck, frame)
    }

    fn dump_fields(
        &self,
        model: &ModelSchema,
        instance: &ModelInstance,
        duck: bool,
        frame: &Frame,
    ) -> Result<Value, StageError> {
        let options = self.options;
        let mut out = Dict::with_capacity(instance.fields().len());

        for (field, aliases) in model.resolved_fields() {
            if field.exclude {
                continue;
            }
            let Some(value) = instance.fields().get(&field.name) else {
                continue;
            };
            let Some(filters) = frame.filters.for_key(&field.name) else {
                continue;
            };
            if options.exclude_unset && !instance.fields_set().contains(&field.name) {
                continue;
            }
            if options.exclude_defaults
                && field
                    .default
                    .produce()
                    .is_some_and(|default| same_default(&default, value))
            {
                continue;
            }
            if options.exclude_none && value.is_none() {
                continue;
            }

            let child = Frame {
                filters,
                duck: field
                    .serialize_as
                    .map_or(duck, |mode| mode == SerializeAs::Runtime),
                field_name: Some(field.name.clone()),
                depth: frame.depth,
            };
            let dumped = self.dump_node(&field.schema, value, &child)?;
            let key = if options.by_alias {
                aliases.serialization.clone()
            } else {
                field.name.clone()
            };
            out.insert(key, dumped);
        }

        for (key, value) in instance.extra() {
            let Some(filters) = frame.filters.for_key(key) else {
                continue;
            };
            if options.exclude_none && value.is_none() {
                continue;
            }
            let child = Frame {
                filters,
                duck,
                field_name: None,
                depth: frame.depth,
            };
            out.insert(key.clone(), self.infer(value, &child)?);
        }

        Ok(Value::Dict(out))
    }

    fn dump_union(
        &self,
        node: &SchemaNode,
        union: &UnionSchema,
        value: &Value,
        frame: &Frame,
    ) -> Result<Value, StageError> {
        if let Some(discriminator) = &union.discriminator {
            let member = discriminator
                .extract(value)
                .and_then(|raw| Tag::from_value(&raw))
                .and_then(|tag| union.member_for(&tag));
            if let Some(index) = member {
                return self.dump_node(&union.members[index].schema, value, frame);
            }
        }

        for exact in [true, false] {
            if let Some(member) = union
                .members
                .iter()
                .find(|m| self.fits(&m.schema, value, exact, frame.depth))
            {
                tracing::trace!(member = %member.label(), exact, "union dump selected member");
                return self.dump_node(&member.schema, value, frame);
            }
        }

        self.fallback(node, value, frame)
    }

    fn dump_wrapped(
        &self,
        wrapped: &WrappedSchema,
        value: &Value,
        frame: &Frame,
    ) -> Result<Value, StageError> {
        let Some(stage) = &wrapped.serializer else {
            return self.dump_node(&wrapped.inner, value, frame);
        };

        let info = SerializeInfo {
            mode: self.options.mode,
            by_alias: self.options.by_alias,
            context: self.options.context.as_ref(),
            field_name: frame.field_name.as_deref(),
        };
        let mut inner = |v: Value| self.dump_node(&wrapped.inner, &v, frame);
        let out = stage.run(value.clone(), &info, &mut inner)?;
        // A wrap result already went through the selectors via `next`.
        let filters = match stage {
            SerializerStage::Plain(_) => frame.filters.clone(),
            SerializerStage::Wrap(_) => Filters::default(),
        };
        let rest = Frame {
            filters,
            duck: frame.duck,
            field_name: None,
            depth: frame.depth,
        };
        self.infer(&out, &rest)
    }

    /// Whether `value` has the shape `node` declares. Exact fits require the
    /// precise type; loose fits also accept ints as floats and subtype
    /// instances as their bases.
    fn fits(&self, node: &SchemaNode, value: &Value, exact: bool, depth: usize) -> bool {
        if depth > self.arena.max_depth() {
            return false;
        }
        match node {
            SchemaNode::Scalar(scalar) => match (&scalar.kind, value) {
                (ScalarKind::Any, _) => true,
                (ScalarKind::None, Value::None) => true,
                (ScalarKind::Bool, Value::Bool(_)) => true,
                (ScalarKind::Int, Value::Int(_)) => true,
                (ScalarKind::Float, Value::Float(_)) => true,
                (ScalarKind::Float, Value::Int(_)) => !exact,
                (ScalarKind::Str, Value::Str(_)) => true,
                (ScalarKind::Literal(expected), v) => expected.contains(v),
                _ => false,
            },
            SchemaNode::Sequence(seq) => match value {
                Value::List(items) => items.iter().all(|i| self.fits(&seq.item, i, exact, depth)),
                _ => false,
            },
            SchemaNode::Mapping(map) => match value {
                Value::Dict(entries) => entries
                    .values()
                    .all(|v| self.fits(&map.value, v, exact, depth)),
                _ => false,
            },
            SchemaNode::Model(model) => match value {
                Value::Model(instance) => {
                    instance.type_name() == model.name
                        || (!exact && self.arena.is_subtype(instance.type_name(), &model.name))
                }
                _ => false,
            },
            SchemaNode::Union(union) => union
                .members
                .iter()
                .any(|m| self.fits(&m.schema, value, exact, depth)),
            SchemaNode::Wrapped(wrapped) => self.fits(&wrapped.inner, value, exact, depth),
            SchemaNode::Ref(id) => self
                .arena
                .get(id)
                .is_some_and(|target| self.fits(target, value, exact, depth + 1)),
        }
    }

    fn fallback(&self, node: &SchemaNode, value: &Value, frame: &Frame) -> Result<Value, StageError> {
        tracing::warn!(
            expected = %node.label(),
            actual = value.type_name(),
            "value does not match its declared schema, serializing by inference"
        );
        self.infer(value, frame)
    }

    /// Dumps a value by its runtime shape alone.
    fn infer(&self, value: &Value, frame: &Frame) -> Result<Value, StageError> {
        match value {
            Value::Model(instance) => match self.arena.model(instance.type_name()) {
                Some(model) => self.dump_fields(model, instance, frame.duck, frame),
                None => {
                    let mut all = instance.fields().clone();
                    all.extend(instance.extra().iter().map(|(k, v)| (k.clone(), v.clone())));
                    self.dump_dict(&all, frame, |entry, child| self.infer(entry, child))
                }
            },
            Value::List(items) => self.dump_list(items, frame, |item, child| self.infer(item, child)),
            Value::Dict(entries) => {
                self.dump_dict(entries, frame, |entry, child| self.infer(entry, child))
            }
            other => Ok(other.clone()),
        }
    }
}

/// Default comparison for `exclude_defaults`: numbers compare across int and
/// float, everything else by plain equality.
fn same_default(default: &Value, value: &Value) -> bool {
    match (default, value) {
        (Value::Int(i), Value::Float(f)) | (Value::Float(f), Value::Int(i)) => *i as f64 == *f,
        _ => default == value,
    }
}
