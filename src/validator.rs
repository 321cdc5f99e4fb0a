//! Validation traversal.
//!
//! [`ValidationRunner`] walks a schema tree depth first, coercing input into
//! validated values and collecting every failure with its full path.
//! [`ValidationState`] carries the per-call bookkeeping that unions need to
//! compare their members.

use std::collections::HashSet;
use std::sync::Arc;

use indexmap::IndexSet;
use stillwater::Validation;

use crate::alias::AliasResolver;
use crate::chain::StageInfo;
use crate::error::{
    ErrorAccumulator, ErrorKind, ErrorRecord, SchemaFault, StageError, ValidationErrors,
};
use crate::path::Location;
use crate::registry::SchemaArena;
use crate::schema::{
    ExtraPolicy, MappingSchema, ModelSchema, RevalidateInstances, SchemaNode, SequenceSchema,
    WrappedSchema,
};
use crate::union::UnionResolver;
use crate::value::{Dict, ModelInstance, Value};

/// How closely an input matched the type it was validated as.
///
/// Ordered `Lax < Strict < Exact`; a node's exactness is the minimum over
/// everything validated inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Exactness {
    /// Accepted through a lax conversion.
    Lax,
    /// Valid in strict mode, but not the exact runtime type.
    Strict,
    /// The input already was the target type.
    Exact,
}

/// Per-call validation options.
///
/// # Example
///
/// ```rust
/// use schemata::{CompiledSchema, Schema, ValidateOptions, Value};
///
/// let schema = CompiledSchema::new(Schema::int()).unwrap();
/// let strict = ValidateOptions::new().strict(true);
///
/// assert!(schema.validate_with(&Value::from("1"), &strict).unwrap().is_failure());
/// assert!(schema.validate(&Value::from("1")).unwrap().is_success());
/// ```
#[derive(Debug, Clone, Default)]
pub struct ValidateOptions {
    pub strict: Option<bool>,
    /// Read-only data handed to every stage.
    pub context: Option<Value>,
    /// Overrides the compiled schema's maximum reference depth.
    pub max_depth: Option<usize>,
}

impl ValidateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = Some(strict);
        self
    }

    pub fn context(mut self, context: impl Into<Value>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }
}

/// Mutable bookkeeping for one validation call.
#[derive(Debug, Clone)]
pub struct ValidationState<'c> {
    pub strict: bool,
    pub exactness: Exactness,
    /// Fields populated from explicit input, summed through nested models.
    /// `None` until a model has been validated.
    pub fields_set_count: Option<usize>,
    pub(crate) depth: usize,
    pub(crate) max_depth: usize,
    pub(crate) field_name: Option<String>,
    pub(crate) context: Option<&'c Value>,
    active: HashSet<usize>,
}

impl<'c> ValidationState<'c> {
    pub(crate) fn new(options: &'c ValidateOptions, max_depth: usize) -> Self {
        Self {
            strict: options.strict.unwrap_or(false),
            exactness: Exactness::Exact,
            fields_set_count: None,
            depth: 0,
            max_depth: options.max_depth.unwrap_or(max_depth),
            field_name: None,
            context: options.context.as_ref(),
            active: HashSet::new(),
        }
    }

    /// A copy with fresh exactness and field counters, for trying one union
    /// member in isolation.
    pub(crate) fn fork(&self) -> Self {
        Self {
            exactness: Exactness::Exact,
            fields_set_count: None,
            ..self.clone()
        }
    }

    /// Lowers the exactness to at most `exactness`.
    pub fn floor_exactness(&mut self, exactness: Exactness) {
        self.exactness = self.exactness.min(exactness);
    }

    pub fn add_fields_set(&mut self, count: usize) {
        self.fields_set_count = Some(self.fields_set_count.unwrap_or(0) + count);
    }
}

/// Drives validation of one node tree against a compiled arena.
pub struct ValidationRunner<'a> {
    arena: &'a SchemaArena,
}

impl<'a> ValidationRunner<'a> {
    pub fn new(arena: &'a SchemaArena) -> Self {
        Self { arena }
    }

    pub fn arena(&self) -> &'a SchemaArena {
        self.arena
    }

    /// Validates `input` against `node`.
    ///
    /// Validation failures come back as `Validation::Failure` holding every
    /// record; a failing stage that is not a validation failure aborts the
    /// call with a [`SchemaFault`].
    pub fn validate(
        &self,
        node: &SchemaNode,
        input: &Value,
        options: &ValidateOptions,
    ) -> Result<Validation<Value, ValidationErrors>, SchemaFault> {
        let mut state = ValidationState::new(options, self.arena.max_depth());
        let result = self.validate_node(node, input, &Location::root(), &mut state);
        settle(result, input)
    }

    /// Validates one node; failures come back as `StageError::Invalid`.
    pub(crate) fn validate_node(
        &self,
        node: &SchemaNode,
        input: &Value,
        path: &Location,
        state: &mut ValidationState<'_>,
    ) -> Result<Value, StageError> {
        match node {
            SchemaNode::Scalar(scalar) => {
                let (value, exactness) = scalar.validate(input, state.strict, path)?;
                state.floor_exactness(exactness);
                Ok(value)
            }
            SchemaNode::Sequence(seq) => self.validate_sequence(seq, input, path, state),
            SchemaNode::Mapping(map) => self.validate_mapping(map, input, path, state),
            SchemaNode::Model(model) => self.validate_model(model, input, path, state),
            SchemaNode::Union(union) => UnionResolver::new(self).resolve(union, input, path, state),
            SchemaNode::Wrapped(wrapped) => self.validate_wrapped(wrapped, input, path, state),
            SchemaNode::Ref(id) => self.validate_ref(id, input, path, state),
        }
    }

    fn validate_ref(
        &self,
        id: &str,
        input: &Value,
        path: &Location,
        state: &mut ValidationState<'_>,
    ) -> Result<Value, StageError> {
        let target = self
            .arena
            .get(id)
            .ok_or_else(|| SchemaFault::UnknownNode(id.to_string()))?;

        if state.depth >= state.max_depth {
            tracing::debug!(id, depth = state.depth, "reference depth limit reached");
            return Err(recursion_loop(path, input));
        }

        tracing::trace!(id, depth = state.depth, "resolving reference");
        state.depth += 1;
        let result = self.validate_node(&target, input, path, state);
        state.depth -= 1;
        result
    }

    fn validate_sequence(
        &self,
        seq: &SequenceSchema,
        input: &Value,
        path: &Location,
        state: &mut ValidationState<'_>,
    ) -> Result<Value, StageError> {
        let Value::List(items) = input else {
            return Err(invalid(ErrorKind::ListType, path, input));
        };

        let mut acc = ErrorAccumulator::new();
        let mut output = Vec::with_capacity(items.len());
        for (idx, item) in items.iter().enumerate() {
            let item_path = path.push(idx);
            match acc.absorb(self.validate_node(&seq.item, item, &item_path, state))? {
                Some(value) => output.push(value),
                None if seq.fail_fast => break,
                None => {}
            }
        }
        seq.constraints
            .check_items("List", items.len(), path, input, &mut acc);
        acc.into_result(Value::List(output))
    }

    fn validate_mapping(
        &self,
        map: &MappingSchema,
        input: &Value,
        path: &Location,
        state: &mut ValidationState<'_>,
    ) -> Result<Value, StageError> {
        let Value::Dict(entries) = input else {
            return Err(invalid(ErrorKind::DictType, path, input));
        };

        let mut acc = ErrorAccumulator::new();
        let mut output = Dict::with_capacity(entries.len());
        for (key, value) in entries {
            let entry_path = path.push(key.as_str());
            let key_input = Value::Str(key.clone());
            let key_result = self.validate_node(&map.key, &key_input, &entry_path.push("[key]"), state);
            let value_result = self.validate_node(&map.value, value, &entry_path, state);

            let key = acc.absorb(key_result)?;
            let value = acc.absorb(value_result)?;
            if let (Some(key), Some(value)) = (key, value) {
                let key = match key {
                    Value::Str(s) => s,
                    other => other.to_string(),
                };
                output.insert(key, value);
            }
        }
        map.constraints
            .check_items("Dictionary", entries.len(), path, input, &mut acc);
        acc.into_result(Value::Dict(output))
    }

    fn validate_wrapped(
        &self,
        wrapped: &WrappedSchema,
        input: &Value,
        path: &Location,
        state: &mut ValidationState<'_>,
    ) -> Result<Value, StageError> {
        if wrapped.chain.is_empty() {
            return self.validate_node(&wrapped.inner, input, path, state);
        }

        let field_name = state.field_name.clone();
        let info = StageInfo {
            path,
            context: state.context,
            field_name: field_name.as_deref(),
        };
        let result = {
            let mut core = |value: Value| self.validate_node(&wrapped.inner, &value, path, state);
            wrapped.chain.run(input.clone(), &info, &mut core)
        };
        if wrapped.chain.has_plain() {
            state.floor_exactness(Exactness::Lax);
        }
        result
    }

    fn validate_model(
        &self,
        model: &ModelSchema,
        input: &Value,
        path: &Location,
        state: &mut ValidationState<'_>,
    ) -> Result<Value, StageError> {
        match input {
            Value::Dict(dict) => {
                state.floor_exactness(Exactness::Strict);
                self.validate_model_fields(model, FieldSource::Input(input, dict), path, state)
            }
            Value::Model(instance) => {
                let same = instance.type_name() == model.name;
                let subtype = !same && self.arena.is_subtype(instance.type_name(), &model.name);
                if !same && !subtype {
                    return Err(model_type(model, path, input));
                }

                let revalidate = match model.config.revalidate_instances {
                    RevalidateInstances::Never => false,
                    RevalidateInstances::Always => true,
                    RevalidateInstances::SubclassInstances => subtype,
                };
                if !revalidate {
                    state.floor_exactness(if same { Exactness::Exact } else { Exactness::Strict });
                    state.add_fields_set(instance.fields_set().len());
                    return Ok(input.clone());
                }

                let address = Arc::as_ptr(instance) as usize;
                if !state.active.insert(address) {
                    return Err(recursion_loop(path, input));
                }
                let result = self.validate_model_fields(
                    model,
                    FieldSource::Instance(input, instance),
                    path,
                    state,
                );
                state.active.remove(&address);
                result
            }
            _ => Err(model_type(model, path, input)),
        }
    }

    fn validate_model_fields(
        &self,
        model: &ModelSchema,
        source: FieldSource<'_>,
        path: &Location,
        state: &mut ValidationState<'_>,
    ) -> Result<Value, StageError> {
        let config = &model.config;
        let saved_strict = state.strict;
        let saved_field = state.field_name.take();
        if let Some(strict) = config.strict {
            state.strict = strict;
        }

        let input = source.value();
        let mut acc = ErrorAccumulator::new();
        let mut fields = Dict::with_capacity(model.fields.len());
        let mut fields_set = IndexSet::new();
        let mut used_keys: HashSet<&str> = HashSet::new();

        for (field, aliases) in model.resolved_fields() {
            let found = match &source {
                FieldSource::Input(..) => {
                    AliasResolver::read(aliases, &field.name, config.populate_by_name, input)
                        .map(|(used, raw)| (path.join(used.items()), used.first_key().map(str::to_string), raw))
                }
                FieldSource::Instance(_, instance) => instance
                    .fields()
                    .get(&field.name)
                    .map(|raw| (path.push(field.name.as_str()), None, raw)),
            };

            state.field_name = Some(field.name.clone());
            match found {
                Some((field_path, used_key, raw)) => {
                    if let Some(key) = used_key.as_deref().and_then(|k| input.as_dict()?.get_key_value(k)) {
                        used_keys.insert(key.0.as_str());
                    }
                    if let Some(value) = acc.absorb(self.validate_node(&field.schema, raw, &field_path, state))? {
                        fields.insert(field.name.clone(), value);
                        fields_set.insert(field.name.clone());
                    }
                }
                None => {
                    match field.default.produce() {
                        None => {
                            let missing_path = match aliases.validation.first() {
                                Some(alias) => path.join(alias.items()),
                                None => path.push(field.name.as_str()),
                            };
                            acc.push(
                                ErrorRecord::new(ErrorKind::Missing, missing_path)
                                    .with_input(input.clone()),
                            );
                        }
                        Some(value) if field.validate_default || config.validate_default => {
                            let field_path = path.push(field.name.as_str());
                            if let Some(value) =
                                acc.absorb(self.validate_node(&field.schema, &value, &field_path, state))?
                            {
                                fields.insert(field.name.clone(), value);
                            }
                        }
                        Some(value) => {
                            fields.insert(field.name.clone(), value);
                        }
                    }
                }
            }
        }
        state.field_name = None;

        let extra = match &source {
            FieldSource::Input(_, dict) => {
                let unknown = dict.iter().filter(|(k, _)| !used_keys.contains(k.as_str()));
                self.collect_extras(model, unknown, path, state, &mut acc)?
            }
            FieldSource::Instance(_, instance) => {
                self.collect_extras(model, instance.extra().iter(), path, state, &mut acc)?
            }
        };

        state.strict = saved_strict;
        state.field_name = saved_field;

        if config.hide_input_in_errors {
            acc.redact_inputs();
        }
        let fields_set = match &source {
            FieldSource::Instance(_, instance) => instance.fields_set().clone(),
            FieldSource::Input(..) => fields_set,
        };
        let count = fields_set.len();
        let instance = ModelInstance::from_parts(model.name.clone(), fields, fields_set, extra);
        let value = acc.into_result(Value::from(instance))?;
        state.add_fields_set(count);
        Ok(value)
    }

    fn collect_extras<'v>(
        &self,
        model: &ModelSchema,
        unknown: impl Iterator<Item = (&'v String, &'v Value)>,
        path: &Location,
        state: &mut ValidationState<'_>,
        acc: &mut ErrorAccumulator,
    ) -> Result<Dict, StageError> {
        let mut extra = Dict::new();
        for (key, value) in unknown {
            let key_path = path.push(key.as_str());
            match model.config.extra {
                ExtraPolicy::Ignore => {}
                ExtraPolicy::Forbid => acc.push(
                    ErrorRecord::new(ErrorKind::ExtraForbidden, key_path).with_input(value.clone()),
                ),
                ExtraPolicy::Allow => match &model.extras_schema {
                    Some(schema) => {
                        if let Some(v) = acc.absorb(self.validate_node(schema, value, &key_path, state))? {
                            extra.insert(key.clone(), v);
                        }
                    }
                    None => {
                        extra.insert(key.clone(), value.clone());
                    }
                },
            }
        }
        Ok(extra)
    }
}

/// Where a model reads its field values from.
enum FieldSource<'v> {
    /// Untrusted dict input, read through aliases.
    Input(&'v Value, &'v Dict),
    /// An existing instance being revalidated, read by field name.
    Instance(&'v Value, &'v Arc<ModelInstance>),
}

impl<'v> FieldSource<'v> {
    fn value(&self) -> &'v Value {
        match self {
            FieldSource::Input(v, _) | FieldSource::Instance(v, _) => v,
        }
    }
}

/// Converts a runner result into the public outcome.
pub(crate) fn settle(
    result: Result<Value, StageError>,
    input: &Value,
) -> Result<Validation<Value, ValidationErrors>, SchemaFault> {
    match result {
        Ok(value) => Ok(Validation::Success(value)),
        Err(err) => match err.locate(&Location::root(), input) {
            StageError::Invalid(errors) => Ok(Validation::Failure(errors)),
            StageError::Fault(fault) => Err(fault),
            other => Err(SchemaFault::Stage(Box::new(other))),
        },
    }
}

pub(crate) fn invalid(kind: ErrorKind, path: &Location, input: &Value) -> StageError {
    StageError::Invalid(ValidationErrors::single(
        ErrorRecord::new(kind, path.clone()).with_input(input.clone()),
    ))
}

fn recursion_loop(path: &Location, input: &Value) -> StageError {
    invalid(ErrorKind::RecursionLoop, path, input)
}

fn model_type(model: &ModelSchema, path: &Location, input: &Value) -> StageError {
    StageError::Invalid(ValidationErrors::single(
        ErrorRecord::new(ErrorKind::ModelType, path.clone())
            .with_context("class_name", model.name.as_str())
            .with_input(input.clone()),
    ))
}
