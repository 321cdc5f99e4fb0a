//! Model schemas: named, ordered fields with per-model configuration.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::alias::{AliasGenerator, AliasPriority, AliasResolver, ResolvedAliases, ValidationAlias};
use crate::value::Value;

use super::node::SchemaNode;

/// How input keys that match no field are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtraPolicy {
    #[default]
    Ignore,
    /// Each unknown key is an `extra_forbidden` error.
    Forbid,
    /// Unknown keys are kept on the instance.
    Allow,
}

/// When an existing model instance is validated again instead of passed
/// through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevalidateInstances {
    #[default]
    Never,
    Always,
    SubclassInstances,
}

/// Whether serialization follows the declared model or the runtime one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SerializeAs {
    Declared,
    Runtime,
}

/// Produces a default value each time a field is missing.
pub type DefaultFactory = Arc<dyn Fn() -> Value + Send + Sync>;

/// What an absent field falls back to.
#[derive(Clone, Default)]
pub enum FieldDefault {
    /// No default: the field is required.
    #[default]
    None,
    Value(Value),
    Factory(DefaultFactory),
}

impl FieldDefault {
    /// Produces the default value, if there is one.
    pub fn produce(&self) -> Option<Value> {
        match self {
            FieldDefault::None => None,
            FieldDefault::Value(v) => Some(v.clone()),
            FieldDefault::Factory(f) => Some(f()),
        }
    }
}

impl fmt::Debug for FieldDefault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldDefault::None => write!(f, "None"),
            FieldDefault::Value(v) => write!(f, "Value({:?})", v),
            FieldDefault::Factory(_) => write!(f, "Factory(..)"),
        }
    }
}

/// One field of a model.
///
/// # Example
///
/// ```rust
/// use schemata::{FieldDescriptor, Schema, Value};
///
/// let field = FieldDescriptor::new("user_name", Schema::str())
///     .alias("userName")
///     .default(Value::from("anonymous"));
///
/// assert!(!field.is_required());
/// ```
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub name: String,
    pub schema: Arc<SchemaNode>,
    pub default: FieldDefault,
    pub validate_default: bool,
    pub alias: Option<String>,
    pub validation_alias: Option<ValidationAlias>,
    pub serialization_alias: Option<String>,
    pub alias_priority: Option<AliasPriority>,
    /// Never emitted by serialization, whatever the caller asks for.
    pub exclude: bool,
    pub serialize_as: Option<SerializeAs>,
}

impl FieldDescriptor {
    /// Creates a required field.
    pub fn new(name: impl Into<String>, schema: impl Into<SchemaNode>) -> Self {
        Self {
            name: name.into(),
            schema: Arc::new(schema.into()),
            default: FieldDefault::None,
            validate_default: false,
            alias: None,
            validation_alias: None,
            serialization_alias: None,
            alias_priority: None,
            exclude: false,
            serialize_as: None,
        }
    }

    pub fn is_required(&self) -> bool {
        matches!(self.default, FieldDefault::None)
    }

    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = FieldDefault::Value(value.into());
        self
    }

    pub fn default_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.default = FieldDefault::Factory(Arc::new(factory));
        self
    }

    /// Runs the default through the field's schema when it is used.
    pub fn validate_default(mut self, validate: bool) -> Self {
        self.validate_default = validate;
        self
    }

    /// Sets the shared alias, used for reads and writes.
    ///
    /// Explicit aliases take priority over a model's alias generator unless
    /// [`alias_priority`](Self::alias_priority) says otherwise.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self.alias_priority.get_or_insert(AliasPriority::Explicit);
        self
    }

    pub fn validation_alias(mut self, alias: impl Into<ValidationAlias>) -> Self {
        self.validation_alias = Some(alias.into());
        self.alias_priority.get_or_insert(AliasPriority::Explicit);
        self
    }

    pub fn serialization_alias(mut self, alias: impl Into<String>) -> Self {
        self.serialization_alias = Some(alias.into());
        self.alias_priority.get_or_insert(AliasPriority::Explicit);
        self
    }

    pub fn alias_priority(mut self, priority: AliasPriority) -> Self {
        self.alias_priority = Some(priority);
        self
    }

    /// Drops the field from every dump.
    pub fn exclude(mut self) -> Self {
        self.exclude = true;
        self
    }

    pub fn serialize_as(mut self, mode: SerializeAs) -> Self {
        self.serialize_as = Some(mode);
        self
    }
}

/// Per-model behavior switches.
///
/// # Example
///
/// ```rust
/// use schemata::{AliasGenerator, ExtraPolicy, ModelConfig};
///
/// let config = ModelConfig::new()
///     .with_extra(ExtraPolicy::Forbid)
///     .with_alias_generator(AliasGenerator::camel())
///     .with_populate_by_name(true);
///
/// assert_eq!(config.extra, ExtraPolicy::Forbid);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ModelConfig {
    pub extra: ExtraPolicy,
    pub alias_generator: Option<AliasGenerator>,
    pub populate_by_name: bool,
    pub strict: Option<bool>,
    pub validate_default: bool,
    pub hide_input_in_errors: bool,
    pub revalidate_instances: RevalidateInstances,
    pub serialize_as: Option<SerializeAs>,
}

impl ModelConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_extra(mut self, extra: ExtraPolicy) -> Self {
        self.extra = extra;
        self
    }

    pub fn with_alias_generator(mut self, generator: AliasGenerator) -> Self {
        self.alias_generator = Some(generator);
        self
    }

    pub fn with_populate_by_name(mut self, enabled: bool) -> Self {
        self.populate_by_name = enabled;
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = Some(strict);
        self
    }

    pub fn with_validate_default(mut self, enabled: bool) -> Self {
        self.validate_default = enabled;
        self
    }

    pub fn with_hide_input_in_errors(mut self, enabled: bool) -> Self {
        self.hide_input_in_errors = enabled;
        self
    }

    pub fn with_revalidate_instances(mut self, mode: RevalidateInstances) -> Self {
        self.revalidate_instances = mode;
        self
    }

    pub fn with_serialize_as(mut self, mode: SerializeAs) -> Self {
        self.serialize_as = Some(mode);
        self
    }
}

/// A schema for validating model-shaped input.
///
/// A model validates a dict (or an existing instance) field by field and
/// produces a [`ModelInstance`](crate::ModelInstance) tagged with its name.
/// All field errors are accumulated. Aliases are resolved whenever a field
/// or the config changes, so validation only reads the resolved table.
///
/// # Example
///
/// ```rust
/// use schemata::{CompiledSchema, Schema, Value};
/// use serde_json::json;
///
/// let user = Schema::model("User")
///     .field("name", Schema::str().min_length(1))
///     .field("age", Schema::int().ge(0))
///     .optional("email", Schema::str());
///
/// let schema = CompiledSchema::new(user).unwrap();
/// let result = schema.validate(&Value::from(json!({"name": "Ada", "age": 36}))).unwrap();
/// assert!(result.is_success());
///
/// let result = schema.validate(&Value::from(json!({"age": -1}))).unwrap();
/// assert!(result.is_failure());
/// ```
#[derive(Debug, Clone)]
pub struct ModelSchema {
    pub name: String,
    pub fields: Vec<FieldDescriptor>,
    pub config: ModelConfig,
    pub extras_schema: Option<Arc<SchemaNode>>,
    /// Every model this one was derived from, nearest first.
    pub bases: Vec<String>,
    aliases: Vec<ResolvedAliases>,
}

impl ModelSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            config: ModelConfig::default(),
            extras_schema: None,
            bases: Vec::new(),
            aliases: Vec::new(),
        }
    }

    /// Adds a required field.
    pub fn field(self, name: impl Into<String>, schema: impl Into<SchemaNode>) -> Self {
        self.with_field(FieldDescriptor::new(name, schema))
    }

    /// Adds a field that defaults to `None` when absent.
    pub fn optional(self, name: impl Into<String>, schema: impl Into<SchemaNode>) -> Self {
        self.with_field(FieldDescriptor::new(name, schema).default(Value::None))
    }

    /// Adds a field with a default value.
    pub fn default(
        self,
        name: impl Into<String>,
        schema: impl Into<SchemaNode>,
        default: impl Into<Value>,
    ) -> Self {
        self.with_field(FieldDescriptor::new(name, schema).default(default))
    }

    /// Adds a fully described field, replacing any field of the same name.
    pub fn with_field(mut self, field: FieldDescriptor) -> Self {
        match self.fields.iter().position(|f| f.name == field.name) {
            Some(idx) => self.fields[idx] = field,
            None => self.fields.push(field),
        }
        self.resolve_aliases();
        self
    }

    pub fn config(mut self, config: ModelConfig) -> Self {
        self.config = config;
        self.resolve_aliases();
        self
    }

    /// Validates captured extras against `schema` when extras are allowed.
    pub fn extras_schema(mut self, schema: impl Into<SchemaNode>) -> Self {
        self.extras_schema = Some(Arc::new(schema.into()));
        self
    }

    /// Starts this model from a copy of `base`'s fields and records it as a
    /// base, so instances of this model are accepted where `base` is
    /// declared.
    ///
    /// # Example
    ///
    /// ```rust
    /// use schemata::Schema;
    ///
    /// let pet = Schema::model("Pet").field("name", Schema::str());
    /// let dog = Schema::model("Dog").inherit(&pet).field("breed", Schema::str());
    ///
    /// assert_eq!(dog.fields.len(), 2);
    /// assert!(dog.is_subtype_of("Pet"));
    /// ```
    pub fn inherit(mut self, base: &ModelSchema) -> Self {
        let mut fields = base.fields.clone();
        for own in self.fields.drain(..) {
            match fields.iter().position(|f| f.name == own.name) {
                Some(idx) => fields[idx] = own,
                None => fields.push(own),
            }
        }
        self.fields = fields;
        self.bases.push(base.name.clone());
        self.bases.extend(base.bases.iter().cloned());
        self.resolve_aliases();
        self
    }

    pub fn is_subtype_of(&self, name: &str) -> bool {
        self.bases.iter().any(|b| b == name)
    }

    /// Fields paired with their resolved aliases.
    pub fn resolved_fields(&self) -> impl Iterator<Item = (&FieldDescriptor, &ResolvedAliases)> {
        self.fields.iter().zip(self.aliases.iter())
    }

    pub fn field_named(&self, name: &str) -> Option<(&FieldDescriptor, &ResolvedAliases)> {
        self.resolved_fields().find(|(f, _)| f.name == name)
    }

    fn resolve_aliases(&mut self) {
        let generator = self.config.alias_generator.as_ref();
        self.aliases = self
            .fields
            .iter()
            .map(|f| AliasResolver::resolve(f, generator))
            .collect();
    }
}
