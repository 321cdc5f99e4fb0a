//! Schema registry, compiled arenas and the reusable schema handle.
//!
//! [`SchemaRegistry`] stores named nodes while schemas are being declared.
//! [`SchemaRegistry::compile`] snapshots it into an immutable [`SchemaArena`]
//! and hands back a [`CompiledSchema`], which validates and dumps without
//! taking any lock and can be shared freely across threads.

use parking_lot::RwLock;
use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;

use stillwater::Validation;

use crate::describe::SchemaTree;
use crate::error::{ErrorKind, ErrorRecord, SchemaFault, ValidationErrors};
use crate::path::Location;
use crate::schema::{ModelSchema, NodeId, SchemaNode};
use crate::serializer::{DumpMode, DumpOptions, SerializationRunner, SerializeError};
use crate::validator::{ValidateOptions, ValidationRunner};
use crate::value::Value;

/// Default limit on nested reference resolution.
pub const DEFAULT_MAX_DEPTH: usize = 100;

type NodeMap = Arc<RwLock<HashMap<NodeId, Arc<SchemaNode>>>>;

/// A thread-safe registry of named schema nodes.
///
/// Registered nodes can be referenced from other nodes with
/// [`Schema::reference`](crate::Schema::reference), which is how recursive
/// shapes are declared.
///
/// # Example
///
/// ```rust
/// use schemata::{Schema, SchemaRegistry, Value};
/// use serde_json::json;
///
/// let registry = SchemaRegistry::new();
/// registry
///     .register_model(
///         Schema::model("Node")
///             .field("value", Schema::int())
///             .optional("next", Schema::nullable(Schema::reference("Node"))),
///     )
///     .unwrap();
///
/// let schema = registry.compile("Node").unwrap();
/// let input = Value::from(json!({"value": 1, "next": {"value": 2}}));
/// assert!(schema.validate(&input).unwrap().is_success());
/// ```
pub struct SchemaRegistry {
    schemas: NodeMap,
    max_depth: usize,
}

impl SchemaRegistry {
    /// Creates an empty registry with the default max depth (100).
    pub fn new() -> Self {
        Self {
            schemas: Arc::new(RwLock::new(HashMap::new())),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Sets how many references may be followed in one branch before
    /// validation reports `recursion_loop`.
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Registers a node under `name`.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::DuplicateName` if the name is taken.
    pub fn register(
        &self,
        name: impl Into<NodeId>,
        schema: impl Into<SchemaNode>,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        let mut schemas = self.schemas.write();
        if schemas.contains_key(&name) {
            return Err(RegistryError::DuplicateName(name));
        }
        tracing::debug!(name = %name, "registered schema");
        schemas.insert(name, Arc::new(schema.into()));
        Ok(())
    }

    /// Registers a model under its own name.
    pub fn register_model(&self, model: ModelSchema) -> Result<(), RegistryError> {
        let name = model.name.clone();
        self.register(name, model)
    }

    pub fn get(&self, name: &str) -> Option<Arc<SchemaNode>> {
        self.schemas.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.schemas.read().contains_key(name)
    }

    /// Returns every referenced id that is not registered, sorted.
    ///
    /// # Example
    ///
    /// ```rust
    /// use schemata::{Schema, SchemaRegistry};
    ///
    /// let registry = SchemaRegistry::new();
    /// registry
    ///     .register_model(Schema::model("User").field("id", Schema::reference("UserId")))
    ///     .unwrap();
    ///
    /// assert_eq!(registry.validate_refs(), vec!["UserId"]);
    /// ```
    pub fn validate_refs(&self) -> Vec<String> {
        let schemas = self.schemas.read();
        unresolved(&schemas)
    }

    /// Compiles the node registered as `root`.
    ///
    /// # Errors
    ///
    /// `SchemaNotFound` if `root` is not registered, plus every error
    /// [`compile_node`](Self::compile_node) can return.
    pub fn compile(&self, root: &str) -> Result<CompiledSchema, RegistryError> {
        let node = self
            .get(root)
            .ok_or_else(|| RegistryError::SchemaNotFound(root.to_string()))?;
        self.build(node, Some(root.to_string()))
    }

    /// Compiles an unregistered node against the registered ones.
    ///
    /// # Errors
    ///
    /// `UnresolvedReferences` if any reference has no target, and
    /// `UntaggedMember` if a tagged union has a member without tags.
    pub fn compile_node(&self, node: impl Into<SchemaNode>) -> Result<CompiledSchema, RegistryError> {
        self.build(Arc::new(node.into()), None)
    }

    fn build(&self, root: Arc<SchemaNode>, root_id: Option<NodeId>) -> Result<CompiledSchema, RegistryError> {
        let mut nodes = self.schemas.read().clone();

        // Inline models become addressable by name so instances can be
        // matched back to their model when dumping.
        let mut inline = Vec::new();
        for node in nodes.values().chain(std::iter::once(&root)) {
            node.walk(&mut |n| {
                if let SchemaNode::Model(model) = n {
                    inline.push(model.clone());
                }
            });
        }
        for model in inline {
            if !nodes.contains_key(&model.name) {
                nodes.insert(model.name.clone(), Arc::new(SchemaNode::Model(model)));
            }
        }

        let mut missing = unresolved(&nodes);
        for id in root.refs() {
            if !nodes.contains_key(&id) && !missing.contains(&id) {
                missing.push(id);
            }
        }
        if !missing.is_empty() {
            missing.sort();
            return Err(RegistryError::UnresolvedReferences(missing));
        }

        for node in nodes.values().chain(std::iter::once(&root)) {
            check_tags(node)?;
        }

        tracing::debug!(
            root = root_id.as_deref().unwrap_or("<inline>"),
            nodes = nodes.len(),
            max_depth = self.max_depth,
            "compiled schema"
        );
        Ok(CompiledSchema {
            arena: Arc::new(SchemaArena {
                nodes,
                max_depth: self.max_depth,
            }),
            root,
            root_id,
        })
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for SchemaRegistry {
    fn clone(&self) -> Self {
        Self {
            schemas: Arc::clone(&self.schemas),
            max_depth: self.max_depth,
        }
    }
}

fn unresolved(nodes: &HashMap<NodeId, Arc<SchemaNode>>) -> Vec<String> {
    let mut missing: Vec<String> = nodes
        .values()
        .flat_map(|node| node.refs())
        .filter(|id| !nodes.contains_key(id))
        .collect();
    missing.sort();
    missing.dedup();
    missing
}

fn check_tags(node: &SchemaNode) -> Result<(), RegistryError> {
    let mut untagged = None;
    node.walk(&mut |n| {
        if let SchemaNode::Union(union) = n {
            if union.discriminator.is_none() || untagged.is_some() {
                return;
            }
            if let Some(member) = union.members.iter().find(|m| m.tags.is_empty()) {
                untagged = Some(RegistryError::UntaggedMember {
                    union: n.label(),
                    member: member.label(),
                });
            }
        }
    });
    match untagged {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// The immutable node table a compiled schema resolves references against.
#[derive(Debug)]
pub struct SchemaArena {
    nodes: HashMap<NodeId, Arc<SchemaNode>>,
    max_depth: usize,
}

impl SchemaArena {
    pub fn get(&self, id: &str) -> Option<&Arc<SchemaNode>> {
        self.nodes.get(id)
    }

    /// The model registered under `name`, looking through wrappers.
    pub fn model(&self, name: &str) -> Option<&ModelSchema> {
        self.nodes.get(name).and_then(|node| node.as_model())
    }

    /// Whether the model `child` was derived from the model `parent`.
    pub fn is_subtype(&self, child: &str, parent: &str) -> bool {
        self.model(child).is_some_and(|model| model.is_subtype_of(parent))
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Every id, sorted.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.nodes.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

/// A compiled, reusable schema.
///
/// Cloning is cheap and the handle is `Send + Sync`: every clone shares the
/// same arena.
///
/// # Example
///
/// ```rust
/// use schemata::{CompiledSchema, DumpOptions, Schema, Value};
/// use serde_json::json;
///
/// let schema = CompiledSchema::new(
///     Schema::model("Point").field("x", Schema::int()).field("y", Schema::int()),
/// )
/// .unwrap();
///
/// let point = schema
///     .validate_json(r#"{"x": 1, "y": "2"}"#)
///     .unwrap()
///     .into_result()
///     .unwrap();
///
/// let dumped = schema.dump_json(&point, &DumpOptions::new()).unwrap();
/// assert_eq!(dumped, json!({"x": 1, "y": 2}));
/// ```
#[derive(Debug, Clone)]
pub struct CompiledSchema {
    arena: Arc<SchemaArena>,
    root: Arc<SchemaNode>,
    root_id: Option<NodeId>,
}

impl CompiledSchema {
    /// Compiles a standalone node with an empty registry.
    pub fn new(node: impl Into<SchemaNode>) -> Result<Self, RegistryError> {
        SchemaRegistry::new().compile_node(node)
    }

    pub fn arena(&self) -> &SchemaArena {
        &self.arena
    }

    pub fn root(&self) -> &SchemaNode {
        &self.root
    }

    /// The registered id of the root, when compiled from a registry name.
    pub fn root_id(&self) -> Option<&str> {
        self.root_id.as_deref()
    }

    /// Validates with default options.
    pub fn validate(&self, input: &Value) -> Result<Validation<Value, ValidationErrors>, SchemaFault> {
        self.validate_with(input, &ValidateOptions::default())
    }

    pub fn validate_with(
        &self,
        input: &Value,
        options: &ValidateOptions,
    ) -> Result<Validation<Value, ValidationErrors>, SchemaFault> {
        ValidationRunner::new(&self.arena).validate(&self.root, input, options)
    }

    /// Parses JSON text and validates it. Unparseable text fails with a
    /// single `json_invalid` record.
    pub fn validate_json(&self, text: &str) -> Result<Validation<Value, ValidationErrors>, SchemaFault> {
        self.validate_json_with(text, &ValidateOptions::default())
    }

    pub fn validate_json_with(
        &self,
        text: &str,
        options: &ValidateOptions,
    ) -> Result<Validation<Value, ValidationErrors>, SchemaFault> {
        match serde_json::from_str::<serde_json::Value>(text) {
            Ok(parsed) => self.validate_with(&Value::from(parsed), options),
            Err(err) => Ok(Validation::Failure(ValidationErrors::single(
                ErrorRecord::new(ErrorKind::JsonInvalid, Location::root())
                    .with_context("error", err.to_string())
                    .with_input(Value::from(text)),
            ))),
        }
    }

    /// Validates every input in parallel; results keep the input order.
    pub fn validate_batch(
        &self,
        inputs: &[Value],
        options: &ValidateOptions,
    ) -> Vec<Result<Validation<Value, ValidationErrors>, SchemaFault>> {
        inputs
            .par_iter()
            .map(|input| self.validate_with(input, options))
            .collect()
    }

    /// Dumps a validated value.
    pub fn dump(&self, value: &Value, options: &DumpOptions) -> Result<Value, SerializeError> {
        SerializationRunner::new(&self.arena, options).dump(&self.root, value)
    }

    /// Dumps a validated value as JSON, regardless of `options.mode`.
    pub fn dump_json(&self, value: &Value, options: &DumpOptions) -> Result<serde_json::Value, SerializeError> {
        let options = DumpOptions {
            mode: DumpMode::Json,
            ..options.clone()
        };
        Ok(self.dump(value, &options)?.to_json())
    }

    /// Dumps a validated value as JSON text.
    pub fn dump_json_text(&self, value: &Value, options: &DumpOptions) -> Result<String, SerializeError> {
        let json = self.dump_json(value, options)?;
        Ok(serde_json::to_string(&json)?)
    }

    /// The compiled tree in serializable form.
    pub fn describe(&self) -> SchemaTree {
        SchemaTree::build(&self.arena, &self.root, self.root_id.as_deref())
    }
}

const _: () = {
    const fn assert_send<T: Send>() {}
    const fn assert_sync<T: Sync>() {}
    assert_send::<CompiledSchema>();
    assert_sync::<CompiledSchema>();
};

/// Errors that can occur during registration and compilation.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("schema '{0}' already registered")]
    DuplicateName(String),

    #[error("schema '{0}' not found")]
    SchemaNotFound(String),

    #[error("unresolved references: {}", .0.join(", "))]
    UnresolvedReferences(Vec<String>),

    #[error("tagged union '{union}' has untagged member '{member}'")]
    UntaggedMember { union: String, member: String },
}
