//! # Schemata
//!
//! A schema-driven validation and serialization core that accumulates ALL
//! validation errors instead of stopping at the first one.
//!
//! ## Overview
//!
//! A schema is a tree of [`SchemaNode`]s built through [`Schema`]: scalars,
//! sequences, mappings, models with named fields, unions, wrapped nodes
//! carrying validator stages, and references to registered nodes. The tree is
//! compiled once into a [`CompiledSchema`] and then used repeatedly to
//!
//! - validate untrusted input into a normalized [`Value`], reporting every
//!   failing leaf as an [`ErrorRecord`] with its full [`Location`], and
//! - dump validated values back into dicts or JSON under [`DumpOptions`].
//!
//! Validation results use stillwater's `Validation` type, so a failure always
//! carries the complete, non-empty set of records.
//!
//! ## Core Types
//!
//! - [`ValidatorChain`]: ordered before/after/wrap/plain stages on a node
//! - [`UnionResolver`]: smart, left-to-right and discriminated member selection
//! - [`AliasResolver`]: external to internal field names, both directions
//! - [`ValidationRunner`] / [`SerializationRunner`]: the two traversals
//! - [`SchemaRegistry`]: named nodes for references and recursive shapes
//!
//! ## Example
//!
//! ```rust
//! use schemata::{CompiledSchema, DumpOptions, Schema, Value};
//! use serde_json::json;
//!
//! let user = Schema::model("User")
//!     .field("name", Schema::str().min_length(1))
//!     .field("age", Schema::int().ge(0))
//!     .field("tags", Schema::list(Schema::str()));
//!
//! let schema = CompiledSchema::new(user).unwrap();
//!
//! // Every problem is reported, each with its own path
//! let result = schema
//!     .validate(&Value::from(json!({"name": "", "age": -1, "tags": ["a", 2]})))
//!     .unwrap();
//! let errors = result.into_result().unwrap_err();
//! assert_eq!(errors.len(), 3);
//!
//! // Valid input round-trips through dump
//! let user = schema
//!     .validate(&Value::from(json!({"name": "Ada", "age": "36", "tags": []})))
//!     .unwrap()
//!     .into_result()
//!     .unwrap();
//! let dumped = schema.dump_json(&user, &DumpOptions::new()).unwrap();
//! assert_eq!(dumped, json!({"name": "Ada", "age": 36, "tags": []}));
//! ```

pub mod alias;
pub mod chain;
pub mod describe;
pub mod error;
pub mod path;
pub mod registry;
pub mod schema;
pub mod serializer;
pub mod union;
pub mod validator;
pub mod value;

pub use alias::{
    AliasFn, AliasGenerator, AliasPath, AliasPriority, AliasResolver, ResolvedAliases,
    ValidationAlias, ValidationAliasFn,
};
pub use chain::{Next, StageFn, StageInfo, ValidatorChain, ValidatorStage, WrapFn};
pub use describe::{
    ConstraintsDescription, FieldDescription, MemberDescription, NodeDescription, SchemaTree,
};
pub use error::{
    ErrorAccumulator, ErrorContext, ErrorKind, ErrorRecord, SchemaFault, StageError,
    ValidationErrors,
};
pub use path::{LocItem, Location};
pub use registry::{CompiledSchema, RegistryError, SchemaArena, SchemaRegistry, DEFAULT_MAX_DEPTH};
pub use schema::{
    Constraints, DefaultFactory, Discriminator, DiscriminatorFn, ExtraPolicy, FieldDefault,
    FieldDescriptor, MappingSchema, ModelConfig, ModelSchema, NodeId, Pattern,
    RevalidateInstances, ScalarKind, ScalarSchema, Schema, SchemaNode, SequenceSchema,
    SerializeAs, Tag, UnionMember, UnionMode, UnionSchema, WrappedSchema,
};
pub use serializer::{
    DumpMode, DumpOptions, PlainSerializeFn, SerializationRunner, SerializeError, SerializeInfo,
    SerializeNext, SerializerStage, Selector, WrapSerializeFn,
};
pub use union::UnionResolver;
pub use validator::{Exactness, ValidateOptions, ValidationRunner, ValidationState};
pub use value::{Dict, ModelInstance, Value};

/// Type alias for validation outcomes.
pub type ValidationResult<T> = stillwater::Validation<T, ValidationErrors>;
