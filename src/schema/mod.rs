//! Schema definitions.
//!
//! This module provides the node types of the schema tree and [`Schema`],
//! the entry point for building them. Builders convert into [`SchemaNode`]
//! wherever a child schema is expected.
//!
//! # Example
//!
//! ```rust
//! use schemata::{Schema, SchemaNode};
//!
//! let node: SchemaNode = Schema::model("Order")
//!     .field("id", Schema::int().gt(0))
//!     .field("items", Schema::list(Schema::str()).min_length(1))
//!     .into();
//!
//! assert_eq!(node.label(), "Order");
//! ```

mod model;
mod node;
mod scalar;

pub use model::{
    DefaultFactory, ExtraPolicy, FieldDefault, FieldDescriptor, ModelConfig, ModelSchema,
    RevalidateInstances, SerializeAs,
};
pub use node::{
    Discriminator, DiscriminatorFn, MappingSchema, NodeId, SchemaNode, SequenceSchema, Tag,
    UnionMember, UnionMode, UnionSchema, WrappedSchema,
};
pub use scalar::{Constraints, Pattern, ScalarKind, ScalarSchema};

pub(crate) use scalar::expected_literals;

use crate::value::Value;

/// Entry point for creating schema nodes.
///
/// Each factory returns a builder that supports constraints through chained
/// methods.
///
/// # Example
///
/// ```rust
/// use schemata::{Discriminator, Schema};
///
/// let cat = Schema::model("Cat")
///     .field("kind", Schema::literal(["cat"]))
///     .field("lives", Schema::int());
/// let dog = Schema::model("Dog")
///     .field("kind", Schema::literal(["dog"]))
///     .field("good", Schema::bool());
///
/// let pet = Schema::tagged_union(Discriminator::field("kind"), [cat, dog]);
/// assert_eq!(pet.members.len(), 2);
/// ```
pub struct Schema;

impl Schema {
    /// Accepts any value as-is.
    pub fn any() -> ScalarSchema {
        ScalarSchema::new(ScalarKind::Any)
    }

    /// Accepts only `None`.
    pub fn none() -> ScalarSchema {
        ScalarSchema::new(ScalarKind::None)
    }

    pub fn bool() -> ScalarSchema {
        ScalarSchema::new(ScalarKind::Bool)
    }

    /// Creates an integer schema.
    ///
    /// In lax mode numeric strings, bools and whole floats are accepted.
    pub fn int() -> ScalarSchema {
        ScalarSchema::new(ScalarKind::Int)
    }

    /// Creates a float schema. Integers are accepted even in strict mode.
    pub fn float() -> ScalarSchema {
        ScalarSchema::new(ScalarKind::Float)
    }

    pub fn str() -> ScalarSchema {
        ScalarSchema::new(ScalarKind::Str)
    }

    /// Accepts exactly one of `values`.
    pub fn literal<I, V>(values: I) -> ScalarSchema
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        ScalarSchema::new(ScalarKind::Literal(
            values.into_iter().map(Into::into).collect(),
        ))
    }

    pub fn list(item: impl Into<SchemaNode>) -> SequenceSchema {
        SequenceSchema::new(item)
    }

    pub fn dict(key: impl Into<SchemaNode>, value: impl Into<SchemaNode>) -> MappingSchema {
        MappingSchema::new(key, value)
    }

    /// Creates a model named `name`; the name is also its registry id.
    pub fn model(name: impl Into<String>) -> ModelSchema {
        ModelSchema::new(name)
    }

    /// Creates an untagged union in smart mode.
    pub fn union<I, M>(members: I) -> UnionSchema
    where
        I: IntoIterator<Item = M>,
        M: Into<UnionMember>,
    {
        UnionSchema::new(members)
    }

    /// Creates a union that dispatches on `discriminator`.
    pub fn tagged_union<I, M>(discriminator: Discriminator, members: I) -> UnionSchema
    where
        I: IntoIterator<Item = M>,
        M: Into<UnionMember>,
    {
        UnionSchema::new(members).discriminator(discriminator)
    }

    /// Creates a reference to a node registered under `id`.
    pub fn reference(id: impl Into<String>) -> SchemaNode {
        SchemaNode::Ref(id.into())
    }

    /// Wraps `inner` so validator stages and a serializer can be attached.
    pub fn wrapped(inner: impl Into<SchemaNode>) -> WrappedSchema {
        WrappedSchema::new(inner)
    }

    /// Makes `inner` nullable: a smart union of `inner` and `None`.
    pub fn nullable(inner: impl Into<SchemaNode>) -> UnionSchema {
        let inner: SchemaNode = inner.into();
        UnionSchema::new([inner, SchemaNode::from(Schema::none())])
    }
}
