//! Serializable export of a compiled schema tree.
//!
//! Renderers (JSON Schema generators, documentation tools) consume a
//! [`SchemaTree`] rather than the live nodes: it holds plain data only, with
//! every model and registered node listed once under `definitions` and
//! referenced from everywhere else by id.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::alias::ResolvedAliases;
use crate::registry::SchemaArena;
use crate::schema::{
    Constraints, ExtraPolicy, FieldDefault, FieldDescriptor, ModelSchema, ScalarKind,
    SchemaNode, Tag, UnionMode,
};
use crate::value::Value;

/// The compiled tree: a root description and the definitions it refers to.
///
/// # Example
///
/// ```rust
/// use schemata::{CompiledSchema, Schema};
/// use serde_json::json;
///
/// let schema = CompiledSchema::new(
///     Schema::model("Tag").field("label", Schema::str().max_length(20)),
/// )
/// .unwrap();
///
/// let tree = serde_json::to_value(schema.describe()).unwrap();
/// assert_eq!(tree["root"], json!({"type": "ref", "id": "Tag"}));
/// assert_eq!(tree["definitions"]["Tag"]["type"], "model");
/// assert_eq!(
///     tree["definitions"]["Tag"]["fields"][0]["schema"]["constraints"],
///     json!({"max_length": 20})
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaTree {
    pub root: NodeDescription,
    pub definitions: BTreeMap<String, NodeDescription>,
}

impl SchemaTree {
    pub(crate) fn build(arena: &SchemaArena, root: &SchemaNode, root_id: Option<&str>) -> Self {
        let root = match root_id {
            Some(id) => NodeDescription::Ref { id: id.to_string() },
            None => describe(root, false),
        };
        let definitions = arena
            .ids()
            .into_iter()
            .filter_map(|id| arena.get(id).map(|node| (id.to_string(), describe(node, true))))
            .collect();
        Self { root, definitions }
    }
}

/// One node, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeDescription {
    Scalar {
        kind: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        values: Option<Vec<Value>>,
        #[serde(skip_serializing_if = "ConstraintsDescription::is_empty")]
        constraints: ConstraintsDescription,
    },
    Sequence {
        item: Box<NodeDescription>,
        #[serde(skip_serializing_if = "ConstraintsDescription::is_empty")]
        constraints: ConstraintsDescription,
        fail_fast: bool,
    },
    Mapping {
        key: Box<NodeDescription>,
        value: Box<NodeDescription>,
        #[serde(skip_serializing_if = "ConstraintsDescription::is_empty")]
        constraints: ConstraintsDescription,
    },
    Model {
        name: String,
        fields: Vec<FieldDescription>,
        extra: ExtraPolicy,
        #[serde(skip_serializing_if = "Option::is_none")]
        extras_schema: Option<Box<NodeDescription>>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        bases: Vec<String>,
    },
    Union {
        mode: UnionMode,
        #[serde(skip_serializing_if = "Option::is_none")]
        discriminator: Option<String>,
        members: Vec<MemberDescription>,
    },
    Wrapped {
        inner: Box<NodeDescription>,
        stages: Vec<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        serializer: Option<String>,
    },
    Ref {
        id: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDescription {
    pub name: String,
    pub schema: NodeDescription,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub default_factory: bool,
    pub validation_aliases: Vec<String>,
    pub serialization_alias: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub exclude: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemberDescription {
    pub label: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
    pub schema: NodeDescription,
}

/// Declared constraints; unset ones are omitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConstraintsDescription {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strict: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gt: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ge: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lt: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub le: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multiple_of: Option<Value>,
}

impl ConstraintsDescription {
    pub fn is_empty(&self) -> bool {
        *self == ConstraintsDescription::default()
    }
}

impl From<&Constraints> for ConstraintsDescription {
    fn from(c: &Constraints) -> Self {
        Self {
            strict: c.strict,
            min_length: c.min_length,
            max_length: c.max_length,
            pattern: c.pattern.as_ref().map(|p| p.as_str().to_string()),
            gt: c.gt.clone(),
            ge: c.ge.clone(),
            lt: c.lt.clone(),
            le: c.le.clone(),
            multiple_of: c.multiple_of.clone(),
        }
    }
}

/// Describes `node`. Models below the top level become refs to their
/// definitions.
fn describe(node: &SchemaNode, top: bool) -> NodeDescription {
    match node {
        SchemaNode::Scalar(scalar) => {
            let (kind, values) = match &scalar.kind {
                ScalarKind::Literal(values) => ("literal".to_string(), Some(values.clone())),
                other => (other.label(), None),
            };
            NodeDescription::Scalar {
                kind,
                values,
                constraints: (&scalar.constraints).into(),
            }
        }
        SchemaNode::Sequence(seq) => NodeDescription::Sequence {
            item: Box::new(describe(&seq.item, false)),
            constraints: (&seq.constraints).into(),
            fail_fast: seq.fail_fast,
        },
        SchemaNode::Mapping(map) => NodeDescription::Mapping {
            key: Box::new(describe(&map.key, false)),
            value: Box::new(describe(&map.value, false)),
            constraints: (&map.constraints).into(),
        },
        SchemaNode::Model(model) if !top => NodeDescription::Ref {
            id: model.name.clone(),
        },
        SchemaNode::Model(model) => describe_model(model),
        SchemaNode::Union(union) => NodeDescription::Union {
            mode: union.mode,
            discriminator: union.discriminator.as_ref().map(|d| d.describe()),
            members: union
                .members
                .iter()
                .map(|member| MemberDescription {
                    label: member.label(),
                    tags: member.tags.clone(),
                    schema: describe(&member.schema, false),
                })
                .collect(),
        },
        SchemaNode::Wrapped(wrapped) => NodeDescription::Wrapped {
            inner: Box::new(describe(&wrapped.inner, top)),
            stages: wrapped
                .chain
                .stages()
                .iter()
                .map(|stage| stage.name().to_string())
                .collect(),
            serializer: wrapped.serializer.as_ref().map(|s| s.name().to_string()),
        },
        SchemaNode::Ref(id) => NodeDescription::Ref { id: id.clone() },
    }
}

fn describe_model(model: &ModelSchema) -> NodeDescription {
    NodeDescription::Model {
        name: model.name.clone(),
        fields: model
            .resolved_fields()
            .map(|(field, aliases)| describe_field(field, aliases))
            .collect(),
        extra: model.config.extra,
        extras_schema: model
            .extras_schema
            .as_ref()
            .map(|schema| Box::new(describe(schema, false))),
        bases: model.bases.clone(),
    }
}

fn describe_field(field: &FieldDescriptor, aliases: &ResolvedAliases) -> FieldDescription {
    FieldDescription {
        name: field.name.clone(),
        schema: describe(&field.schema, false),
        required: field.is_required(),
        default: match &field.default {
            FieldDefault::Value(value) => Some(value.clone()),
            _ => None,
        },
        default_factory: matches!(field.default, FieldDefault::Factory(_)),
        validation_aliases: aliases.validation.iter().map(|p| p.to_string()).collect(),
        serialization_alias: aliases.serialization.clone(),
        exclude: field.exclude,
    }
}
