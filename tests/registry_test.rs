//! Integration tests for registration, compilation and schema export.

use schemata::{
    CompiledSchema, Discriminator, RegistryError, Schema, SchemaRegistry, UnionMember, Value,
};
use serde_json::json;

#[test]
fn test_register_and_get() {
    let registry = SchemaRegistry::new();
    registry.register("Age", Schema::int().ge(0)).unwrap();

    assert!(registry.contains("Age"));
    assert!(registry.get("Age").is_some());
    assert!(registry.get("Name").is_none());
}

#[test]
fn test_duplicate_registration_is_rejected() {
    let registry = SchemaRegistry::new();
    registry.register("Age", Schema::int()).unwrap();

    let err = registry.register("Age", Schema::str()).unwrap_err();
    assert!(matches!(err, RegistryError::DuplicateName(ref name) if name == "Age"));
    assert_eq!(err.to_string(), "schema 'Age' already registered");
}

#[test]
fn test_compile_unknown_root() {
    let err = SchemaRegistry::new().compile("Ghost").unwrap_err();
    assert!(matches!(err, RegistryError::SchemaNotFound(ref name) if name == "Ghost"));
}

#[test]
fn test_unresolved_references_are_listed_sorted() {
    let registry = SchemaRegistry::new();
    registry
        .register_model(
            Schema::model("Order")
                .field("customer", Schema::reference("Customer"))
                .field("address", Schema::reference("Address")),
        )
        .unwrap();

    assert_eq!(registry.validate_refs(), vec!["Address", "Customer"]);

    let err = registry.compile("Order").unwrap_err();
    assert_eq!(err.to_string(), "unresolved references: Address, Customer");

    registry.register("Customer", Schema::str()).unwrap();
    registry.register("Address", Schema::str()).unwrap();
    assert!(registry.validate_refs().is_empty());
    assert!(registry.compile("Order").is_ok());
}

#[test]
fn test_clones_share_registrations() {
    let registry = SchemaRegistry::new();
    let handle = registry.clone();
    handle.register("Flag", Schema::bool()).unwrap();
    assert!(registry.contains("Flag"));
}

#[test]
fn test_compiled_schema_is_a_snapshot() {
    let registry = SchemaRegistry::new();
    registry.register("Id", Schema::int()).unwrap();
    let schema = registry.compile("Id").unwrap();

    registry.register("Late", Schema::str()).unwrap();
    assert_eq!(schema.arena().ids(), vec!["Id"]);
    assert_eq!(schema.root_id(), Some("Id"));
}

#[test]
fn test_tagged_union_members_need_tags() {
    let registry = SchemaRegistry::new();
    registry
        .register_model(Schema::model("Cat").field("kind", Schema::literal(["cat"])))
        .unwrap();

    let untagged = Schema::tagged_union(
        Discriminator::field("kind"),
        [UnionMember::new(Schema::reference("Cat"))],
    );
    let err = registry.compile_node(untagged).unwrap_err();
    assert!(matches!(err, RegistryError::UntaggedMember { .. }));

    let tagged = Schema::tagged_union(
        Discriminator::field("kind"),
        [UnionMember::new(Schema::reference("Cat")).tag("cat")],
    );
    let schema = registry.compile_node(tagged).unwrap();
    assert!(schema
        .validate(&Value::from(json!({"kind": "cat"})))
        .unwrap()
        .is_success());
}

#[test]
fn test_registered_name_wins_over_inline_model() {
    let registry = SchemaRegistry::new();
    registry
        .register_model(Schema::model("Point").field("x", Schema::int()).field("y", Schema::int()))
        .unwrap();

    let schema = registry
        .compile_node(Schema::list(Schema::model("Point").field("x", Schema::int())))
        .unwrap();
    let point = schema.arena().model("Point").unwrap();
    assert_eq!(point.resolved_fields().count(), 2);
}

#[test]
fn test_describe_lists_definitions() {
    let registry = SchemaRegistry::new();
    registry
        .register_model(
            Schema::model("Node")
                .field("value", Schema::int())
                .optional("next", Schema::nullable(Schema::reference("Node"))),
        )
        .unwrap();
    let schema = registry.compile("Node").unwrap();

    let tree = serde_json::to_value(schema.describe()).unwrap();
    assert_eq!(tree["root"], json!({"type": "ref", "id": "Node"}));

    let node = &tree["definitions"]["Node"];
    assert_eq!(node["type"], "model");
    assert_eq!(node["fields"][0]["name"], "value");
    assert_eq!(node["fields"][0]["required"], true);
    assert_eq!(node["fields"][1]["required"], false);
    assert_eq!(node["fields"][1]["schema"]["type"], "union");
    assert_eq!(
        node["fields"][1]["schema"]["members"][0]["schema"],
        json!({"type": "ref", "id": "Node"})
    );
}

#[test]
fn test_describe_inline_root() {
    let schema = CompiledSchema::new(Schema::list(Schema::literal(["a", "b"])).min_length(1)).unwrap();
    let tree = serde_json::to_value(schema.describe()).unwrap();

    assert_eq!(tree["root"]["type"], "sequence");
    assert_eq!(tree["root"]["constraints"], json!({"min_length": 1}));
    assert_eq!(tree["root"]["item"]["kind"], "literal");
    assert_eq!(tree["root"]["item"]["values"], json!(["a", "b"]));
    assert_eq!(tree["definitions"], json!({}));
}
