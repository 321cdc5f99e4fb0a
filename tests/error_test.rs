//! Integration tests for the error wire shape and JSON input.

use schemata::{CompiledSchema, ErrorAccumulator, ErrorKind, ErrorRecord, Location, Schema, Value};
use serde_json::json;
use stillwater::Validation;

fn unwrap_failure<T: std::fmt::Debug, E>(v: Validation<T, E>) -> E {
    v.into_result().unwrap_err()
}

#[test]
fn test_wire_shape() {
    let schema = CompiledSchema::new(
        Schema::model("Item")
            .field("name", Schema::str().max_length(3))
            .field("tags", Schema::list(Schema::int())),
    )
    .unwrap();

    let errors = unwrap_failure(
        schema
            .validate(&Value::from(json!({"name": "long", "tags": [1, "x"]})))
            .unwrap(),
    );
    assert_eq!(
        errors.to_json(),
        json!([
            {
                "kind": "string_too_long",
                "path": ["name"],
                "message": "String should have at most 3 characters",
                "input": "long",
                "context": {"max_length": 3}
            },
            {
                "kind": "int_parsing",
                "path": ["tags", 1],
                "message": "Input should be a valid integer, unable to parse string as an integer",
                "input": "x"
            }
        ])
    );
}

#[test]
fn test_invalid_json_text() {
    let schema = CompiledSchema::new(Schema::int()).unwrap();
    let errors = unwrap_failure(schema.validate_json("{not json").unwrap());

    assert_eq!(errors.len(), 1);
    let record = errors.first();
    assert_eq!(record.kind, "json_invalid");
    assert!(record.message.starts_with("Invalid JSON: "));
    assert_eq!(record.input, Some(Value::from("{not json")));
}

#[test]
fn test_json_text_is_validated() {
    let schema = CompiledSchema::new(Schema::list(Schema::int())).unwrap();
    let value = schema.validate_json("[1, \"2\"]").unwrap().into_result().unwrap();
    assert_eq!(value, Value::from(json!([1, 2])));
}

#[test]
fn test_lookup_helpers() {
    let schema = CompiledSchema::new(
        Schema::model("Pair")
            .field("a", Schema::int())
            .field("b", Schema::int()),
    )
    .unwrap();
    let errors = unwrap_failure(schema.validate(&Value::from(json!({"a": "x"}))).unwrap());

    assert_eq!(errors.with_kind("missing").len(), 1);
    assert_eq!(errors.at_path(&Location::from_items(["a"])).len(), 1);
    assert!(errors.to_string().starts_with("2 validation error(s):"));
}

#[test]
fn test_accumulator_collects_in_order() {
    let mut acc = ErrorAccumulator::new();
    assert!(acc.is_empty());
    acc.push(ErrorRecord::new(ErrorKind::Missing, Location::from_items(["a"])));
    acc.push(ErrorRecord::new(ErrorKind::IntType, Location::from_items(["b"])));

    let outcome: Validation<(), _> = acc.finish(());
    let errors = unwrap_failure(outcome);
    let kinds: Vec<&str> = errors.iter().map(|e| e.kind.as_str()).collect();
    assert_eq!(kinds, vec!["missing", "int_type"]);
}

#[test]
fn test_display_includes_path_and_input() {
    let record = ErrorRecord::new(ErrorKind::IntParsing, Location::root().push("age"))
        .with_input(Value::from("old"));
    assert_eq!(
        record.to_string(),
        "age: Input should be a valid integer, unable to parse string as an integer [kind=int_parsing, input='old']"
    );
}
