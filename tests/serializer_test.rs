//! Integration tests for dumping validated values.

use schemata::{
    CompiledSchema, Dict, DumpMode, DumpOptions, FieldDescriptor, ModelConfig, ModelInstance,
    Schema, SchemaRegistry, Selector, SerializeAs, StageError, Value,
};
use serde_json::json;
use stillwater::Validation;

fn unwrap_success<T, E: std::fmt::Debug>(v: Validation<T, E>) -> T {
    v.into_result().unwrap()
}

fn fields(pairs: &[(&str, Value)]) -> Dict {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

fn profile() -> schemata::ModelSchema {
    Schema::model("Profile")
        .with_field(FieldDescriptor::new("user_id", Schema::int()).alias("userId"))
        .field("name", Schema::str())
        .optional("nickname", Schema::str())
        .default("role", Schema::str(), "member")
        .with_field(FieldDescriptor::new("password", Schema::str()).exclude())
        .field("scores", Schema::list(Schema::float()))
}

fn validated(schema: &CompiledSchema, input: serde_json::Value) -> Value {
    unwrap_success(schema.validate(&Value::from(input)).unwrap())
}

#[test]
fn test_dump_by_alias_round_trips() {
    let schema = CompiledSchema::new(profile()).unwrap();
    let value = validated(
        &schema,
        json!({"userId": "4", "name": "Ada", "password": "pw", "scores": [1, 2.5]}),
    );

    let dumped = schema
        .dump(&value, &DumpOptions::new().by_alias(true).exclude_none(true))
        .unwrap();
    assert_eq!(dumped.get("userId"), Some(&Value::Int(4)));
    assert!(dumped.get("nickname").is_none());
    assert!(dumped.get("password").is_none());

    let mut again = dumped.as_dict().unwrap().clone();
    again.insert("password".into(), Value::from("pw"));
    let revalidated = unwrap_success(schema.validate(&Value::Dict(again)).unwrap());
    assert_eq!(revalidated.get("user_id"), value.get("user_id"));
    assert_eq!(revalidated.get("scores"), value.get("scores"));
    assert_eq!(revalidated.get("role"), value.get("role"));
}

#[test]
fn test_field_exclude_beats_include() {
    let schema = CompiledSchema::new(profile()).unwrap();
    let value = validated(
        &schema,
        json!({"userId": 1, "name": "Ada", "password": "pw", "scores": []}),
    );

    let dumped = schema
        .dump_json(
            &value,
            &DumpOptions::new().include(Selector::keys(["name", "password"])),
        )
        .unwrap();
    assert_eq!(dumped, json!({"name": "Ada"}));
}

#[test]
fn test_exclude_flags_are_independent() {
    let schema = CompiledSchema::new(profile()).unwrap();
    let value = validated(
        &schema,
        json!({"userId": 1, "name": "Ada", "role": "member", "password": "pw", "scores": []}),
    );

    let unset = schema
        .dump_json(&value, &DumpOptions::new().exclude_unset(true))
        .unwrap();
    assert_eq!(unset, json!({"user_id": 1, "name": "Ada", "role": "member", "scores": []}));

    let defaults = schema
        .dump_json(&value, &DumpOptions::new().exclude_defaults(true))
        .unwrap();
    assert_eq!(defaults, json!({"user_id": 1, "name": "Ada", "scores": []}));

    let none = schema
        .dump_json(&value, &DumpOptions::new().exclude_none(true))
        .unwrap();
    assert_eq!(none, json!({"user_id": 1, "name": "Ada", "role": "member", "scores": []}));

    let everything = schema
        .dump_json(&value, &DumpOptions::new())
        .unwrap();
    assert_eq!(
        everything,
        json!({"user_id": 1, "name": "Ada", "nickname": null, "role": "member", "scores": []})
    );
}

#[test]
fn test_exclude_defaults_compares_factory_output() {
    let schema = CompiledSchema::new(
        Schema::model("Bag").with_field(
            FieldDescriptor::new("items", Schema::list(Schema::int()))
                .default_factory(|| Value::List(Vec::new())),
        ),
    )
    .unwrap();

    let options = DumpOptions::new().exclude_defaults(true);
    let empty = validated(&schema, json!({"items": []}));
    assert_eq!(schema.dump_json(&empty, &options).unwrap(), json!({}));

    let full = validated(&schema, json!({"items": [1]}));
    assert_eq!(schema.dump_json(&full, &options).unwrap(), json!({"items": [1]}));
}

#[test]
fn test_exclude_defaults_compares_numbers_across_int_and_float() {
    let schema = CompiledSchema::new(
        Schema::model("Gauge")
            .field("label", Schema::str())
            .default("ratio", Schema::float(), 0),
    )
    .unwrap();
    let options = DumpOptions::new().exclude_defaults(true);

    let zero = validated(&schema, json!({"label": "g", "ratio": 0.0}));
    assert_eq!(zero.get("ratio"), Some(&Value::Float(0.0)));
    assert_eq!(schema.dump_json(&zero, &options).unwrap(), json!({"label": "g"}));

    let half = validated(&schema, json!({"label": "g", "ratio": 0.5}));
    assert_eq!(
        schema.dump_json(&half, &options).unwrap(),
        json!({"label": "g", "ratio": 0.5})
    );
}

#[test]
fn test_nested_selectors_with_all_and_negative_indexes() {
    let line = Schema::model("Line")
        .field("sku", Schema::str())
        .field("qty", Schema::int())
        .field("note", Schema::str());
    let schema = CompiledSchema::new(
        Schema::model("Order")
            .field("id", Schema::int())
            .field("lines", Schema::list(line)),
    )
    .unwrap();
    let value = validated(
        &schema,
        json!({"id": 9, "lines": [
            {"sku": "a", "qty": 1, "note": "x"},
            {"sku": "b", "qty": 2, "note": "y"},
            {"sku": "c", "qty": 3, "note": "z"}
        ]}),
    );

    let exclude = Selector::from_json(&json!({
        "lines": {"__all__": ["note"], "-1": true}
    }))
    .unwrap();
    let dumped = schema
        .dump_json(&value, &DumpOptions::new().exclude(exclude))
        .unwrap();
    assert_eq!(
        dumped,
        json!({"id": 9, "lines": [{"sku": "a", "qty": 1}, {"sku": "b", "qty": 2}]})
    );

    let include = Selector::new()
        .key("lines", Selector::new().index(0, Selector::All).index(-1, Selector::keys(["sku"])));
    let dumped = schema
        .dump_json(&value, &DumpOptions::new().include(include))
        .unwrap();
    assert_eq!(
        dumped,
        json!({"lines": [{"sku": "a", "qty": 1, "note": "x"}, {"sku": "c"}]})
    );
}

#[test]
fn test_mapping_selectors() {
    let schema = CompiledSchema::new(Schema::dict(Schema::str(), Schema::int())).unwrap();
    let value = validated(&schema, json!({"a": 1, "b": 2, "c": 3}));
    let dumped = schema
        .dump_json(&value, &DumpOptions::new().exclude(Selector::keys(["b"])))
        .unwrap();
    assert_eq!(dumped, json!({"a": 1, "c": 3}));
}

fn pets_registry() -> SchemaRegistry {
    let pet = Schema::model("Pet").field("name", Schema::str());
    let dog = Schema::model("Dog").inherit(&pet).field("breed", Schema::str());
    let registry = SchemaRegistry::new();
    registry.register_model(pet).unwrap();
    registry.register_model(dog).unwrap();
    registry
}

fn rex() -> Value {
    Value::from(ModelInstance::new(
        "Dog",
        fields(&[("name", Value::from("Rex")), ("breed", Value::from("collie"))]),
    ))
}

fn owner_of(rex: Value) -> Value {
    Value::from(ModelInstance::new("Owner", fields(&[("pet", rex)])))
}

#[test]
fn test_declared_type_drives_dump_by_default() {
    let registry = pets_registry();
    registry
        .register_model(Schema::model("Owner").field("pet", Schema::reference("Pet")))
        .unwrap();
    let schema = registry.compile("Owner").unwrap();

    let owner = owner_of(rex());
    let declared = schema.dump_json(&owner, &DumpOptions::new()).unwrap();
    assert_eq!(declared, json!({"pet": {"name": "Rex"}}));

    let runtime = schema
        .dump_json(&owner, &DumpOptions::new().serialize_as_any(true))
        .unwrap();
    assert_eq!(runtime, json!({"pet": {"name": "Rex", "breed": "collie"}}));
}

#[test]
fn test_field_level_duck_typing() {
    let registry = pets_registry();
    registry
        .register_model(Schema::model("Owner").with_field(
            FieldDescriptor::new("pet", Schema::reference("Pet")).serialize_as(SerializeAs::Runtime),
        ))
        .unwrap();
    let schema = registry.compile("Owner").unwrap();

    let dumped = schema.dump_json(&owner_of(rex()), &DumpOptions::new()).unwrap();
    assert_eq!(dumped, json!({"pet": {"name": "Rex", "breed": "collie"}}));
}

#[test]
fn test_model_config_duck_typing_overrides_call() {
    let pet = Schema::model("Pet")
        .field("name", Schema::str())
        .config(ModelConfig::new().with_serialize_as(SerializeAs::Declared));
    let dog = Schema::model("Dog").inherit(&pet).field("breed", Schema::str());
    let registry = SchemaRegistry::new();
    registry.register_model(pet).unwrap();
    registry.register_model(dog).unwrap();
    let schema = registry.compile("Pet").unwrap();

    let dumped = schema
        .dump_json(&rex(), &DumpOptions::new().serialize_as_any(true))
        .unwrap();
    assert_eq!(dumped, json!({"name": "Rex"}));
}

#[test]
fn test_union_dump_picks_matching_member() {
    let cat = Schema::model("Cat").field("lives", Schema::int());
    let schema = CompiledSchema::new(Schema::union([
        schemata::UnionMember::from(cat),
        schemata::UnionMember::from(Schema::float()),
        schemata::UnionMember::from(Schema::list(Schema::str())),
    ]))
    .unwrap();

    let tom = validated(&schema, json!({"lives": 9}));
    assert_eq!(schema.dump_json(&tom, &DumpOptions::new()).unwrap(), json!({"lives": 9}));
    assert_eq!(schema.dump(&Value::Int(3), &DumpOptions::new()).unwrap(), Value::Int(3));
    assert_eq!(
        schema.dump_json(&Value::from(json!(["a"])), &DumpOptions::new()).unwrap(),
        json!(["a"])
    );
}

#[test]
fn test_mismatched_value_falls_back_to_inference() {
    let schema = CompiledSchema::new(Schema::union([Schema::int(), Schema::bool()])).unwrap();
    let dumped = schema
        .dump_json(&Value::from(json!({"odd": [1, "two"]})), &DumpOptions::new())
        .unwrap();
    assert_eq!(dumped, json!({"odd": [1, "two"]}));

    let list = CompiledSchema::new(Schema::list(Schema::int())).unwrap();
    assert_eq!(
        list.dump(&Value::from("loose"), &DumpOptions::new()).unwrap(),
        Value::from("loose")
    );
}

#[test]
fn test_plain_serializer_replaces_dump() {
    let cents = Schema::wrapped(Schema::int()).serialize_plain(|v, info| {
        let amount = v.as_i64().unwrap_or_default();
        Ok(match info.mode {
            DumpMode::Json => Value::from(format!("{}.{:02}", amount / 100, amount % 100)),
            DumpMode::Python => v,
        })
    });
    let schema = CompiledSchema::new(Schema::model("Price").field("amount", cents)).unwrap();
    let value = validated(&schema, json!({"amount": 1250}));

    assert_eq!(
        schema.dump_json(&value, &DumpOptions::new()).unwrap(),
        json!({"amount": "12.50"})
    );
    assert_eq!(
        schema.dump(&value, &DumpOptions::new()).unwrap().get("amount"),
        Some(&Value::Int(1250))
    );
}

#[test]
fn test_wrap_serializer_sees_inner_output_and_field_name() {
    let tagged = Schema::wrapped(Schema::list(Schema::int())).serialize_wrap(|v, next, info| {
        let inner = next.call(v)?;
        let mut out = Dict::new();
        out.insert(info.field_name.unwrap_or("?").to_string(), inner);
        Ok(Value::Dict(out))
    });
    let schema = CompiledSchema::new(Schema::model("Holder").field("values", tagged)).unwrap();
    let value = validated(&schema, json!({"values": ["1", 2]}));

    let dumped = schema.dump_json(&value, &DumpOptions::new()).unwrap();
    assert_eq!(dumped, json!({"values": {"values": [1, 2]}}));
}

#[test]
fn test_plain_serializer_output_keeps_duck_typing_and_selectors() {
    let registry = pets_registry();
    registry
        .register_model(Schema::model("Owner").field("pet", Schema::reference("Pet")))
        .unwrap();
    let passthrough = Schema::wrapped(Schema::reference("Owner")).serialize_plain(|v, _| Ok(v));
    let schema = registry.compile_node(passthrough).unwrap();
    let owner = owner_of(rex());

    let runtime = schema
        .dump_json(&owner, &DumpOptions::new().serialize_as_any(true))
        .unwrap();
    assert_eq!(runtime, json!({"pet": {"name": "Rex", "breed": "collie"}}));

    let trimmed = schema
        .dump_json(
            &owner,
            &DumpOptions::new()
                .serialize_as_any(true)
                .exclude(Selector::new().key("pet", Selector::keys(["breed"]))),
        )
        .unwrap();
    assert_eq!(trimmed, json!({"pet": {"name": "Rex"}}));
}

#[test]
fn test_wrap_serializer_output_is_filtered_once() {
    let passthrough =
        Schema::wrapped(Schema::list(Schema::int())).serialize_wrap(|v, next, _| next.call(v));
    let schema = CompiledSchema::new(passthrough).unwrap();
    let value = Value::from(json!([1, 2, 3]));

    let dumped = schema
        .dump_json(&value, &DumpOptions::new().exclude(Selector::new().index(-1, Selector::All)))
        .unwrap();
    assert_eq!(dumped, json!([1, 2]));
}

#[test]
fn test_serializer_errors_become_faults() {
    let failing = Schema::wrapped(Schema::int())
        .serialize_plain(|_, _| Err(StageError::value("cannot dump")));
    let schema = CompiledSchema::new(failing).unwrap();

    let err = schema.dump(&Value::Int(1), &DumpOptions::new()).unwrap_err();
    assert!(err.to_string().contains("cannot dump"));
}

#[test]
fn test_serializer_reads_context() {
    let masked = Schema::wrapped(Schema::str()).serialize_plain(|v, info| {
        let reveal = info
            .context
            .and_then(|c| c.get("reveal"))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        Ok(if reveal { v } else { Value::from("***") })
    });
    let schema = CompiledSchema::new(masked).unwrap();

    let hidden = schema.dump(&Value::from("secret"), &DumpOptions::new()).unwrap();
    assert_eq!(hidden, Value::from("***"));

    let shown = schema
        .dump(
            &Value::from("secret"),
            &DumpOptions::new().context(json!({"reveal": true})),
        )
        .unwrap();
    assert_eq!(shown, Value::from("secret"));
}

#[test]
fn test_extras_are_dumped_after_fields() {
    let schema = CompiledSchema::new(
        Schema::model("Open")
            .field("id", Schema::int())
            .config(ModelConfig::new().with_extra(schemata::ExtraPolicy::Allow)),
    )
    .unwrap();
    let value = validated(&schema, json!({"note": "hi", "id": 1}));

    assert_eq!(
        schema.dump_json_text(&value, &DumpOptions::new()).unwrap(),
        r#"{"id":1,"note":"hi"}"#
    );
}
