//! Integration tests for validator stages on wrapped nodes.

use schemata::{
    CompiledSchema, ErrorContext, SchemaFault, Schema, StageError, UnionMember, ValidateOptions,
    ValidatorChain, ValidatorStage, Value,
};
use serde_json::json;
use stillwater::Validation;

fn unwrap_success<T, E: std::fmt::Debug>(v: Validation<T, E>) -> T {
    v.into_result().unwrap()
}

fn unwrap_failure<T: std::fmt::Debug, E>(v: Validation<T, E>) -> E {
    v.into_result().unwrap_err()
}

fn even() -> schemata::WrappedSchema {
    Schema::wrapped(Schema::int()).after(|v, _| {
        if v.as_i64().is_some_and(|n| n % 2 == 0) {
            Ok(v)
        } else {
            Err(StageError::value("must be even"))
        }
    })
}

#[test]
fn test_before_stage_prepares_input() {
    let schema = CompiledSchema::new(Schema::wrapped(Schema::int()).before(|v, _| {
        Ok(match v {
            Value::Str(s) => Value::Str(s.replace(',', "")),
            other => other,
        })
    }))
    .unwrap();

    let result = schema.validate(&Value::from("1,000")).unwrap();
    assert_eq!(unwrap_success(result), Value::Int(1000));
}

#[test]
fn test_after_stage_value_error() {
    let schema = CompiledSchema::new(even()).unwrap();

    assert_eq!(unwrap_success(schema.validate(&Value::from("4")).unwrap()), Value::Int(4));

    let errors = unwrap_failure(schema.validate(&Value::Int(3)).unwrap());
    let record = errors.first();
    assert_eq!(record.kind, "value_error");
    assert_eq!(record.message, "Value error, must be even");
    assert_eq!(record.input, Some(Value::Int(3)));
    assert!(record.path.is_root());
}

#[test]
fn test_stage_errors_are_located_at_the_field() {
    let schema = CompiledSchema::new(
        Schema::model("Pair").field("left", even()).field("right", even()),
    )
    .unwrap();

    let errors = unwrap_failure(schema.validate(&Value::from(json!({"left": 1, "right": 3}))).unwrap());
    let paths: Vec<String> = errors.iter().map(|e| e.path.to_string()).collect();
    assert_eq!(paths, vec!["left", "right"]);
}

#[test]
fn test_core_failure_skips_after_stage() {
    let schema = CompiledSchema::new(even()).unwrap();
    let errors = unwrap_failure(schema.validate(&Value::from("x")).unwrap());
    assert_eq!(errors.len(), 1);
    assert_eq!(errors.first().kind, "int_parsing");
}

#[test]
fn test_wrap_stage_recovers_from_inner_failure() {
    let schema = CompiledSchema::new(Schema::wrapped(Schema::int()).wrap(|v, next, _| {
        match next.call(v) {
            Err(StageError::Invalid(_)) => Ok(Value::Int(0)),
            other => other,
        }
    }))
    .unwrap();

    assert_eq!(unwrap_success(schema.validate(&Value::from("abc")).unwrap()), Value::Int(0));
    assert_eq!(unwrap_success(schema.validate(&Value::from("7")).unwrap()), Value::Int(7));
}

#[test]
fn test_plain_stage_replaces_core_check() {
    let schema = CompiledSchema::new(
        Schema::wrapped(Schema::int())
            .before(|_, _| Err(StageError::value("never runs")))
            .plain(|v, _| Ok(v)),
    )
    .unwrap();

    assert_eq!(
        unwrap_success(schema.validate(&Value::from("not a number")).unwrap()),
        Value::from("not a number")
    );
}

#[test]
fn test_plain_stage_ranks_lax_in_smart_union() {
    let anything = Schema::wrapped(Schema::any()).plain(|_, _| Ok(Value::from("plain")));
    let schema = CompiledSchema::new(Schema::union([
        UnionMember::from(anything),
        UnionMember::from(Schema::str()),
    ]))
    .unwrap();

    assert_eq!(unwrap_success(schema.validate(&Value::from("x")).unwrap()), Value::from("x"));
    assert_eq!(unwrap_success(schema.validate(&Value::Int(1)).unwrap()), Value::from("plain"));
}

#[test]
fn test_custom_error_kind_and_context() {
    let schema = CompiledSchema::new(Schema::wrapped(Schema::int()).after(|v, _| {
        if v.as_i64().is_some_and(|n| n <= 10) {
            return Ok(v);
        }
        let mut context = ErrorContext::new();
        context.insert("limit".into(), Value::Int(10));
        Err(StageError::custom("too_big", "value must be at most {limit}", context))
    }))
    .unwrap();

    let errors = unwrap_failure(schema.validate(&Value::Int(11)).unwrap());
    let record = errors.first();
    assert_eq!(record.kind, "too_big");
    assert_eq!(record.message, "value must be at most 10");
    assert_eq!(
        serde_json::to_value(record).unwrap()["context"],
        json!({"limit": 10})
    );
}

#[test]
fn test_stages_read_call_context() {
    let schema = CompiledSchema::new(Schema::wrapped(Schema::int()).after(|v, info| {
        let max = info
            .context
            .and_then(|c| c.get("max"))
            .and_then(Value::as_i64)
            .unwrap_or(i64::MAX);
        match v.as_i64() {
            Some(n) if n > max => Err(StageError::assertion(format!("{} > {}", n, max))),
            _ => Ok(v),
        }
    }))
    .unwrap();

    let options = ValidateOptions::new().context(Value::from(json!({"max": 5})));
    let errors = unwrap_failure(schema.validate_with(&Value::Int(6), &options).unwrap());
    assert_eq!(errors.first().kind, "assertion_error");
    assert_eq!(errors.first().message, "Assertion failed, 6 > 5");

    assert!(schema.validate(&Value::Int(6)).unwrap().is_success());
}

#[test]
fn test_stages_see_field_name() {
    let named = Schema::wrapped(Schema::any())
        .after(|_, info| Ok(Value::from(info.field_name.unwrap_or("?"))));
    let schema = CompiledSchema::new(Schema::model("Labels").field("title", named)).unwrap();

    let value = unwrap_success(schema.validate(&Value::from(json!({"title": 1}))).unwrap());
    assert_eq!(value.get("title"), Some(&Value::from("title")));
}

#[test]
fn test_fault_escapes_validation() {
    let schema = CompiledSchema::new(
        Schema::model("Account").field(
            "id",
            Schema::wrapped(Schema::int())
                .before(|_, _| Err(StageError::fault(std::io::Error::other("lookup failed")))),
        ),
    )
    .unwrap();

    let result = schema.validate(&Value::from(json!({"id": 1})));
    assert!(matches!(result, Err(SchemaFault::Stage(_))));
}

#[test]
fn test_unreachable_stages_are_reported() {
    let chain = ValidatorChain::from_stages([
        ValidatorStage::before(|v, _| Ok(v)),
        ValidatorStage::after(|v, _| Ok(v)),
        ValidatorStage::plain(|v, _| Ok(v)),
        ValidatorStage::after(|v, _| Ok(v)),
    ]);
    assert!(chain.has_plain());
    assert_eq!(chain.unreachable(), vec![0, 1]);
}
