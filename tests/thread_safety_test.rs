//! Integration tests for sharing compiled schemas across threads.

use std::thread;

use schemata::{CompiledSchema, DumpOptions, Schema, SchemaRegistry, ValidateOptions, Value};
use serde_json::json;

fn reading() -> schemata::ModelSchema {
    Schema::model("Reading")
        .field("sensor", Schema::str().min_length(1))
        .field("celsius", Schema::float().ge(-273.15))
}

#[test]
fn test_clones_validate_concurrently() {
    let schema = CompiledSchema::new(reading()).unwrap();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let schema = schema.clone();
            thread::spawn(move || {
                let input = Value::from(json!({"sensor": format!("s{}", i), "celsius": i}));
                let value = schema.validate(&input).unwrap().into_result().unwrap();
                schema.dump_json(&value, &DumpOptions::new()).unwrap()
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        let dumped = handle.join().unwrap();
        assert_eq!(dumped["sensor"], json!(format!("s{}", i)));
        assert_eq!(dumped["celsius"], json!(i as f64));
    }
}

#[test]
fn test_registry_shared_between_threads() {
    let registry = SchemaRegistry::new();
    let writers: Vec<_> = ["A", "B", "C"]
        .into_iter()
        .map(|name| {
            let registry = registry.clone();
            thread::spawn(move || registry.register(name, Schema::int()).unwrap())
        })
        .collect();
    for writer in writers {
        writer.join().unwrap();
    }

    assert!(["A", "B", "C"].iter().all(|name| registry.contains(name)));
    assert!(registry.register("B", Schema::str()).is_err());
}

#[test]
fn test_batch_keeps_input_order() {
    let schema = CompiledSchema::new(reading()).unwrap();
    let inputs: Vec<Value> = (0..64)
        .map(|i| {
            if i % 5 == 0 {
                Value::from(json!({"sensor": "", "celsius": i}))
            } else {
                Value::from(json!({"sensor": "probe", "celsius": i}))
            }
        })
        .collect();

    let results = schema.validate_batch(&inputs, &ValidateOptions::new());
    assert_eq!(results.len(), inputs.len());
    for (i, result) in results.into_iter().enumerate() {
        let outcome = result.unwrap();
        if i % 5 == 0 {
            assert!(outcome.is_failure());
        } else {
            let value = outcome.into_result().unwrap();
            assert_eq!(value.get("celsius"), Some(&Value::Float(i as f64)));
        }
    }
}

#[test]
fn test_batch_applies_options() {
    let schema = CompiledSchema::new(Schema::int()).unwrap();
    let inputs = vec![Value::Int(1), Value::from("2")];

    let strict = schema.validate_batch(&inputs, &ValidateOptions::new().strict(true));
    assert!(strict[0].as_ref().unwrap().is_success());
    assert!(strict[1].as_ref().unwrap().is_failure());
}
