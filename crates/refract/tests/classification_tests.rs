//! Type classification and precondition integration tests

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use refract::assert;
use refract::classify::{self, canonicalize};
use refract::{
    FieldDef, Introspector, LogLevel, RecordingSink, TypeBuilder, TypeId, TypeRegistry, Value,
};

fn introspector_with_sink() -> (Introspector, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::new());
    let introspector = Introspector::new(Arc::new(TypeRegistry::new())).with_sink(sink.clone());
    (introspector, sink)
}

// ===== Canonicalization Tests =====

#[test]
fn test_native_names_canonicalize_to_boxed() {
    let (introspector, sink) = introspector_with_sink();

    assert_eq!(introspector.canonicalize_name("int"), Some(TypeId::BOXED_INT));
    assert_eq!(introspector.canonicalize_name("INT"), Some(TypeId::BOXED_INT));
    assert_eq!(canonicalize(TypeId::INT), TypeId::BOXED_INT);
    assert_eq!(introspector.canonicalize_name("Integer"), Some(TypeId::BOXED_INT));
    assert_eq!(introspector.canonicalize_name("boolean"), Some(TypeId::BOXED_BOOL));
    assert_eq!(introspector.canonicalize_name("String"), Some(TypeId::STRING));
    assert!(sink.records().is_empty());
}

#[test]
fn test_unknown_name_logs_and_returns_none() {
    let (introspector, sink) = introspector_with_sink();

    assert_eq!(introspector.canonicalize_name("bogus"), None);
    let errors = sink.at(LogLevel::Error);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].message.contains("bogus"));
    assert!(errors[0].cause.as_deref().is_some_and(|c| c.contains("bogus")));

    let err = classify::for_name(introspector.registry(), "bogus").unwrap_err();
    assert!(err.is_precondition());
}

#[test]
fn test_array_names_resolve() {
    let (introspector, _) = introspector_with_sink();
    let ints = introspector.canonicalize_name("int[]").unwrap();
    let nested = introspector.canonicalize_name("int[][]").unwrap();
    assert_ne!(ints, nested);
    assert_eq!(introspector.registry().name_of(nested), "int[][]");
    assert_eq!(
        introspector.type_of(&Value::array(TypeId::INT, vec![Value::Int(1)])),
        Some(ints)
    );
}

// ===== Classification Tests =====

#[test]
fn test_is_complex_type() {
    let (introspector, _) = introspector_with_sink();
    let registry = introspector.registry();
    let color = registry
        .register(TypeBuilder::enumeration("Color", ["Red", "Blue"]))
        .unwrap();
    let person = registry
        .register(TypeBuilder::class("Person").field(FieldDef::new("name", TypeId::STRING)))
        .unwrap();
    let roster = registry
        .register(TypeBuilder::class("Roster").extends(TypeId::LIST))
        .unwrap();
    let people = registry.array_of(person).unwrap();

    for simple in [
        TypeId::INT,
        TypeId::BOXED_DOUBLE,
        TypeId::CHAR,
        TypeId::STRING,
        color,
        TypeId::MAP,
        TypeId::SET,
        people,
        roster,
    ] {
        assert!(!introspector.is_complex_type(simple), "{}", registry.name_of(simple));
    }
    assert!(introspector.is_complex_type(person));

    assert!(introspector.is_primitive_like(TypeId::STRING));
    assert!(!introspector.is_primitive_like(color));
    assert!(introspector.is_collection_like(roster));
    assert!(introspector.is_collection_like(people));
    assert!(!introspector.is_collection_like(person));
}

#[test]
fn test_decimal_and_primitive_names() {
    for ty in [TypeId::BYTE, TypeId::BOXED_SHORT, TypeId::INT, TypeId::BOXED_LONG] {
        assert!(classify::is_decimal_type(ty));
    }
    for ty in [TypeId::FLOAT, TypeId::BOXED_DOUBLE, TypeId::CHAR, TypeId::STRING] {
        assert!(!classify::is_decimal_type(ty));
    }
    assert!(classify::is_primitive_name("Double"));
    assert!(!classify::is_primitive_name("Integer"));
}

// ===== Precondition Tests =====

#[test]
fn test_default_assertion_messages() {
    let err = assert::not_empty(&[] as &[i32]).unwrap_err();
    assert_eq!(
        err.to_string(),
        "[Assertion failed] - this array must not be empty: it must contain at least 1 element"
    );

    let err = assert::not_empty(&Vec::<String>::new()).unwrap_err();
    assert!(err.to_string().contains("this collection must not be empty"));

    let err = assert::not_empty(&BTreeMap::<i32, i32>::new()).unwrap_err();
    assert!(err.to_string().contains("this map must not be empty"));

    let err = assert::is_true(false).unwrap_err();
    assert_eq!(err.to_string(), "[Assertion failed] - this expression must be true");
    assert!(err.is_precondition());
}

#[test]
fn test_assertions_pass_and_custom_messages() {
    assert!(assert::not_empty(&[1, 2, 3]).is_ok());
    assert!(assert::not_empty(&HashSet::from([1])).is_ok());
    assert_eq!(assert::not_null(Some(5)).unwrap(), 5);
    assert!(assert::is_null(Value::Null).is_ok());
    assert!(assert::no_null_elements(&[Value::Int(1), Value::from("a")]).is_ok());

    let err = assert::no_null_elements_msg(&[Some(1), None], "slot 1 is empty").unwrap_err();
    assert_eq!(err.to_string(), "slot 1 is empty");
    let err = assert::not_null_msg(None::<i32>, "owner is required").unwrap_err();
    assert_eq!(err.to_string(), "owner is required");
}
