//! Member cache and configuration integration tests
//!
//! Covers invalidation through registry hooks, capacity pressure, the
//! introspector lifecycle and loading settings from a TOML file.

use std::io::Write;
use std::sync::Arc;

use refract::{
    ConfigError, FieldDef, Introspector, InvocationFailure, Member, MethodDef, ReflectConfig,
    ReflectionPermission, TypeBuilder, TypeId, TypeRegistry, Value,
};
use tempfile::NamedTempFile;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("refract=debug")
        .with_test_writer()
        .try_init();
}

fn greeter(greeting: &'static str) -> TypeBuilder {
    TypeBuilder::class("app.Greeter").method(
        MethodDef::new("greet", move |_, _| Ok(Value::from(greeting))).returns(TypeId::STRING),
    )
}

// ===== Invalidation Tests =====

#[test]
fn test_unregister_evicts_entry() {
    let registry = Arc::new(TypeRegistry::new());
    let id = registry.register(greeter("hi")).unwrap();
    let introspector = Introspector::new(registry.clone());

    introspector.list_methods(id, &[]).unwrap();
    assert!(introspector.cache().contains(id));

    registry.unregister(id).unwrap();
    assert!(!introspector.cache().contains(id));
    assert!(introspector.list_methods(id, &[]).unwrap_err().is_precondition());
}

#[test]
fn test_redefine_observed_by_next_lookup() {
    init_tracing();
    let registry = Arc::new(TypeRegistry::new());
    let id = registry.register(greeter("hi")).unwrap();
    let introspector = Introspector::new(registry.clone());

    let instance = introspector.construct(id, &[]).unwrap();
    let old = introspector.find_method(id, "greet", None).unwrap().unwrap();
    assert_eq!(introspector.invoke(&old, &instance, &[]).unwrap(), Value::from("hi"));

    registry
        .redefine(
            id,
            greeter("hello").method(MethodDef::new("wave", |_, _| Ok(Value::Null))),
        )
        .unwrap();

    let methods = introspector.list_methods(id, &[]).unwrap();
    let names: Vec<_> = methods.iter().map(|m| m.name().to_string()).collect();
    assert_eq!(names, vec!["greet", "wave"]);

    let fresh = introspector.find_method(id, "greet", None).unwrap().unwrap();
    let instance = introspector.construct(id, &[]).unwrap();
    assert_eq!(introspector.invoke(&fresh, &instance, &[]).unwrap(), Value::from("hello"));
}

#[test]
fn test_capacity_evicts_least_recent() {
    let registry = Arc::new(TypeRegistry::new());
    let ids: Vec<_> = (0..3)
        .map(|i| registry.register(TypeBuilder::class(format!("T{i}"))).unwrap())
        .collect();
    let config = ReflectConfig::from_toml_str("[cache]\ncapacity = 2").unwrap();
    let introspector = Introspector::with_config(registry, &config).unwrap();

    introspector.list_methods(ids[0], &[]).unwrap();
    introspector.list_methods(ids[1], &[]).unwrap();
    introspector.list_methods(ids[0], &[]).unwrap();
    introspector.list_methods(ids[2], &[]).unwrap();

    let cache = introspector.cache();
    assert_eq!(cache.len(), 2);
    assert!(cache.contains(ids[0]));
    assert!(!cache.contains(ids[1]));
    assert!(cache.contains(ids[2]));
    assert_eq!(cache.stats().evictions, 1);
}

#[test]
fn test_shutdown_detaches_hook() {
    let registry = Arc::new(TypeRegistry::new());
    let id = registry.register(greeter("hi")).unwrap();
    let mut introspector = Introspector::new(registry.clone());

    introspector.list_methods(id, &[]).unwrap();
    introspector.shutdown();
    assert!(introspector.cache().is_empty());

    // Cache keeps working after shutdown; stale entries are caught on read
    introspector.list_methods(id, &[]).unwrap();
    registry.redefine(id, greeter("hey")).unwrap();
    assert!(introspector.cache().contains(id));
    let greet = introspector.find_method(id, "greet", None).unwrap().unwrap();
    let instance = introspector.construct(id, &[]).unwrap();
    assert_eq!(introspector.invoke(&greet, &instance, &[]).unwrap(), Value::from("hey"));
}

#[test]
fn test_redefined_layout_rejects_stale_field_access() {
    let registry = Arc::new(TypeRegistry::new());
    let id = registry
        .register(
            TypeBuilder::class("app.Acct")
                .field(FieldDef::new("count", TypeId::INT))
                .field(FieldDef::new("label", TypeId::STRING)),
        )
        .unwrap();
    let introspector = Introspector::new(registry.clone());

    let old_obj = introspector.construct(id, &[]).unwrap();
    let old_label = introspector.find_field(id, "label").unwrap().unwrap();
    introspector
        .set_field(&old_label, &old_obj, Value::from("hello"))
        .unwrap();

    registry
        .redefine(
            id,
            TypeBuilder::class("app.Acct")
                .field(FieldDef::new("label", TypeId::STRING))
                .field(FieldDef::new("count", TypeId::INT)),
        )
        .unwrap();
    let count = introspector.find_field(id, "count").unwrap().unwrap();

    let err = introspector.get_field(&count, &old_obj).unwrap_err();
    assert_eq!(err.invocation_kind(), Some(InvocationFailure::ReceiverMismatch));
    let err = introspector
        .set_field(&count, &old_obj, Value::Int(7))
        .unwrap_err();
    assert_eq!(err.invocation_kind(), Some(InvocationFailure::ReceiverMismatch));
    assert_eq!(old_obj.as_object().unwrap().field("label"), Some(Value::from("hello")));

    // Old descriptors against new instances are refused too
    let new_obj = introspector.construct(id, &[]).unwrap();
    let err = introspector.get_field(&old_label, &new_obj).unwrap_err();
    assert_eq!(err.invocation_kind(), Some(InvocationFailure::ReceiverMismatch));

    introspector.set_field(&count, &new_obj, Value::Int(7)).unwrap();
    assert_eq!(introspector.get_field(&count, &new_obj).unwrap(), Value::Int(7));
    assert_eq!(introspector.active_grants(), 0);
}

// ===== Configuration Tests =====

#[test]
fn test_load_from_file() {
    init_tracing();
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[cache]
capacity = 8

[permissions]
global = "ALL"

[permissions.types]
"vault.*" = "PUBLIC_ONLY"
"#
    )
    .unwrap();

    let config = ReflectConfig::load(file.path()).unwrap();
    assert_eq!(config.cache.capacity, 8);

    let registry = Arc::new(TypeRegistry::new());
    let vault = registry
        .register(
            TypeBuilder::class("vault.Safe")
                .method(MethodDef::new("open", |_, _| Ok(Value::Null)).as_private()),
        )
        .unwrap();
    let introspector = Introspector::with_config(registry, &config).unwrap();
    assert_eq!(introspector.cache().capacity(), 8);
    assert_eq!(
        introspector.access().permissions().resolve("vault.Safe"),
        ReflectionPermission::PUBLIC_ONLY
    );

    let safe = introspector.construct(vault, &[]).unwrap();
    let open = introspector.find_method(vault, "open", None).unwrap().unwrap();
    let err = introspector.invoke(&open, &safe, &[]).unwrap_err();
    assert_eq!(err.invocation_kind(), Some(InvocationFailure::Inaccessible));
}

#[test]
fn test_bad_config_files() {
    let missing = ReflectConfig::load("/nonexistent/refract.toml").unwrap_err();
    assert!(matches!(missing, ConfigError::Io { .. }));

    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "[cache]\ncapacity = 0").unwrap();
    assert!(matches!(
        ReflectConfig::load(file.path()).unwrap_err(),
        ConfigError::InvalidCapacity
    ));

    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "[permissions]\nglobal = \"EVERYTHING\"").unwrap();
    assert!(matches!(
        ReflectConfig::load(file.path()).unwrap_err(),
        ConfigError::InvalidPermission { .. }
    ));

    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "[cache]\nsize = 3").unwrap();
    assert!(matches!(
        ReflectConfig::load(file.path()).unwrap_err(),
        ConfigError::Parse(_)
    ));
}
