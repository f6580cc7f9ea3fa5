//! Construction and invocation integration tests
//!
//! Exercises failure classification end to end: non-instantiable types,
//! argument mismatches, body failures passed through untouched, panics and
//! grant release.

use std::sync::Arc;

use refract::{
    ConstructionFailure, ConstructorDef, FieldDef, Introspector, InvocationFailure, Member,
    MethodDef, ReflectError, ReflectionPermission, TypeBuilder, TypeId, TypeRegistry, Value,
};

#[derive(Debug, thiserror::Error, PartialEq)]
#[error("insufficient funds: {available} < {requested}")]
struct InsufficientFunds {
    available: i64,
    requested: i64,
}

fn bank() -> (Introspector, TypeId) {
    let introspector = Introspector::new(Arc::new(TypeRegistry::new()));
    let account = introspector
        .register(
            TypeBuilder::class("bank.Account")
                .field(FieldDef::new("balance", TypeId::LONG).as_private())
                .constructor(
                    ConstructorDef::new(|obj, args| {
                        let opening = args[0].as_i64().unwrap_or(0);
                        if opening < 0 {
                            anyhow::bail!("negative opening balance");
                        }
                        obj.set_field("balance", Value::Long(opening));
                        Ok(())
                    })
                    .with_param(TypeId::LONG),
                )
                .method(
                    MethodDef::new("withdraw", |this, args| {
                        let obj = this.as_object().ok_or_else(|| anyhow::anyhow!("no receiver"))?;
                        let available = obj.field("balance").and_then(|v| v.as_i64()).unwrap_or(0);
                        let requested = args[0].as_i64().unwrap_or(0);
                        if requested > available {
                            return Err(InsufficientFunds { available, requested }.into());
                        }
                        obj.set_field("balance", Value::Long(available - requested));
                        Ok(Value::Long(available - requested))
                    })
                    .with_param(TypeId::LONG)
                    .returns(TypeId::LONG),
                )
                .method(
                    MethodDef::new("audit", |_, _| panic!("ledger corrupted"))
                        .returns(TypeId::BOOL),
                )
                .method(
                    MethodDef::new("reconcile", |_, _| Ok(Value::Bool(true)))
                        .as_private()
                        .returns(TypeId::BOOL),
                )
                .method(
                    MethodDef::new("memo", |_, args| {
                        Ok(Value::Bool(args.iter().all(Value::is_null)))
                    })
                    .with_param(TypeId::STRING)
                    .with_param(TypeId::BOXED_INT)
                    .returns(TypeId::BOOL),
                ),
        )
        .unwrap();
    (introspector, account)
}

// ===== Construction Tests =====

#[test]
fn test_abstract_type_never_instantiates() {
    let introspector = Introspector::new(Arc::new(TypeRegistry::new()));
    let shape = introspector
        .register(
            TypeBuilder::class("geo.Shape")
                .as_abstract()
                .constructor(ConstructorDef::new(|_, _| Ok(())))
                .method(MethodDef::abstract_method("area").returns(TypeId::DOUBLE)),
        )
        .unwrap();

    for args in [vec![], vec![Value::Int(1)], vec![Value::Null]] {
        let err = introspector.construct(shape, &args).unwrap_err();
        assert_eq!(err.construction_kind(), Some(ConstructionFailure::NotInstantiable));
    }
    let ctor = introspector.list_constructors(shape).unwrap().remove(0);
    let err = introspector.instantiate(&ctor, &[]).unwrap_err();
    assert_eq!(err.construction_kind(), Some(ConstructionFailure::NotInstantiable));
}

#[test]
fn test_interface_like_enum_not_instantiable() {
    let introspector = Introspector::new(Arc::new(TypeRegistry::new()));
    let color = introspector
        .register(TypeBuilder::enumeration("Color", ["Red", "Green"]))
        .unwrap();
    let err = introspector.construct(color, &[]).unwrap_err();
    assert_eq!(err.construction_kind(), Some(ConstructionFailure::NotInstantiable));
    assert!(err.to_string().starts_with("Failed to instantiate [Color]"));
}

#[test]
fn test_constructor_failure_keeps_cause() {
    let (introspector, account) = bank();
    let err = introspector.construct(account, &[Value::Long(-5)]).unwrap_err();
    assert_eq!(err.construction_kind(), Some(ConstructionFailure::ConstructorFailed));
    let source = std::error::Error::source(&err).expect("cause attached");
    assert_eq!(source.to_string(), "negative opening balance");

    let err = introspector.construct(account, &[Value::from("ten")]).unwrap_err();
    assert_eq!(err.construction_kind(), Some(ConstructionFailure::IllegalArguments));
}

// ===== Invocation Tests =====

#[test]
fn test_thrown_error_keeps_identity() {
    let (introspector, account) = bank();
    let acct = introspector.construct(account, &[Value::Long(10)]).unwrap();
    let withdraw = introspector
        .find_method(account, "withdraw", Some(&[TypeId::LONG]))
        .unwrap()
        .unwrap();

    assert_eq!(
        introspector.invoke(&withdraw, &acct, &[Value::Long(4)]).unwrap(),
        Value::Long(6)
    );

    let err = introspector.invoke(&withdraw, &acct, &[Value::Long(100)]).unwrap_err();
    let thrown = err.thrown().expect("body failure passes through");
    let funds = thrown.downcast_ref::<InsufficientFunds>().unwrap();
    assert_eq!(
        funds,
        &InsufficientFunds {
            available: 6,
            requested: 100
        }
    );
    assert_eq!(err.to_string(), "insufficient funds: 6 < 100");
}

#[test]
fn test_nested_reflect_error_is_not_rewrapped() {
    let (introspector, account) = bank();
    let introspector = Arc::new(introspector);
    let inner = introspector.clone();
    let teller = introspector
        .register(
            TypeBuilder::class("bank.Teller").method(
                MethodDef::new("serve", move |_, _| {
                    let missing = inner.construct(account, &[])?;
                    Ok(missing)
                })
                .returns(TypeId::STRING),
            ),
        )
        .unwrap();

    let clerk = introspector.construct(teller, &[]).unwrap();
    let serve = introspector.find_method(teller, "serve", None).unwrap().unwrap();
    let err = introspector.invoke(&serve, &clerk, &[]).unwrap_err();
    assert!(err.thrown().is_none());
    assert_eq!(err.construction_kind(), Some(ConstructionFailure::IllegalArguments));
}

#[test]
fn test_panic_is_unrecoverable_and_grants_release() {
    let (introspector, account) = bank();
    let acct = introspector.construct(account, &[Value::Long(1)]).unwrap();
    let audit = introspector.find_method(account, "audit", None).unwrap().unwrap();

    let err = introspector.invoke(&audit, &acct, &[]).unwrap_err();
    assert!(matches!(err, ReflectError::Unrecoverable(ref m) if m.contains("ledger corrupted")));
    assert_eq!(introspector.active_grants(), 0);
}

#[test]
fn test_private_method_on_declaring_type() {
    let (introspector, account) = bank();
    let acct = introspector.construct(account, &[Value::Long(1)]).unwrap();
    let reconcile = introspector.find_method(account, "reconcile", Some(&[])).unwrap().unwrap();
    assert!(!reconcile.visibility().is_public());
    assert_eq!(introspector.invoke(&reconcile, &acct, &[]).unwrap(), Value::Bool(true));
}

#[test]
fn test_null_arguments() {
    let (introspector, account) = bank();
    let acct = introspector.construct(account, &[Value::Long(1)]).unwrap();
    let memo = introspector.find_method(account, "memo", None).unwrap().unwrap();

    assert_eq!(
        introspector.invoke(&memo, &acct, &[Value::Null, Value::Null]).unwrap(),
        Value::Bool(true)
    );
    assert_eq!(
        introspector.invoke(&memo, &acct, &[Value::from("x"), Value::Int(2)]).unwrap(),
        Value::Bool(false)
    );

    // Native parameters never accept null
    let withdraw = introspector.find_method(account, "withdraw", None).unwrap().unwrap();
    let err = introspector.invoke(&withdraw, &acct, &[Value::Null]).unwrap_err();
    assert_eq!(err.invocation_kind(), Some(InvocationFailure::IllegalArguments));
}

#[test]
fn test_receiver_mismatch() {
    let (introspector, account) = bank();
    let withdraw = introspector.find_method(account, "withdraw", None).unwrap().unwrap();
    let err = introspector
        .invoke(&withdraw, &Value::from("not an account"), &[Value::Long(1)])
        .unwrap_err();
    assert_eq!(err.invocation_kind(), Some(InvocationFailure::ReceiverMismatch));
    let err = introspector.invoke(&withdraw, &Value::Null, &[Value::Long(1)]).unwrap_err();
    assert_eq!(err.invocation_kind(), Some(InvocationFailure::ReceiverMismatch));
}

#[test]
fn test_permission_ceiling_blocks_private_invoke() {
    let (introspector, account) = bank();
    let acct = introspector.construct(account, &[Value::Long(1)]).unwrap();
    introspector
        .access()
        .update_permissions(|store| store.set_global(ReflectionPermission::PUBLIC_ONLY));

    let reconcile = introspector.find_method(account, "reconcile", None).unwrap().unwrap();
    let err = introspector.invoke(&reconcile, &acct, &[]).unwrap_err();
    assert_eq!(err.invocation_kind(), Some(InvocationFailure::Inaccessible));

    let balance = introspector.find_field(account, "balance").unwrap().unwrap();
    let err = introspector.get_field(&balance, &acct).unwrap_err();
    assert_eq!(err.invocation_kind(), Some(InvocationFailure::Inaccessible));
    assert_eq!(introspector.active_grants(), 0);
}

// ===== Fluent Tests =====

#[test]
fn test_fluent_chain() {
    let (introspector, _) = bank();
    let acct = introspector
        .on_name("bank.Account")
        .unwrap()
        .create(&[Value::Long(50)])
        .unwrap();
    let left = acct.call("withdraw", &[Value::Long(20)]).unwrap();
    assert_eq!(left.value(), &Value::Long(30));
    assert_eq!(acct.get("balance").unwrap(), Value::Long(30));

    let err = acct.call("withdraw", &[Value::Long(31)]).unwrap_err();
    assert!(err.thrown().is_some());
}
