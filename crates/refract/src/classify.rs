//! Type classification and primitive canonicalization
//!
//! Predicates used by callers deciding how to treat a value (scalar, container
//! or structured), and the native-to-boxed mapping used when matching
//! arguments against parameter types.

use crate::error::{ReflectError, Result};
use crate::hierarchy::is_subtype;
use crate::log::LogSink;
use crate::registry::TypeRegistry;
use crate::types::{PrimitiveKind, TypeId, TypeKind};
use crate::value::Value;

/// Raised (and only logged) when a name cannot be resolved
#[derive(Debug, thiserror::Error)]
#[error("no type named '{0}' is registered")]
pub struct UnknownType(pub String);

fn kind_of(registry: &TypeRegistry, ty: TypeId) -> Option<TypeKind> {
    registry.get(ty).map(|t| t.kind())
}

/// Native or boxed primitive, or string
pub fn is_primitive_like(registry: &TypeRegistry, ty: TypeId) -> bool {
    matches!(
        kind_of(registry, ty),
        Some(TypeKind::Primitive(_) | TypeKind::Boxed(_) | TypeKind::String)
    )
}

/// Arrays, and lists, sets and maps including user types extending them
pub fn is_collection_like(registry: &TypeRegistry, ty: TypeId) -> bool {
    let mut current = registry.get(ty);
    while let Some(desc) = current {
        match desc.kind() {
            TypeKind::Array { .. } | TypeKind::Collection(_) => return true,
            _ => current = desc.parent().and_then(|p| registry.get(p)),
        }
    }
    false
}

/// Enumerations
pub fn is_enum(registry: &TypeRegistry, ty: TypeId) -> bool {
    kind_of(registry, ty) == Some(TypeKind::Enum)
}

/// A structured type needing member-level handling: none of primitive-like,
/// enum, string or collection-like. Unregistered ids are not complex.
pub fn is_complex_type(registry: &TypeRegistry, ty: TypeId) -> bool {
    registry.get(ty).is_some()
        && !is_primitive_like(registry, ty)
        && !is_enum(registry, ty)
        && !is_collection_like(registry, ty)
}

/// Whether `ty` is not a native primitive
pub fn is_non_primitive(registry: &TypeRegistry, ty: TypeId) -> bool {
    !matches!(kind_of(registry, ty), Some(TypeKind::Primitive(_)))
}

/// byte, short, int or long, native or boxed
pub fn is_decimal_type(ty: TypeId) -> bool {
    use PrimitiveKind::*;
    [Byte, Short, Int, Long]
        .into_iter()
        .any(|k| ty == TypeId::native(k) || ty == TypeId::boxed(k))
}

/// Whether `name` spells a native primitive, ignoring ASCII case
pub fn is_primitive_name(name: &str) -> bool {
    PrimitiveKind::from_native_name(name).is_some()
}

/// Map a native primitive to its boxed form; everything else is unchanged
pub fn canonicalize(ty: TypeId) -> TypeId {
    PrimitiveKind::ALL
        .into_iter()
        .find(|k| TypeId::native(*k) == ty)
        .map_or(ty, TypeId::boxed)
}

/// Resolve a type name to its canonical id.
///
/// Native primitive names (any case) map to the boxed type. Other names go
/// through the registry; a miss is logged at error level and reported as
/// `None`, never raised.
pub fn canonicalize_name(registry: &TypeRegistry, sink: &dyn LogSink, name: &str) -> Option<TypeId> {
    if let Some(kind) = PrimitiveKind::from_native_name(name) {
        return Some(TypeId::boxed(kind));
    }
    match registry.resolve_name(name) {
        Some(id) => Some(canonicalize(id)),
        None => {
            let cause = UnknownType(name.to_string());
            sink.error(&format!("Cannot resolve type '{name}'"), Some(&cause));
            None
        }
    }
}

/// Strict name lookup: a miss is a precondition failure
pub fn for_name(registry: &TypeRegistry, name: &str) -> Result<TypeId> {
    if name.is_empty() {
        return Err(ReflectError::precondition("type name must not be empty"));
    }
    registry
        .resolve_name(name)
        .ok_or_else(|| ReflectError::precondition(UnknownType(name.to_string()).to_string()))
}

/// Whether `value` may be passed for a parameter of type `param`.
///
/// Types are compared after canonicalization. Null fits any non-native
/// parameter; instances of a subtype fit the ancestor. There is no widening
/// between primitive kinds.
pub fn accepts_value(registry: &TypeRegistry, param: TypeId, value: &Value) -> bool {
    if value.is_null() {
        return registry.get(param).is_some() && is_non_primitive(registry, param);
    }
    let Some(actual) = registry.type_of(value) else {
        return false;
    };
    let expected = canonicalize(param);
    actual == expected || is_subtype(registry, actual, expected)
}

/// Whether every argument fits the parameter list, arity included
pub fn accepts_all(registry: &TypeRegistry, params: &[TypeId], args: &[Value]) -> bool {
    params.len() == args.len()
        && params
            .iter()
            .zip(args)
            .all(|(param, arg)| accepts_value(registry, *param, arg))
}
