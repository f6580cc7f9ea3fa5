//! Refract: registry-backed type introspection and member invocation
//!
//! Types are described once through a [`TypeBuilder`] and registered with a
//! [`TypeRegistry`]. An [`Introspector`] then answers questions about them
//! and acts on their instances:
//!
//! - **Hierarchy**: list and find fields, methods and constructors across a
//!   type's ancestors ([`HierarchyWalker`])
//! - **Access**: every member access runs under a scoped [`AccessGrant`]
//!   issued by the [`AccessNormalizer`]
//! - **Invocation**: construct instances, call methods, read and write fields
//! - **Classification**: primitive-like, collection-like and complex types,
//!   native-to-boxed canonicalization ([`classify`])
//! - **Caching**: per-type method lists in a bounded [`MemberCache`]
//! - **Preconditions**: argument guards raising [`ReflectError::Precondition`]
//!   ([`assert`])
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use refract::{FieldDef, Introspector, MethodDef, TypeBuilder, TypeId, TypeRegistry, Value};
//!
//! let registry = Arc::new(TypeRegistry::new());
//! let point = registry.register(
//!     TypeBuilder::class("acme.Point")
//!         .field(FieldDef::new("x", TypeId::INT))
//!         .method(MethodDef::new("norm", |this, _| { /* ... */ Ok(Value::Int(0)) }).returns(TypeId::INT)),
//! )?;
//!
//! let introspector = Introspector::new(registry);
//! let p = introspector.construct(point, &[])?;
//! let norm = introspector.find_method(point, "norm", None)?.unwrap();
//! introspector.invoke(&norm, &p, &[])?;
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod access;
pub mod assert;
pub mod builder;
pub mod cache;
pub mod classify;
pub mod config;
pub mod error;
pub mod hierarchy;
pub mod introspector;
mod invoke;
pub mod log;
pub mod member;
pub mod reflect;
pub mod registry;
pub mod types;
pub mod value;

pub use access::{
    AccessDenied, AccessGrant, AccessNormalizer, AccessOperation, PermissionStore,
    ReflectionPermission, TypePermissionRule,
};
pub use builder::{ConstructorDef, FieldDef, MethodDef, TypeBuilder};
pub use cache::{CacheStats, MemberCache, MethodList};
pub use config::{CacheConfig, ConfigError, PermissionsConfig, ReflectConfig};
pub use error::{ConstructionFailure, InvocationFailure, ReflectError, Result};
pub use hierarchy::{ancestry, is_subtype, HierarchyWalker};
pub use introspector::Introspector;
pub use log::{LogLevel, LogRecord, LogSink, RecordingSink, TracingSink};
pub use member::{
    ConstructorBody, ConstructorDescriptor, FieldDescriptor, Member, MemberKey, MemberKind,
    MethodBody, MethodDescriptor,
};
pub use reflect::Reflect;
pub use registry::{HookId, InvalidationHook, TypeRegistry};
pub use types::{CollectionKind, PrimitiveKind, TypeDescriptor, TypeId, TypeKind, Visibility};
pub use value::{Object, ObjectRef, Value};
