//! Fluent wrapper over an [`Introspector`]
//!
//! ```ignore
//! let point = introspector.on_name("acme.Point")?.create(&[1.into(), 2.into()])?;
//! let moved = point.call("translate", &[3.into(), 4.into()])?;
//! assert_eq!(moved.get("x")?, Value::Int(4));
//! ```
//!
//! A [`Reflect`] wraps either a type (static members only) or a value.
//! Methods declared void return the wrapper they were called on, so calls
//! chain.

use std::fmt;
use std::sync::Arc;

use crate::classify::{accepts_all, canonicalize, for_name};
use crate::error::{InvocationFailure, ReflectError, Result};
use crate::hierarchy::ancestry;
use crate::introspector::Introspector;
use crate::member::{FieldDescriptor, Member, MethodDescriptor};
use crate::types::TypeId;
use crate::value::Value;

/// Fluent handle on a type or a value
#[derive(Clone)]
pub struct Reflect<'a> {
    introspector: &'a Introspector,
    value: Value,
    ty: Option<TypeId>,
    is_type: bool,
}

impl Introspector {
    /// Wrap a value
    pub fn on(&self, value: impl Into<Value>) -> Reflect<'_> {
        let value = value.into();
        Reflect {
            introspector: self,
            ty: self.type_of(&value),
            value,
            is_type: false,
        }
    }

    /// Wrap a registered type
    pub fn on_type(&self, ty: TypeId) -> Result<Reflect<'_>> {
        self.registry.require(ty)?;
        Ok(Reflect {
            introspector: self,
            value: Value::Null,
            ty: Some(ty),
            is_type: true,
        })
    }

    /// Wrap a type looked up by name
    pub fn on_name(&self, name: &str) -> Result<Reflect<'_>> {
        self.on_type(for_name(&self.registry, name)?)
    }
}

impl<'a> Reflect<'a> {
    /// The wrapped value; null when wrapping a type
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Consume the wrapper
    pub fn into_value(self) -> Value {
        self.value
    }

    /// Whether this wraps a type rather than a value
    pub fn is_type(&self) -> bool {
        self.is_type
    }

    /// Wrapped type, or the runtime type of the wrapped value
    pub fn type_id(&self) -> Result<TypeId> {
        self.ty
            .ok_or_else(|| ReflectError::precondition("a null value has no type"))
    }

    /// Construct an instance of the wrapped type
    pub fn create(&self, args: &[Value]) -> Result<Reflect<'a>> {
        let value = self.introspector.construct(self.type_id()?, args)?;
        Ok(self.introspector.on(value))
    }

    /// Call a method by name.
    ///
    /// Candidates are searched from the runtime type upward: first a method
    /// whose parameters match the argument types exactly, then any whose
    /// parameters accept them. The first hit in walk order wins.
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Reflect<'a>> {
        let method = self.resolve_method(name, args)?;
        let result = self.introspector.invoke(&method, &self.value, args)?;
        if method.return_type().is_none() {
            Ok(self.clone())
        } else {
            Ok(self.introspector.on(result))
        }
    }

    /// Read a field (static when wrapping a type)
    pub fn get(&self, name: &str) -> Result<Value> {
        let field = self.resolve_field(name)?;
        self.introspector.get_field(&field, &self.value)
    }

    /// Write a field and return the same wrapper
    pub fn set(&self, name: &str, value: impl Into<Value>) -> Result<Reflect<'a>> {
        let field = self.resolve_field(name)?;
        self.introspector.set_field(&field, &self.value, value.into())?;
        Ok(self.clone())
    }

    /// Wrap the value of a field
    pub fn field(&self, name: &str) -> Result<Reflect<'a>> {
        Ok(self.introspector.on(self.get(name)?))
    }

    /// Every field visible on the wrapped target, most-derived declaration
    /// per name, in declaration order. Instance fields for a value, static
    /// fields for a type.
    pub fn fields(&self) -> Result<Vec<(String, Reflect<'a>)>> {
        let all = self.introspector.list_fields(self.type_id()?, &[])?;
        let mut chosen: Vec<&Arc<FieldDescriptor>> = Vec::new();
        for field in all.iter().rev() {
            if field.is_static() == self.is_type && !chosen.iter().any(|f| f.name() == field.name()) {
                chosen.push(field);
            }
        }
        chosen.reverse();
        chosen
            .into_iter()
            .map(|field| {
                let value = self.introspector.get_field(field, &self.value)?;
                Ok((field.name().to_string(), self.introspector.on(value)))
            })
            .collect()
    }

    fn resolve_field(&self, name: &str) -> Result<Arc<FieldDescriptor>> {
        let ty = self.type_id()?;
        self.introspector.find_field(ty, name)?.ok_or_else(|| {
            ReflectError::invocation(
                format!("{}.{name}", self.introspector.registry.name_of(ty)),
                InvocationFailure::NoSuchMember,
                "no such field in the type or its ancestors",
            )
        })
    }

    fn resolve_method(&self, name: &str, args: &[Value]) -> Result<Arc<MethodDescriptor>> {
        let ty = self.type_id()?;
        let registry = &self.introspector.registry;
        let levels = ancestry(registry, ty)?;
        let exact = |m: &MethodDescriptor| {
            m.param_types().len() == args.len()
                && m.param_types().iter().zip(args).all(|(p, a)| match registry.type_of(a) {
                    Some(actual) => canonicalize(*p) == actual,
                    None => accepts_all(registry, &[*p], &[Value::Null]),
                })
        };
        let loose = |m: &MethodDescriptor| accepts_all(registry, m.param_types(), args);

        let mut seen_name = false;
        for matcher in [&exact as &dyn Fn(&MethodDescriptor) -> bool, &loose] {
            for level in &levels {
                let declared = self.introspector.cache.declared_methods(level);
                for method in declared.iter().filter(|m| m.name() == name) {
                    seen_name = true;
                    if matcher(method) {
                        return Ok(method.clone());
                    }
                }
            }
        }

        let kind = if seen_name {
            InvocationFailure::IllegalArguments
        } else {
            InvocationFailure::NoSuchMember
        };
        Err(ReflectError::invocation(
            format!("{}.{name}", registry.name_of(ty)),
            kind,
            format!("no method accepting {args:?}"),
        ))
    }
}

impl PartialEq for Reflect<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.is_type == other.is_type && self.ty == other.ty && self.value == other.value
    }
}

impl fmt::Debug for Reflect<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_type {
            f.debug_tuple("Reflect::Type").field(&self.ty).finish()
        } else {
            f.debug_tuple("Reflect").field(&self.value).finish()
        }
    }
}
