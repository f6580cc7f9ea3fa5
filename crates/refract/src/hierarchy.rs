//! Hierarchy walking
//!
//! Enumerations run from the most distant ancestor down to the requested
//! type, so inherited members always come before the type's own. Lookups run
//! the other way and stop at the first declaration, which makes name-only
//! lookups resolve to the most-derived member.

use std::sync::Arc;

use crate::cache::MemberCache;
use crate::error::{ReflectError, Result};
use crate::log::LogSink;
use crate::member::{ConstructorDescriptor, FieldDescriptor, Member, MethodDescriptor};
use crate::registry::TypeRegistry;
use crate::types::{TypeDescriptor, TypeId};

/// The type and its ancestors, leaf first
pub fn ancestry(registry: &TypeRegistry, ty: TypeId) -> Result<Vec<Arc<TypeDescriptor>>> {
    let mut chain = vec![registry.require(ty)?];
    while let Some(parent) = chain.last().and_then(|t| t.parent()) {
        match registry.get(parent) {
            Some(desc) => chain.push(desc),
            None => break,
        }
    }
    Ok(chain)
}

/// Whether `sub` is `sup` or one of its descendants
pub fn is_subtype(registry: &TypeRegistry, sub: TypeId, sup: TypeId) -> bool {
    let mut current = Some(sub);
    while let Some(id) = current {
        if id == sup {
            return true;
        }
        current = registry.get(id).and_then(|t| t.parent());
    }
    false
}

fn require_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(ReflectError::precondition("member name must not be empty"));
    }
    Ok(())
}

/// Walks a type's ancestor chain to enumerate and locate members
#[derive(Clone, Copy)]
pub struct HierarchyWalker<'a> {
    registry: &'a TypeRegistry,
    cache: &'a MemberCache,
    sink: &'a dyn LogSink,
}

impl<'a> HierarchyWalker<'a> {
    /// Create a walker
    pub fn new(registry: &'a TypeRegistry, cache: &'a MemberCache, sink: &'a dyn LogSink) -> Self {
        Self {
            registry,
            cache,
            sink,
        }
    }

    /// Type ids from `ty` up to its root, leaf first
    pub fn hierarchy(&self, ty: TypeId) -> Result<Vec<TypeId>> {
        Ok(ancestry(self.registry, ty)?.iter().map(|t| t.id()).collect())
    }

    /// All fields of `ty`, ancestor-declared first.
    ///
    /// With `filters`, keep only fields carrying at least one of the markers.
    /// Shadowed fields appear once per declaring type.
    pub fn list_fields(&self, ty: TypeId, filters: &[&str]) -> Result<Vec<Arc<FieldDescriptor>>> {
        let chain = ancestry(self.registry, ty)?;
        Ok(chain
            .iter()
            .rev()
            .flat_map(|t| t.declared_fields().iter())
            .filter(|f| f.matches_any(filters))
            .cloned()
            .collect())
    }

    /// All methods of `ty`, ancestor-declared first, read through the cache
    pub fn list_methods(&self, ty: TypeId, filters: &[&str]) -> Result<Vec<Arc<MethodDescriptor>>> {
        let chain = ancestry(self.registry, ty)?;
        let mut methods = Vec::new();
        for level in chain.iter().rev() {
            methods.extend(
                self.cache
                    .declared_methods(level)
                    .iter()
                    .filter(|m| m.matches_any(filters))
                    .cloned(),
            );
        }
        Ok(methods)
    }

    /// Nearest declaration of field `name`, walking from `ty` upward
    pub fn find_field(&self, ty: TypeId, name: &str) -> Result<Option<Arc<FieldDescriptor>>> {
        require_name(name)?;
        for level in ancestry(self.registry, ty)? {
            if let Some(field) = level.declared_fields().iter().find(|f| f.name() == name) {
                return Ok(Some(field.clone()));
            }
            self.sink
                .debug(&format!("Field '{name}' is not declared by {}", level.name()));
        }
        self.sink.warn(&format!(
            "Could not find field '{name}' in {} or its ancestors",
            self.registry.name_of(ty)
        ));
        Ok(None)
    }

    /// Nearest declaration of method `name`, walking from `ty` upward.
    ///
    /// With `params`, only an exact ordered match counts. Without, the first
    /// same-named method in declaration order at the nearest level wins, even
    /// when other overloads exist.
    pub fn find_method(
        &self,
        ty: TypeId,
        name: &str,
        params: Option<&[TypeId]>,
    ) -> Result<Option<Arc<MethodDescriptor>>> {
        require_name(name)?;
        for level in ancestry(self.registry, ty)? {
            let declared = self.cache.declared_methods(&level);
            let found = declared.iter().find(|m| {
                m.name() == name && params.is_none_or(|p| m.param_types() == p)
            });
            if let Some(method) = found {
                return Ok(Some(method.clone()));
            }
            self.sink
                .debug(&format!("Method '{name}' is not declared by {}", level.name()));
        }
        self.sink.warn(&format!(
            "Could not find method '{name}' in {} or its ancestors",
            self.registry.name_of(ty)
        ));
        Ok(None)
    }

    /// Constructors of `ty` itself; constructors are not inherited
    pub fn list_constructors(&self, ty: TypeId) -> Result<Vec<Arc<ConstructorDescriptor>>> {
        Ok(self.registry.require(ty)?.constructors().to_vec())
    }

    /// Constructor of `ty` with exactly `params`
    pub fn find_constructor(
        &self,
        ty: TypeId,
        params: &[TypeId],
    ) -> Result<Option<Arc<ConstructorDescriptor>>> {
        Ok(self
            .registry
            .require(ty)?
            .constructors()
            .iter()
            .find(|c| c.param_types() == params)
            .cloned())
    }
}
