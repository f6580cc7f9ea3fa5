//! The owned runtime object tying the pieces together
//!
//! An [`Introspector`] owns a member cache, an access normalizer and a log
//! sink, and shares a [`TypeRegistry`]. Creating one installs a registry
//! hook that evicts cache entries for unregistered or redefined types;
//! [`Introspector::shutdown`] (or dropping it) removes the hook again.
//! Several introspectors may share one registry, each with its own cache.

use std::sync::Arc;

use crate::access::{AccessNormalizer, PermissionStore};
use crate::builder::TypeBuilder;
use crate::cache::{MemberCache, DEFAULT_CAPACITY};
use crate::classify;
use crate::config::{ConfigError, ReflectConfig};
use crate::error::Result;
use crate::hierarchy::HierarchyWalker;
use crate::log::{LogSink, TracingSink};
use crate::member::{ConstructorDescriptor, FieldDescriptor, MethodDescriptor};
use crate::registry::{HookId, TypeRegistry};
use crate::types::{TypeDescriptor, TypeId};
use crate::value::Value;

/// Introspection and invocation over a shared [`TypeRegistry`]
pub struct Introspector {
    pub(crate) registry: Arc<TypeRegistry>,
    pub(crate) cache: Arc<MemberCache>,
    pub(crate) access: AccessNormalizer,
    pub(crate) sink: Arc<dyn LogSink>,
    hook: Option<HookId>,
}

impl Introspector {
    /// Create with default settings: cache of 256 types, no permission
    /// restrictions, diagnostics to `tracing`
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        Self::assemble(registry, DEFAULT_CAPACITY, PermissionStore::new())
    }

    /// Create from a loaded configuration
    pub fn with_config(
        registry: Arc<TypeRegistry>,
        config: &ReflectConfig,
    ) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::assemble(
            registry,
            config.cache.capacity,
            config.permission_store()?,
        ))
    }

    fn assemble(registry: Arc<TypeRegistry>, capacity: usize, store: PermissionStore) -> Self {
        let cache = Arc::new(MemberCache::new(capacity));
        let weak = Arc::downgrade(&cache);
        let hook = registry.add_invalidation_hook(Arc::new(move |id: TypeId| {
            if let Some(cache) = weak.upgrade() {
                cache.evict(id);
            }
        }));
        Self {
            registry,
            cache,
            access: AccessNormalizer::new(store),
            sink: Arc::new(TracingSink),
            hook: Some(hook),
        }
    }

    /// Replace the log sink
    pub fn with_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Remove the registry hook and drop every cache entry.
    ///
    /// Idempotent; also run on drop.
    pub fn shutdown(&mut self) {
        if let Some(hook) = self.hook.take() {
            self.registry.remove_invalidation_hook(hook);
        }
        self.cache.clear();
    }

    /// Whether [`Introspector::shutdown`] has run
    pub fn is_shut_down(&self) -> bool {
        self.hook.is_none()
    }

    // ===== Accessors =====

    /// Shared registry
    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    /// Member cache
    pub fn cache(&self) -> &MemberCache {
        &self.cache
    }

    /// Access normalizer
    pub fn access(&self) -> &AccessNormalizer {
        &self.access
    }

    /// Log sink
    pub fn sink(&self) -> &dyn LogSink {
        self.sink.as_ref()
    }

    /// Grants issued and not yet released
    pub fn active_grants(&self) -> usize {
        self.access.active_grants()
    }

    /// Walker bound to this introspector's registry, cache and sink
    pub fn walker(&self) -> HierarchyWalker<'_> {
        HierarchyWalker::new(&self.registry, &self.cache, self.sink.as_ref())
    }

    // ===== Registry shortcuts =====

    /// Register a type
    pub fn register(&self, builder: TypeBuilder) -> Result<TypeId> {
        self.registry.register(builder)
    }

    /// Descriptor of a registered type
    pub fn describe(&self, ty: TypeId) -> Result<Arc<TypeDescriptor>> {
        self.registry.require(ty)
    }

    /// Runtime type of a value; `None` for null
    pub fn type_of(&self, value: &Value) -> Option<TypeId> {
        self.registry.type_of(value)
    }

    // ===== Hierarchy =====

    /// See [`HierarchyWalker::list_fields`]
    pub fn list_fields(&self, ty: TypeId, filters: &[&str]) -> Result<Vec<Arc<FieldDescriptor>>> {
        self.walker().list_fields(ty, filters)
    }

    /// See [`HierarchyWalker::list_methods`]
    pub fn list_methods(&self, ty: TypeId, filters: &[&str]) -> Result<Vec<Arc<MethodDescriptor>>> {
        self.walker().list_methods(ty, filters)
    }

    /// See [`HierarchyWalker::find_field`]
    pub fn find_field(&self, ty: TypeId, name: &str) -> Result<Option<Arc<FieldDescriptor>>> {
        self.walker().find_field(ty, name)
    }

    /// See [`HierarchyWalker::find_method`]
    pub fn find_method(
        &self,
        ty: TypeId,
        name: &str,
        params: Option<&[TypeId]>,
    ) -> Result<Option<Arc<MethodDescriptor>>> {
        self.walker().find_method(ty, name, params)
    }

    /// See [`HierarchyWalker::list_constructors`]
    pub fn list_constructors(&self, ty: TypeId) -> Result<Vec<Arc<ConstructorDescriptor>>> {
        self.walker().list_constructors(ty)
    }

    /// See [`HierarchyWalker::find_constructor`]
    pub fn find_constructor(
        &self,
        ty: TypeId,
        params: &[TypeId],
    ) -> Result<Option<Arc<ConstructorDescriptor>>> {
        self.walker().find_constructor(ty, params)
    }

    // ===== Classification =====

    /// See [`classify::is_primitive_like`]
    pub fn is_primitive_like(&self, ty: TypeId) -> bool {
        classify::is_primitive_like(&self.registry, ty)
    }

    /// See [`classify::is_collection_like`]
    pub fn is_collection_like(&self, ty: TypeId) -> bool {
        classify::is_collection_like(&self.registry, ty)
    }

    /// See [`classify::is_complex_type`]
    pub fn is_complex_type(&self, ty: TypeId) -> bool {
        classify::is_complex_type(&self.registry, ty)
    }

    /// See [`classify::canonicalize_name`]; misses go to this sink
    pub fn canonicalize_name(&self, name: &str) -> Option<TypeId> {
        classify::canonicalize_name(&self.registry, self.sink.as_ref(), name)
    }
}

impl Drop for Introspector {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for Introspector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Introspector")
            .field("registry", &self.registry)
            .field("cache", &self.cache)
            .field("active_grants", &self.active_grants())
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}
