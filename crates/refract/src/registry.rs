//! Type-descriptor registry
//!
//! The registry is the single source of type metadata. Built-in types are
//! pre-registered at fixed ids; user types arrive through
//! [`TypeRegistry::register`]. Unregistering or redefining a type fires every
//! invalidation hook with the affected id, after the tables are updated.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::builder::{BuilderKind, TypeBuilder};
use crate::error::{ReflectError, Result};
use crate::member::{
    ConstructorDescriptor, FieldDescriptor, MemberHeader, MemberKey, MemberKind, MethodDescriptor,
};
use crate::types::{CollectionKind, PrimitiveKind, TypeDescriptor, TypeId, TypeKind, Visibility};
use crate::value::Value;

/// Callback fired with the id of an unregistered or redefined type
pub type InvalidationHook = Arc<dyn Fn(TypeId) + Send + Sync>;

/// Handle used to remove an invalidation hook
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookId(u64);

#[derive(Default)]
struct RegistryInner {
    /// Types indexed by id; unregistered slots are `None`
    types: Vec<Option<Arc<TypeDescriptor>>>,
    /// Name to id mapping
    by_name: FxHashMap<String, TypeId>,
    /// Element type to interned array type
    arrays: FxHashMap<TypeId, TypeId>,
}

impl RegistryInner {
    fn get(&self, id: TypeId) -> Option<&Arc<TypeDescriptor>> {
        self.types.get(id.index()).and_then(Option::as_ref)
    }

    fn has_subtypes(&self, id: TypeId) -> bool {
        self.types
            .iter()
            .flatten()
            .any(|t| t.parent == Some(id) || t.kind == TypeKind::Array { element: id })
    }

    /// `id` followed by its interned arrays, innermost first
    fn with_arrays(&self, id: TypeId) -> Vec<TypeId> {
        let mut chain = vec![id];
        let mut element = id;
        while let Some(array) = self.arrays.get(&element) {
            chain.push(*array);
            element = *array;
        }
        chain
    }

    /// A type outside `ids` whose fields or signatures use one of `ids`
    fn dependent_of(&self, ids: &[TypeId]) -> Option<&Arc<TypeDescriptor>> {
        self.types
            .iter()
            .flatten()
            .filter(|t| !ids.contains(&t.id))
            .find(|t| {
                t.fields.iter().any(|f| ids.contains(&f.field_type()))
                    || t.methods.iter().any(|m| {
                        m.return_type().is_some_and(|r| ids.contains(&r))
                            || m.param_types().iter().any(|p| ids.contains(p))
                    })
                    || t.constructors
                        .iter()
                        .any(|c| c.param_types().iter().any(|p| ids.contains(p)))
            })
    }
}

/// Registry of type descriptors
pub struct TypeRegistry {
    inner: RwLock<RegistryInner>,
    hooks: RwLock<Vec<(HookId, InvalidationHook)>>,
    next_hook: AtomicU64,
    next_generation: AtomicU64,
}

impl TypeRegistry {
    /// Create a registry holding only the built-in types
    pub fn new() -> Self {
        let registry = Self {
            inner: RwLock::new(RegistryInner::default()),
            hooks: RwLock::new(Vec::new()),
            next_hook: AtomicU64::new(0),
            next_generation: AtomicU64::new(0),
        };
        registry.register_builtins();
        registry
    }

    fn register_builtins(&self) {
        let mut inner = self.inner.write();
        let mut add = |name: &str, kind: TypeKind| {
            let id = TypeId::from_index(inner.types.len());
            let desc = self.bare_descriptor(id, name, kind);
            inner.by_name.insert(name.to_string(), id);
            inner.types.push(Some(Arc::new(desc)));
        };
        for kind in PrimitiveKind::ALL {
            add(kind.native_name(), TypeKind::Primitive(kind));
        }
        for kind in PrimitiveKind::ALL {
            add(kind.boxed_name(), TypeKind::Boxed(kind));
        }
        add("String", TypeKind::String);
        add("List", TypeKind::Collection(CollectionKind::List));
        add("Set", TypeKind::Collection(CollectionKind::Set));
        add("Map", TypeKind::Collection(CollectionKind::Map));
        debug_assert_eq!(inner.types.len(), TypeId::BUILTIN_COUNT as usize);
    }

    fn bare_descriptor(&self, id: TypeId, name: &str, kind: TypeKind) -> TypeDescriptor {
        TypeDescriptor {
            id,
            generation: self.next_generation.fetch_add(1, Ordering::Relaxed),
            name: name.to_string(),
            kind,
            parent: None,
            visibility: Visibility::Public,
            is_abstract: false,
            markers: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            constructors: Vec::new(),
            variants: Vec::new(),
            layout: Arc::from(Vec::<String>::new()),
            slot_defaults: Vec::new(),
        }
    }

    // ===== Registration =====

    /// Register a new type
    pub fn register(&self, builder: TypeBuilder) -> Result<TypeId> {
        let mut inner = self.inner.write();
        if inner.by_name.contains_key(&builder.name) {
            return Err(ReflectError::precondition(format!(
                "type '{}' is already registered",
                builder.name
            )));
        }
        let id = TypeId::from_index(inner.types.len());
        let desc = self.build_descriptor(&inner, id, builder)?;
        inner.by_name.insert(desc.name.clone(), id);
        inner.types.push(Some(Arc::new(desc)));
        Ok(id)
    }

    /// Replace the definition of a registered type, keeping its id.
    ///
    /// Refused for built-in types and for types that still have subtypes.
    pub fn redefine(&self, id: TypeId, builder: TypeBuilder) -> Result<()> {
        {
            let mut inner = self.inner.write();
            let existing = Self::mutable_type(&inner, id)?;
            if existing.name != builder.name {
                return Err(ReflectError::precondition(format!(
                    "redefinition of '{}' must keep its name, got '{}'",
                    existing.name, builder.name
                )));
            }
            let desc = self.build_descriptor(&inner, id, builder)?;
            inner.types[id.index()] = Some(Arc::new(desc));
        }
        self.fire(&[id]);
        Ok(())
    }

    /// Remove a type. Interned arrays of it (`T[]`, `T[][]`, ...) are removed
    /// with it.
    ///
    /// Refused while another type declares a field, parameter or return
    /// value of the type or of one of those arrays.
    pub fn unregister(&self, id: TypeId) -> Result<Arc<TypeDescriptor>> {
        let (removed, affected) = {
            let mut inner = self.inner.write();
            let existing = Self::mutable_type(&inner, id)?;
            let affected = inner.with_arrays(id);
            if let Some(dependent) = inner.dependent_of(&affected) {
                return Err(ReflectError::precondition(format!(
                    "type '{}' is still used by '{}'",
                    existing.name, dependent.name
                )));
            }
            for ty in &affected {
                inner.arrays.remove(ty);
                if let Some(desc) = inner.types[ty.index()].take() {
                    inner.by_name.remove(&desc.name);
                }
            }
            (existing, affected)
        };
        self.fire(&affected);
        Ok(removed)
    }

    fn mutable_type(inner: &RegistryInner, id: TypeId) -> Result<Arc<TypeDescriptor>> {
        if id.is_builtin() {
            return Err(ReflectError::precondition(format!(
                "built-in type {id} cannot be changed"
            )));
        }
        let existing = inner
            .get(id)
            .cloned()
            .ok_or_else(|| ReflectError::precondition(format!("type {id} is not registered")))?;
        if matches!(existing.kind, TypeKind::Array { .. }) {
            return Err(ReflectError::precondition(format!(
                "array type '{}' cannot be changed directly",
                existing.name
            )));
        }
        if inner.types.iter().flatten().any(|t| t.parent == Some(id)) {
            return Err(ReflectError::precondition(format!(
                "type '{}' still has registered subtypes",
                existing.name
            )));
        }
        Ok(existing)
    }

    fn build_descriptor(
        &self,
        inner: &RegistryInner,
        id: TypeId,
        builder: TypeBuilder,
    ) -> Result<TypeDescriptor> {
        if builder.name.trim().is_empty() {
            return Err(ReflectError::precondition("type name must not be empty"));
        }
        if builder.name.ends_with("[]") {
            return Err(ReflectError::precondition(format!(
                "'{}' is reserved for array types",
                builder.name
            )));
        }

        let parent = match builder.parent {
            Some(parent_id) => {
                let parent = inner.get(parent_id).ok_or_else(|| {
                    ReflectError::precondition(format!("parent type {parent_id} is not registered"))
                })?;
                let extendable = matches!(parent.kind, TypeKind::Class | TypeKind::Collection(_));
                if builder.kind != BuilderKind::Class || !extendable {
                    return Err(ReflectError::precondition(format!(
                        "'{}' cannot extend '{}'",
                        builder.name, parent.name
                    )));
                }
                Some(parent.clone())
            }
            None => None,
        };

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let declaring_public = builder.visibility.is_public();
        let header = |kind: MemberKind, index: usize, name: &str, visibility, markers: &[String]| {
            MemberHeader {
                key: MemberKey {
                    declaring: id,
                    generation,
                    kind,
                    index: index as u32,
                },
                name: name.to_string(),
                declaring_name: builder.name.clone(),
                declaring_public,
                visibility,
                markers: markers.to_vec(),
            }
        };

        // Fields: instance slots continue after the parent's.
        let mut layout: Vec<String> = parent.as_ref().map_or_else(Vec::new, |p| p.layout.to_vec());
        let mut slot_defaults = parent
            .as_ref()
            .map_or_else(Vec::new, |p| p.slot_defaults.clone());
        let mut seen = FxHashSet::default();
        let mut fields = Vec::with_capacity(builder.fields.len());
        for (index, def) in builder.fields.iter().enumerate() {
            if !seen.insert(def.name.as_str()) {
                return Err(ReflectError::precondition(format!(
                    "field '{}' declared twice in '{}'",
                    def.name, builder.name
                )));
            }
            let field_kind = inner.get(def.field_type).map(|t| t.kind).ok_or_else(|| {
                ReflectError::precondition(format!(
                    "field '{}' has unregistered type {}",
                    def.name, def.field_type
                ))
            })?;
            let initial = def.initial_value.clone().unwrap_or_else(|| match field_kind {
                TypeKind::Primitive(kind) => kind.zero_value(),
                _ => Value::Null,
            });
            let (slot, static_cell) = if def.is_static {
                (usize::MAX, Some(RwLock::new(initial)))
            } else {
                layout.push(def.name.clone());
                slot_defaults.push(initial);
                (layout.len() - 1, None)
            };
            fields.push(Arc::new(FieldDescriptor {
                header: header(MemberKind::Field, index, &def.name, def.visibility, &def.markers),
                field_type: def.field_type,
                is_static: def.is_static,
                slot,
                static_cell,
            }));
        }

        let mut methods: Vec<Arc<MethodDescriptor>> = Vec::with_capacity(builder.methods.len());
        for (index, def) in builder.methods.iter().enumerate() {
            if def.name.is_empty() {
                return Err(ReflectError::precondition("method name must not be empty"));
            }
            if methods.iter().any(|m| m.header.name == def.name && m.params == def.params) {
                return Err(ReflectError::precondition(format!(
                    "method '{}{:?}' declared twice in '{}'",
                    def.name, def.params, builder.name
                )));
            }
            if def.body.is_none() && !builder.is_abstract {
                return Err(ReflectError::precondition(format!(
                    "abstract method '{}' in concrete type '{}'",
                    def.name, builder.name
                )));
            }
            Self::check_types(inner, def.params.iter().chain(def.return_type.iter()))?;
            methods.push(Arc::new(MethodDescriptor {
                header: header(MemberKind::Method, index, &def.name, def.visibility, &def.markers),
                params: def.params.clone(),
                return_type: def.return_type,
                is_static: def.is_static,
                body: def.body.clone(),
            }));
        }

        let mut constructors: Vec<Arc<ConstructorDescriptor>> = Vec::new();
        if builder.kind == BuilderKind::Class {
            for (index, def) in builder.constructors.iter().enumerate() {
                if constructors.iter().any(|c| c.params == def.params) {
                    return Err(ReflectError::precondition(format!(
                        "constructor {:?} declared twice in '{}'",
                        def.params, builder.name
                    )));
                }
                Self::check_types(inner, def.params.iter())?;
                constructors.push(Arc::new(ConstructorDescriptor {
                    header: header(
                        MemberKind::Constructor,
                        index,
                        "<init>",
                        def.visibility,
                        &def.markers,
                    ),
                    params: def.params.clone(),
                    body: Some(def.body.clone()),
                }));
            }
            if constructors.is_empty() {
                constructors.push(Arc::new(ConstructorDescriptor {
                    header: header(MemberKind::Constructor, 0, "<init>", Visibility::Public, &[]),
                    params: Vec::new(),
                    body: None,
                }));
            }
        } else if !builder.constructors.is_empty() {
            return Err(ReflectError::precondition(format!(
                "enum '{}' cannot declare constructors",
                builder.name
            )));
        }

        let kind = match builder.kind {
            BuilderKind::Class => TypeKind::Class,
            BuilderKind::Enum => TypeKind::Enum,
        };

        Ok(TypeDescriptor {
            id,
            generation,
            name: builder.name,
            kind,
            parent: parent.map(|p| p.id),
            visibility: builder.visibility,
            is_abstract: builder.is_abstract,
            markers: builder.markers,
            fields,
            methods,
            constructors,
            variants: builder.variants,
            layout: Arc::from(layout),
            slot_defaults,
        })
    }

    fn check_types<'a>(inner: &RegistryInner, ids: impl Iterator<Item = &'a TypeId>) -> Result<()> {
        for id in ids {
            if inner.get(*id).is_none() {
                return Err(ReflectError::precondition(format!(
                    "type {id} is not registered"
                )));
            }
        }
        Ok(())
    }

    // ===== Lookup =====

    /// Get a type by id
    pub fn get(&self, id: TypeId) -> Option<Arc<TypeDescriptor>> {
        self.inner.read().get(id).cloned()
    }

    /// Get a type by id, failing with a precondition error when absent
    pub fn require(&self, id: TypeId) -> Result<Arc<TypeDescriptor>> {
        self.get(id)
            .ok_or_else(|| ReflectError::precondition(format!("type {id} is not registered")))
    }

    /// Exact name lookup
    pub fn lookup(&self, name: &str) -> Option<TypeId> {
        self.inner.read().by_name.get(name).copied()
    }

    /// Name lookup that also understands `Element[]` array syntax
    pub fn resolve_name(&self, name: &str) -> Option<TypeId> {
        if let Some(id) = self.lookup(name) {
            return Some(id);
        }
        let element = name.strip_suffix("[]")?;
        let element = self.resolve_name(element)?;
        self.array_of(element).ok()
    }

    /// Name of a type, or its id when unregistered
    pub fn name_of(&self, id: TypeId) -> String {
        self.get(id).map_or_else(|| id.to_string(), |t| t.name.clone())
    }

    /// Interned array type with the given element type
    pub fn array_of(&self, element: TypeId) -> Result<TypeId> {
        if let Some(id) = self.inner.read().arrays.get(&element) {
            return Ok(*id);
        }
        let mut inner = self.inner.write();
        if let Some(id) = inner.arrays.get(&element) {
            return Ok(*id);
        }
        let element_name = inner
            .get(element)
            .map(|t| t.name.clone())
            .ok_or_else(|| ReflectError::precondition(format!("type {element} is not registered")))?;
        let id = TypeId::from_index(inner.types.len());
        let name = format!("{element_name}[]");
        let desc = self.bare_descriptor(id, &name, TypeKind::Array { element });
        inner.by_name.insert(name, id);
        inner.arrays.insert(element, id);
        inner.types.push(Some(Arc::new(desc)));
        Ok(id)
    }

    /// Runtime type of a value; `None` for null
    pub fn type_of(&self, value: &Value) -> Option<TypeId> {
        let id = match value {
            Value::Null => return None,
            Value::Bool(_) => TypeId::BOXED_BOOL,
            Value::Byte(_) => TypeId::BOXED_BYTE,
            Value::Char(_) => TypeId::BOXED_CHAR,
            Value::Short(_) => TypeId::BOXED_SHORT,
            Value::Int(_) => TypeId::BOXED_INT,
            Value::Long(_) => TypeId::BOXED_LONG,
            Value::Float(_) => TypeId::BOXED_FLOAT,
            Value::Double(_) => TypeId::BOXED_DOUBLE,
            Value::Str(_) => TypeId::STRING,
            Value::Enum { type_id, .. } => *type_id,
            Value::Array { element, .. } => return self.array_of(*element).ok(),
            Value::List(_) => TypeId::LIST,
            Value::Set(_) => TypeId::SET,
            Value::Map(_) => TypeId::MAP,
            Value::Object(obj) => obj.type_id(),
        };
        Some(id)
    }

    /// All registered types in id order
    pub fn types(&self) -> Vec<Arc<TypeDescriptor>> {
        self.inner.read().types.iter().flatten().cloned().collect()
    }

    /// Direct subtypes of `id`
    pub fn subtypes(&self, id: TypeId) -> Vec<TypeId> {
        self.inner
            .read()
            .types
            .iter()
            .flatten()
            .filter(|t| t.parent == Some(id))
            .map(|t| t.id)
            .collect()
    }

    /// Whether anything (subtype or interned array) still refers to `id`
    pub fn is_referenced(&self, id: TypeId) -> bool {
        self.inner.read().has_subtypes(id)
    }

    /// Number of registered types, built-ins included
    pub fn len(&self) -> usize {
        self.inner.read().types.iter().flatten().count()
    }

    /// Whether the registry holds no types (never true: built-ins exist)
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ===== Invalidation hooks =====

    /// Register a hook fired whenever a type is unregistered or redefined
    pub fn add_invalidation_hook(&self, hook: InvalidationHook) -> HookId {
        let id = HookId(self.next_hook.fetch_add(1, Ordering::Relaxed));
        self.hooks.write().push((id, hook));
        id
    }

    /// Remove a hook; returns false if it was not installed
    pub fn remove_invalidation_hook(&self, id: HookId) -> bool {
        let mut hooks = self.hooks.write();
        let before = hooks.len();
        hooks.retain(|(hook_id, _)| *hook_id != id);
        hooks.len() != before
    }

    fn fire(&self, ids: &[TypeId]) {
        let hooks: Vec<InvalidationHook> = self.hooks.read().iter().map(|(_, h)| h.clone()).collect();
        for id in ids {
            for hook in &hooks {
                hook(*id);
            }
        }
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("types", &self.len())
            .field("hooks", &self.hooks.read().len())
            .finish()
    }
}
