//! Type definitions handed to the registry
//!
//! A [`TypeBuilder`] describes one type: its parent, fields, methods and
//! constructors. Registration turns it into an immutable
//! [`TypeDescriptor`](crate::TypeDescriptor).

use std::sync::Arc;

use crate::member::{ConstructorBody, MethodBody};
use crate::types::{TypeId, Visibility};
use crate::value::{ObjectRef, Value};

/// Definition for a field
#[derive(Debug, Clone)]
pub struct FieldDef {
    /// Field name
    pub name: String,
    /// Declared type
    pub field_type: TypeId,
    /// Initial value; defaults to the type's zero value or null
    pub initial_value: Option<Value>,
    /// Whether this is a static field
    pub is_static: bool,
    /// Declared visibility
    pub visibility: Visibility,
    /// Marker names
    pub markers: Vec<String>,
}

impl FieldDef {
    /// Create a public instance field
    pub fn new(name: impl Into<String>, field_type: TypeId) -> Self {
        Self {
            name: name.into(),
            field_type,
            initial_value: None,
            is_static: false,
            visibility: Visibility::Public,
            markers: Vec::new(),
        }
    }

    /// Set the initial value
    pub fn initial_value(mut self, value: impl Into<Value>) -> Self {
        self.initial_value = Some(value.into());
        self
    }

    /// Mark as static field
    pub fn as_static(mut self) -> Self {
        self.is_static = true;
        self
    }

    /// Mark as private
    pub fn as_private(self) -> Self {
        self.with_visibility(Visibility::Private)
    }

    /// Set visibility
    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// Attach a marker
    pub fn marker(mut self, marker: impl Into<String>) -> Self {
        self.markers.push(marker.into());
        self
    }
}

/// Definition for a method
#[derive(Clone)]
pub struct MethodDef {
    /// Method name
    pub name: String,
    /// Parameter types, in order
    pub params: Vec<TypeId>,
    /// Return type; `None` is void
    pub return_type: Option<TypeId>,
    /// Whether this is a static method
    pub is_static: bool,
    /// Declared visibility
    pub visibility: Visibility,
    /// Marker names
    pub markers: Vec<String>,
    /// Implementation; `None` for abstract methods
    pub body: Option<MethodBody>,
}

impl MethodDef {
    /// Create a public instance method
    pub fn new<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&Value, &[Value]) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        Self {
            body: Some(Arc::new(body)),
            ..Self::abstract_method(name)
        }
    }

    /// Create a method without a body
    pub fn abstract_method(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            return_type: None,
            is_static: false,
            visibility: Visibility::Public,
            markers: Vec::new(),
            body: None,
        }
    }

    /// Add a parameter
    pub fn with_param(mut self, param: TypeId) -> Self {
        self.params.push(param);
        self
    }

    /// Set all parameters at once
    pub fn with_params(mut self, params: impl IntoIterator<Item = TypeId>) -> Self {
        self.params = params.into_iter().collect();
        self
    }

    /// Set return type
    pub fn returns(mut self, return_type: TypeId) -> Self {
        self.return_type = Some(return_type);
        self
    }

    /// Mark as static method
    pub fn as_static(mut self) -> Self {
        self.is_static = true;
        self
    }

    /// Mark as private
    pub fn as_private(self) -> Self {
        self.with_visibility(Visibility::Private)
    }

    /// Set visibility
    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// Attach a marker
    pub fn marker(mut self, marker: impl Into<String>) -> Self {
        self.markers.push(marker.into());
        self
    }
}

/// Definition for a constructor
#[derive(Clone)]
pub struct ConstructorDef {
    /// Parameter types, in order
    pub params: Vec<TypeId>,
    /// Declared visibility
    pub visibility: Visibility,
    /// Marker names
    pub markers: Vec<String>,
    /// Implementation
    pub body: ConstructorBody,
}

impl ConstructorDef {
    /// Create a public constructor
    pub fn new<F>(body: F) -> Self
    where
        F: Fn(&ObjectRef, &[Value]) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self {
            params: Vec::new(),
            visibility: Visibility::Public,
            markers: Vec::new(),
            body: Arc::new(body),
        }
    }

    /// Add a parameter
    pub fn with_param(mut self, param: TypeId) -> Self {
        self.params.push(param);
        self
    }

    /// Mark as private
    pub fn as_private(self) -> Self {
        self.with_visibility(Visibility::Private)
    }

    /// Set visibility
    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// Attach a marker
    pub fn marker(mut self, marker: impl Into<String>) -> Self {
        self.markers.push(marker.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BuilderKind {
    Class,
    Enum,
}

/// Definition of a whole type
#[derive(Clone)]
pub struct TypeBuilder {
    pub(crate) name: String,
    pub(crate) kind: BuilderKind,
    pub(crate) parent: Option<TypeId>,
    pub(crate) visibility: Visibility,
    pub(crate) is_abstract: bool,
    pub(crate) markers: Vec<String>,
    pub(crate) fields: Vec<FieldDef>,
    pub(crate) methods: Vec<MethodDef>,
    pub(crate) constructors: Vec<ConstructorDef>,
    pub(crate) variants: Vec<String>,
}

impl TypeBuilder {
    fn with_kind(name: impl Into<String>, kind: BuilderKind) -> Self {
        Self {
            name: name.into(),
            kind,
            parent: None,
            visibility: Visibility::Public,
            is_abstract: false,
            markers: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            constructors: Vec::new(),
            variants: Vec::new(),
        }
    }

    /// Start a class definition
    pub fn class(name: impl Into<String>) -> Self {
        Self::with_kind(name, BuilderKind::Class)
    }

    /// Start an enum definition
    pub fn enumeration<I, S>(name: impl Into<String>, variants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut builder = Self::with_kind(name, BuilderKind::Enum);
        builder.variants = variants.into_iter().map(Into::into).collect();
        builder
    }

    /// Set the direct ancestor
    pub fn extends(mut self, parent: TypeId) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Mark the type abstract
    pub fn as_abstract(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    /// Set visibility of the type itself
    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// Attach a marker to the type
    pub fn marker(mut self, marker: impl Into<String>) -> Self {
        self.markers.push(marker.into());
        self
    }

    /// Add a field
    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    /// Add a method
    pub fn method(mut self, method: MethodDef) -> Self {
        self.methods.push(method);
        self
    }

    /// Add a constructor
    pub fn constructor(mut self, constructor: ConstructorDef) -> Self {
        self.constructors.push(constructor);
        self
    }

    /// Name of the type being defined
    pub fn name(&self) -> &str {
        &self.name
    }
}
