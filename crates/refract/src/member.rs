//! Field, method and constructor descriptors
//!
//! Descriptors are immutable once registered. Reading or writing a field, or
//! running a method body, requires an [`AccessGrant`] issued for that exact
//! member by the [`AccessNormalizer`](crate::AccessNormalizer).

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::access::{AccessGrant, AccessOperation};
use crate::error::{InvocationFailure, ReflectError, Result};
use crate::types::{TypeId, Visibility};
use crate::value::{ObjectRef, Value};

/// Signature of a method body: receiver (null for static methods), arguments
pub type MethodBody = Arc<dyn Fn(&Value, &[Value]) -> anyhow::Result<Value> + Send + Sync>;

/// Signature of a constructor body: the fresh instance, arguments
pub type ConstructorBody = Arc<dyn Fn(&ObjectRef, &[Value]) -> anyhow::Result<()> + Send + Sync>;

/// Which table a member lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    /// Field
    Field,
    /// Method
    Method,
    /// Constructor
    Constructor,
}

/// Unique identity of one member of one registration of a type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemberKey {
    /// Declaring type
    pub declaring: TypeId,
    /// Registration generation of the declaring type
    pub generation: u64,
    /// Member table
    pub kind: MemberKind,
    /// Position in the declaring type's table
    pub index: u32,
}

/// Common view over descriptors
pub trait Member {
    /// Identity of the member
    fn key(&self) -> MemberKey;
    /// Member name
    fn name(&self) -> &str;
    /// Type that declares the member
    fn declaring_type(&self) -> TypeId;
    /// Name of the declaring type
    fn declaring_name(&self) -> &str;
    /// Declared visibility
    fn visibility(&self) -> Visibility;
    /// Whether the declaring type itself is public
    fn declaring_type_public(&self) -> bool;
    /// Marker (annotation) names
    fn markers(&self) -> &[String];

    /// Whether the member carries `marker`
    fn has_marker(&self, marker: &str) -> bool {
        self.markers().iter().any(|m| m == marker)
    }

    /// Whether the member carries any of `filters`; an empty filter matches
    fn matches_any(&self, filters: &[&str]) -> bool {
        filters.is_empty() || filters.iter().any(|f| self.has_marker(f))
    }

    /// `Type.member`
    fn qualified_name(&self) -> String {
        format!("{}.{}", self.declaring_name(), self.name())
    }
}

#[derive(Debug, Clone)]
pub(crate) struct MemberHeader {
    pub key: MemberKey,
    pub name: String,
    pub declaring_name: String,
    pub declaring_public: bool,
    pub visibility: Visibility,
    pub markers: Vec<String>,
}

macro_rules! impl_member {
    ($ty:ty) => {
        impl Member for $ty {
            fn key(&self) -> MemberKey {
                self.header.key
            }
            fn name(&self) -> &str {
                &self.header.name
            }
            fn declaring_type(&self) -> TypeId {
                self.header.key.declaring
            }
            fn declaring_name(&self) -> &str {
                &self.header.declaring_name
            }
            fn visibility(&self) -> Visibility {
                self.header.visibility
            }
            fn declaring_type_public(&self) -> bool {
                self.header.declaring_public
            }
            fn markers(&self) -> &[String] {
                &self.header.markers
            }
        }
    };
}

fn require_grant(
    grant: &AccessGrant<'_>,
    member: &dyn Member,
    operation: AccessOperation,
) -> Result<()> {
    if grant.covers(member.key(), operation) {
        Ok(())
    } else {
        Err(ReflectError::invocation(
            member.qualified_name(),
            InvocationFailure::Inaccessible,
            format!("no {operation} grant for this member"),
        ))
    }
}

/// A declared field
pub struct FieldDescriptor {
    pub(crate) header: MemberHeader,
    pub(crate) field_type: TypeId,
    pub(crate) is_static: bool,
    pub(crate) slot: usize,
    pub(crate) static_cell: Option<RwLock<Value>>,
}

impl_member!(FieldDescriptor);

impl FieldDescriptor {
    /// Declared type of the field
    pub fn field_type(&self) -> TypeId {
        self.field_type
    }

    /// Whether the field belongs to the type rather than instances
    pub fn is_static(&self) -> bool {
        self.is_static
    }

    /// Instance slot (meaningless for static fields)
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Read the field. `receiver` is ignored for static fields.
    pub fn read(&self, grant: &AccessGrant<'_>, receiver: &Value) -> Result<Value> {
        require_grant(grant, self, AccessOperation::Read)?;
        if let Some(cell) = &self.static_cell {
            return Ok(cell.read().clone());
        }
        self.instance(receiver)?
            .get(self.slot)
            .ok_or_else(|| self.slot_mismatch())
    }

    /// Write the field. `receiver` is ignored for static fields.
    pub fn write(&self, grant: &AccessGrant<'_>, receiver: &Value, value: Value) -> Result<()> {
        require_grant(grant, self, AccessOperation::Write)?;
        if let Some(cell) = &self.static_cell {
            *cell.write() = value;
            return Ok(());
        }
        let obj = self.instance(receiver)?;
        if obj.set(self.slot, value) {
            Ok(())
        } else {
            Err(self.slot_mismatch())
        }
    }

    /// Object receiver whose layout holds this field at [`slot`](Self::slot)
    fn instance<'v>(&self, receiver: &'v Value) -> Result<&'v ObjectRef> {
        let obj = receiver.as_object().ok_or_else(|| {
            ReflectError::invocation(
                self.qualified_name(),
                InvocationFailure::ReceiverMismatch,
                format!("instance field needs an object receiver, got {receiver:?}"),
            )
        })?;
        if obj.slot_name(self.slot) != Some(self.name()) {
            return Err(self.slot_mismatch());
        }
        Ok(obj)
    }

    fn slot_mismatch(&self) -> ReflectError {
        ReflectError::invocation(
            self.qualified_name(),
            InvocationFailure::ReceiverMismatch,
            format!("receiver has no slot {} holding '{}'", self.slot, self.name()),
        )
    }
}

impl fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("name", &self.header.name)
            .field("declaring", &self.header.declaring_name)
            .field("type", &self.field_type)
            .field("visibility", &self.header.visibility)
            .field("static", &self.is_static)
            .field("slot", &self.slot)
            .finish()
    }
}

/// A declared method
pub struct MethodDescriptor {
    pub(crate) header: MemberHeader,
    pub(crate) params: Vec<TypeId>,
    pub(crate) return_type: Option<TypeId>,
    pub(crate) is_static: bool,
    pub(crate) body: Option<MethodBody>,
}

impl_member!(MethodDescriptor);

impl MethodDescriptor {
    /// Ordered parameter types
    pub fn param_types(&self) -> &[TypeId] {
        &self.params
    }

    /// Return type; `None` means void
    pub fn return_type(&self) -> Option<TypeId> {
        self.return_type
    }

    /// Whether the method is static
    pub fn is_static(&self) -> bool {
        self.is_static
    }

    /// Whether the method has no body
    pub fn is_abstract(&self) -> bool {
        self.body.is_none()
    }

    /// Same name and exactly the same parameter types
    pub fn same_signature(&self, other: &MethodDescriptor) -> bool {
        self.header.name == other.header.name && self.params == other.params
    }

    /// Whether calls may dispatch to an override in a subtype
    pub(crate) fn is_virtual(&self) -> bool {
        !self.is_static && self.header.visibility != Visibility::Private
    }

    /// Run the body. The outer result fails only when the grant does not
    /// cover this method; the inner one is the body's own outcome.
    pub fn call(
        &self,
        grant: &AccessGrant<'_>,
        receiver: &Value,
        args: &[Value],
    ) -> Result<anyhow::Result<Value>> {
        require_grant(grant, self, AccessOperation::Invoke)?;
        let body = self.body.as_ref().ok_or_else(|| {
            ReflectError::invocation(
                self.qualified_name(),
                InvocationFailure::Abstract,
                "method has no body",
            )
        })?;
        Ok(body(receiver, args))
    }
}

impl fmt::Debug for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDescriptor")
            .field("name", &self.header.name)
            .field("declaring", &self.header.declaring_name)
            .field("params", &self.params)
            .field("returns", &self.return_type)
            .field("visibility", &self.header.visibility)
            .field("static", &self.is_static)
            .finish()
    }
}

/// A declared (or implicit) constructor
pub struct ConstructorDescriptor {
    pub(crate) header: MemberHeader,
    pub(crate) params: Vec<TypeId>,
    pub(crate) body: Option<ConstructorBody>,
}

impl_member!(ConstructorDescriptor);

impl ConstructorDescriptor {
    /// Ordered parameter types
    pub fn param_types(&self) -> &[TypeId] {
        &self.params
    }

    /// Whether this is the no-argument constructor supplied for types that
    /// declare none
    pub fn is_implicit(&self) -> bool {
        self.body.is_none()
    }

    /// Run the body against a freshly allocated instance. Implicit
    /// constructors do nothing.
    pub fn call(
        &self,
        grant: &AccessGrant<'_>,
        instance: &ObjectRef,
        args: &[Value],
    ) -> Result<anyhow::Result<()>> {
        require_grant(grant, self, AccessOperation::Construct)?;
        Ok(match &self.body {
            Some(body) => body(instance, args),
            None => Ok(()),
        })
    }
}

impl fmt::Debug for ConstructorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstructorDescriptor")
            .field("declaring", &self.header.declaring_name)
            .field("params", &self.params)
            .field("visibility", &self.header.visibility)
            .finish()
    }
}
