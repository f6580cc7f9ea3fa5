//! Construction and invocation
//!
//! Every call here follows the same shape: resolve the member, obtain an
//! access grant, check arguments and receiver, then run the body with panics
//! caught. Failures are mapped onto [`ReflectError`]:
//!
//! - construction problems become [`ReflectError::Construction`], with the
//!   constructor body's own failure attached as the cause
//! - invocation problems become [`ReflectError::Invocation`]
//! - a failing method body comes back as its own error, not wrapped
//! - a panicking method body becomes [`ReflectError::Unrecoverable`]

use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::access::AccessOperation;
use crate::classify::{accepts_all, accepts_value};
use crate::error::{
    panic_message, ConstructionFailure, InvocationFailure, ReflectError, Result,
};
use crate::hierarchy::{ancestry, is_subtype};
use crate::introspector::Introspector;
use crate::member::{ConstructorDescriptor, FieldDescriptor, Member, MethodDescriptor};
use crate::types::{TypeDescriptor, TypeId};
use crate::value::{Object, ObjectRef, Value};

impl Introspector {
    /// Create an instance of `ty` with the first declared constructor whose
    /// parameters accept `args`
    pub fn construct(&self, ty: TypeId, args: &[Value]) -> Result<Value> {
        let desc = self.registry.require(ty)?;
        if !desc.is_instantiable() {
            return Err(ReflectError::construction(
                desc.name(),
                ConstructionFailure::NotInstantiable,
                None,
            ));
        }
        let ctor = desc
            .constructors()
            .iter()
            .find(|c| accepts_all(&self.registry, c.param_types(), args))
            .ok_or_else(|| {
                self.sink.debug(&format!(
                    "No constructor of {} accepts {} argument(s)",
                    desc.name(),
                    args.len()
                ));
                ReflectError::construction(desc.name(), ConstructionFailure::IllegalArguments, None)
            })?;
        self.run_constructor(&desc, ctor, args)
    }

    /// Create an instance through an explicit constructor
    pub fn instantiate(&self, ctor: &ConstructorDescriptor, args: &[Value]) -> Result<Value> {
        let desc = self.registry.require(ctor.declaring_type())?;
        if !desc.is_instantiable() {
            return Err(ReflectError::construction(
                desc.name(),
                ConstructionFailure::NotInstantiable,
                None,
            ));
        }
        if desc.generation() != ctor.key().generation {
            return Err(ReflectError::construction(
                desc.name(),
                ConstructionFailure::IllegalArguments,
                Some(anyhow::anyhow!("constructor belongs to a previous definition")),
            ));
        }
        if !accepts_all(&self.registry, ctor.param_types(), args) {
            return Err(ReflectError::construction(
                desc.name(),
                ConstructionFailure::IllegalArguments,
                None,
            ));
        }
        self.run_constructor(&desc, ctor, args)
    }

    fn run_constructor(
        &self,
        desc: &TypeDescriptor,
        ctor: &ConstructorDescriptor,
        args: &[Value],
    ) -> Result<Value> {
        let grant = self
            .access
            .normalize(ctor, AccessOperation::Construct)
            .map_err(|denied| {
                ReflectError::construction(
                    desc.name(),
                    ConstructionFailure::Inaccessible,
                    Some(denied.into()),
                )
            })?;

        let instance = ObjectRef::new(Object::new(
            desc.id(),
            desc.generation(),
            desc.layout().clone(),
            desc.slot_defaults.clone(),
        ));
        let outcome = catch_unwind(AssertUnwindSafe(|| ctor.call(&grant, &instance, args)));
        drop(grant);

        let failure = match outcome {
            Ok(Ok(Ok(()))) => return Ok(Value::Object(instance)),
            Ok(Ok(Err(cause))) => cause,
            Ok(Err(err)) => return Err(err),
            Err(payload) => anyhow::anyhow!("constructor panicked: {}", panic_message(&*payload)),
        };
        self.sink.debug(&format!("Constructor of {} failed: {failure:#}", desc.name()));
        Err(ReflectError::construction(
            desc.name(),
            ConstructionFailure::ConstructorFailed,
            Some(failure),
        ))
    }

    /// Call `method` on `receiver` (ignored for static methods).
    ///
    /// Non-static, non-private methods dispatch to the most-derived override
    /// for the receiver's runtime type. Void methods return [`Value::Null`].
    pub fn invoke(&self, method: &MethodDescriptor, receiver: &Value, args: &[Value]) -> Result<Value> {
        let grant = self
            .access
            .normalize(method, AccessOperation::Invoke)
            .map_err(|denied| {
                ReflectError::invocation(
                    method.qualified_name(),
                    InvocationFailure::Inaccessible,
                    denied.to_string(),
                )
            })?;

        if !accepts_all(&self.registry, method.param_types(), args) {
            return Err(ReflectError::invocation(
                method.qualified_name(),
                InvocationFailure::IllegalArguments,
                format!(
                    "expected {} argument(s) of {:?}, got {:?}",
                    method.param_types().len(),
                    self.type_names(method.param_types()),
                    args
                ),
            ));
        }

        if method.is_static() {
            return self.call_body(method, &grant, &Value::Null, args);
        }
        let runtime = self.check_receiver(method, receiver)?;

        let target = if method.is_virtual() {
            self.resolve_override(method, runtime)?
        } else {
            None
        };
        match target {
            Some(target) => {
                drop(grant);
                let grant = self
                    .access
                    .normalize(&*target, AccessOperation::Invoke)
                    .map_err(|denied| {
                        ReflectError::invocation(
                            target.qualified_name(),
                            InvocationFailure::Inaccessible,
                            denied.to_string(),
                        )
                    })?;
                self.call_body(&target, &grant, receiver, args)
            }
            None => self.call_body(method, &grant, receiver, args),
        }
    }

    fn call_body(
        &self,
        method: &MethodDescriptor,
        grant: &crate::access::AccessGrant<'_>,
        receiver: &Value,
        args: &[Value],
    ) -> Result<Value> {
        if method.is_abstract() {
            return Err(ReflectError::invocation(
                method.qualified_name(),
                InvocationFailure::Abstract,
                "no concrete implementation for the receiver",
            ));
        }
        match catch_unwind(AssertUnwindSafe(|| method.call(grant, receiver, args))) {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(err))) => Err(ReflectError::from_body(err)),
            Ok(Err(err)) => Err(err),
            Err(payload) => {
                let message = format!(
                    "{} panicked: {}",
                    method.qualified_name(),
                    panic_message(&*payload)
                );
                self.sink.error(&message, None);
                Err(ReflectError::Unrecoverable(message))
            }
        }
    }

    /// Most-derived override of `method` visible from `runtime`, if any
    /// level below the declaring type redeclares it
    fn resolve_override(
        &self,
        method: &MethodDescriptor,
        runtime: TypeId,
    ) -> Result<Option<std::sync::Arc<MethodDescriptor>>> {
        if runtime == method.declaring_type() {
            return Ok(None);
        }
        for level in ancestry(&self.registry, runtime)? {
            if level.id() == method.declaring_type() {
                break;
            }
            let declared = self.cache.declared_methods(&level);
            if let Some(found) = declared
                .iter()
                .find(|m| m.is_virtual() && m.same_signature(method))
            {
                return Ok(Some(found.clone()));
            }
        }
        Ok(None)
    }

    fn check_receiver(&self, member: &dyn Member, receiver: &Value) -> Result<TypeId> {
        let runtime = self.registry.type_of(receiver);
        match runtime {
            Some(ty) if is_subtype(&self.registry, ty, member.declaring_type()) => Ok(ty),
            _ => Err(ReflectError::invocation(
                member.qualified_name(),
                InvocationFailure::ReceiverMismatch,
                format!(
                    "receiver {receiver:?} is not an instance of {}",
                    member.declaring_name()
                ),
            )),
        }
    }

    /// Reject field access across a redefinition: the receiver must be built
    /// from the current definition of its type and `field` must come from
    /// the current definition of its declaring type.
    fn check_layout(&self, field: &FieldDescriptor, receiver: &Value) -> Result<()> {
        let Some(obj) = receiver.as_object() else {
            return Ok(());
        };
        let live = |ty: TypeId| self.registry.get(ty).map(|t| t.generation());
        let stale_object = live(obj.type_id()) != Some(obj.generation());
        let stale_field = live(field.declaring_type()) != Some(field.key().generation);
        if !stale_object && !stale_field {
            return Ok(());
        }
        let (outdated, ty) = if stale_object {
            ("receiver", obj.type_id())
        } else {
            ("field descriptor", field.declaring_type())
        };
        self.sink.debug(&format!(
            "Refusing {} on {receiver:?}: {outdated} predates the current definition",
            field.qualified_name()
        ));
        Err(ReflectError::invocation(
            field.qualified_name(),
            InvocationFailure::ReceiverMismatch,
            format!(
                "{outdated} predates the current definition of {}",
                self.registry.name_of(ty)
            ),
        ))
    }

    fn type_names(&self, ids: &[TypeId]) -> Vec<String> {
        ids.iter().map(|id| self.registry.name_of(*id)).collect()
    }

    /// Read a field; `receiver` is ignored for static fields
    pub fn get_field(&self, field: &FieldDescriptor, receiver: &Value) -> Result<Value> {
        let grant = self
            .access
            .normalize(field, AccessOperation::Read)
            .map_err(|denied| {
                ReflectError::invocation(
                    field.qualified_name(),
                    InvocationFailure::Inaccessible,
                    denied.to_string(),
                )
            })?;
        if !field.is_static() {
            self.check_receiver(field, receiver)?;
            self.check_layout(field, receiver)?;
        }
        field.read(&grant, receiver)
    }

    /// Write a field; `receiver` is ignored for static fields
    pub fn set_field(&self, field: &FieldDescriptor, receiver: &Value, value: Value) -> Result<()> {
        let grant = self
            .access
            .normalize(field, AccessOperation::Write)
            .map_err(|denied| {
                ReflectError::invocation(
                    field.qualified_name(),
                    InvocationFailure::Inaccessible,
                    denied.to_string(),
                )
            })?;
        if !field.is_static() {
            self.check_receiver(field, receiver)?;
            self.check_layout(field, receiver)?;
        }
        if !accepts_value(&self.registry, field.field_type(), &value) {
            return Err(ReflectError::invocation(
                field.qualified_name(),
                InvocationFailure::IllegalArguments,
                format!(
                    "cannot store {value:?} in a field of type {}",
                    self.registry.name_of(field.field_type())
                ),
            ));
        }
        field.write(&grant, receiver, value)
    }
}
