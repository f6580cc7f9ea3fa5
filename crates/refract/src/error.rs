//! Error taxonomy for introspection and invocation
//!
//! Every public operation reports failures through [`ReflectError`]. Members
//! that are simply absent are not errors: `find_*` lookups return `Ok(None)`.

use std::fmt;

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, ReflectError>;

/// Why an instance could not be constructed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstructionFailure {
    /// Target is abstract or not a class at all
    NotInstantiable,
    /// The access policy refused a grant for the constructor
    Inaccessible,
    /// No constructor accepts the supplied arguments
    IllegalArguments,
    /// The constructor body itself failed
    ConstructorFailed,
}

impl ConstructionFailure {
    /// Human readable reason, matching the message attached to the error
    pub fn message(&self) -> &'static str {
        match self {
            Self::NotInstantiable => "Is it an abstract class?",
            Self::Inaccessible => "Is the constructor accessible?",
            Self::IllegalArguments => "Illegal arguments for constructor",
            Self::ConstructorFailed => "Constructor threw exception",
        }
    }
}

impl fmt::Display for ConstructionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Why a member could not be invoked or accessed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationFailure {
    /// The access policy refused a grant for the member
    Inaccessible,
    /// Argument count or types do not match the member signature
    IllegalArguments,
    /// Receiver is missing or not an instance of the declaring type
    ReceiverMismatch,
    /// No member with the requested name accepts the arguments
    NoSuchMember,
    /// The member has no body (abstract method)
    Abstract,
}

impl fmt::Display for InvocationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Inaccessible => "could not access member",
            Self::IllegalArguments => "illegal arguments",
            Self::ReceiverMismatch => "receiver mismatch",
            Self::NoSuchMember => "member not found",
            Self::Abstract => "member is abstract",
        };
        f.write_str(s)
    }
}

/// Failures raised by the facility
#[derive(Debug, thiserror::Error)]
pub enum ReflectError {
    /// A public operation received an invalid argument
    #[error("{0}")]
    Precondition(String),

    /// Instantiation failed
    #[error("Failed to instantiate [{type_name}]: {kind}")]
    Construction {
        /// Name of the type that could not be instantiated
        type_name: String,
        /// Which sub-case occurred
        kind: ConstructionFailure,
        /// Original failure, when one exists
        #[source]
        cause: Option<anyhow::Error>,
    },

    /// Invocation failed for a reason other than the body's own failure
    #[error("{kind} [{member}]: {message}")]
    Invocation {
        /// `Type.member` of the offending member
        member: String,
        /// Which sub-case occurred
        kind: InvocationFailure,
        /// Detail message
        message: String,
    },

    /// The invoked body failed; this is the body's own error, untouched
    #[error(transparent)]
    Thrown(anyhow::Error),

    /// Anything the facility does not classify (panics included)
    #[error("Unrecoverable failure: {0}")]
    Unrecoverable(String),
}

impl ReflectError {
    pub(crate) fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition(message.into())
    }

    pub(crate) fn construction(
        type_name: impl Into<String>,
        kind: ConstructionFailure,
        cause: Option<anyhow::Error>,
    ) -> Self {
        Self::Construction {
            type_name: type_name.into(),
            kind,
            cause,
        }
    }

    pub(crate) fn invocation(
        member: impl Into<String>,
        kind: InvocationFailure,
        message: impl Into<String>,
    ) -> Self {
        Self::Invocation {
            member: member.into(),
            kind,
            message: message.into(),
        }
    }

    /// Lift a failure returned by an invoked body.
    ///
    /// Errors that are already ours (a nested call failed) come back as
    /// themselves; anything else is passed through as [`ReflectError::Thrown`].
    pub(crate) fn from_body(err: anyhow::Error) -> Self {
        match err.downcast::<ReflectError>() {
            Ok(own) => own,
            Err(other) => Self::Thrown(other),
        }
    }

    /// Whether this is a precondition failure
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::Precondition(_))
    }

    /// Construction sub-case, if this is a construction failure
    pub fn construction_kind(&self) -> Option<ConstructionFailure> {
        match self {
            Self::Construction { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Invocation sub-case, if this is an invocation failure
    pub fn invocation_kind(&self) -> Option<InvocationFailure> {
        match self {
            Self::Invocation { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// The body's own failure, if this error is a pass-through
    pub fn thrown(&self) -> Option<&anyhow::Error> {
        match self {
            Self::Thrown(err) => Some(err),
            _ => None,
        }
    }
}

/// Render a panic payload as text
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("boom {0}")]
    struct Boom(u32);

    #[test]
    fn test_construction_message() {
        let err = ReflectError::construction("acme.Shape", ConstructionFailure::NotInstantiable, None);
        assert_eq!(
            err.to_string(),
            "Failed to instantiate [acme.Shape]: Is it an abstract class?"
        );
        assert_eq!(err.construction_kind(), Some(ConstructionFailure::NotInstantiable));
    }

    #[test]
    fn test_from_body_passes_foreign_errors_through() {
        let err = ReflectError::from_body(anyhow::Error::new(Boom(7)));
        assert_eq!(err.to_string(), "boom 7");
        let inner = err.thrown().unwrap().downcast_ref::<Boom>().unwrap();
        assert_eq!(inner.0, 7);
    }

    #[test]
    fn test_from_body_unwraps_own_errors() {
        let nested = anyhow::Error::new(ReflectError::precondition("bad"));
        let err = ReflectError::from_body(nested);
        assert!(err.is_precondition());
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("oops");
        assert_eq!(panic_message(payload.as_ref()), "oops");
        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");
    }
}
