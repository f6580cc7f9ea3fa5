//! Accessibility normalization and reflection permissions
//!
//! Every field read, field write, method call and constructor call needs an
//! [`AccessGrant`] for the exact member. The [`AccessNormalizer`] issues it:
//! public members of public types receive a plain grant, anything else a
//! relaxed one. Grants borrow the member, are never stored, and are released
//! when dropped at the end of the call.
//!
//! Whether a grant may be issued at all is decided by a [`PermissionStore`]:
//! a global default, exact per-type overrides, and wildcard rules over type
//! names. The default allows everything.
//!
//! ## Wildcard rules
//!
//! | Pattern       | Matches                                   |
//! |---------------|-------------------------------------------|
//! | `*`, `**`     | every type                                |
//! | `plugins.*`   | `plugins.Foo`, `plugins.a.Bar`            |
//! | `plugins.**`  | the above and `plugins` itself            |
//! | `acme.Secret` | exactly that type                         |

use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::{ReflectError, Result};
use crate::member::{Member, MemberKey};

/// Reflection permission flags (bitflags)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReflectionPermission(u8);

impl ReflectionPermission {
    /// No reflection allowed
    pub const NONE: Self = Self(0x00);
    /// Read public fields
    pub const READ_PUBLIC: Self = Self(0x01);
    /// Read non-public fields
    pub const READ_PRIVATE: Self = Self(0x02);
    /// Write public fields
    pub const WRITE_PUBLIC: Self = Self(0x04);
    /// Write non-public fields
    pub const WRITE_PRIVATE: Self = Self(0x08);
    /// Invoke public methods
    pub const INVOKE_PUBLIC: Self = Self(0x10);
    /// Invoke non-public methods
    pub const INVOKE_PRIVATE: Self = Self(0x20);
    /// Call public constructors
    pub const CONSTRUCT_PUBLIC: Self = Self(0x40);
    /// Call non-public constructors
    pub const CONSTRUCT_PRIVATE: Self = Self(0x80);

    /// READ_PUBLIC | READ_PRIVATE
    pub const READ_ALL: Self = Self(0x03);
    /// WRITE_PUBLIC | WRITE_PRIVATE
    pub const WRITE_ALL: Self = Self(0x0C);
    /// INVOKE_PUBLIC | INVOKE_PRIVATE
    pub const INVOKE_ALL: Self = Self(0x30);
    /// CONSTRUCT_PUBLIC | CONSTRUCT_PRIVATE
    pub const CONSTRUCT_ALL: Self = Self(0xC0);
    /// Every public flag
    pub const PUBLIC_ONLY: Self = Self(0x55);
    /// Read, write and invoke, public or not; no construction
    pub const FULL_ACCESS: Self = Self(0x3F);
    /// Everything
    pub const ALL: Self = Self(0xFF);

    const NAMED: [(&'static str, Self); 16] = [
        ("NONE", Self::NONE),
        ("READ_PUBLIC", Self::READ_PUBLIC),
        ("READ_PRIVATE", Self::READ_PRIVATE),
        ("WRITE_PUBLIC", Self::WRITE_PUBLIC),
        ("WRITE_PRIVATE", Self::WRITE_PRIVATE),
        ("INVOKE_PUBLIC", Self::INVOKE_PUBLIC),
        ("INVOKE_PRIVATE", Self::INVOKE_PRIVATE),
        ("CONSTRUCT_PUBLIC", Self::CONSTRUCT_PUBLIC),
        ("CONSTRUCT_PRIVATE", Self::CONSTRUCT_PRIVATE),
        ("READ_ALL", Self::READ_ALL),
        ("WRITE_ALL", Self::WRITE_ALL),
        ("INVOKE_ALL", Self::INVOKE_ALL),
        ("CONSTRUCT_ALL", Self::CONSTRUCT_ALL),
        ("PUBLIC_ONLY", Self::PUBLIC_ONLY),
        ("FULL_ACCESS", Self::FULL_ACCESS),
        ("ALL", Self::ALL),
    ];

    /// Create from raw bits
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    /// Get raw bits
    pub const fn bits(&self) -> u8 {
        self.0
    }

    /// Check if permission contains a flag
    pub const fn contains(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    /// Union of permissions
    pub const fn union(&self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Parse a single flag name (any case), `0x`-hex, or decimal
    pub fn from_name(s: &str) -> Option<Self> {
        let upper = s.to_ascii_uppercase();
        if let Some((_, perm)) = Self::NAMED.iter().find(|(name, _)| *name == upper) {
            return Some(*perm);
        }
        match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some(hex) => u8::from_str_radix(hex, 16).ok().map(Self::from_bits),
            None => s.parse::<u8>().ok().map(Self::from_bits),
        }
    }

    /// Parse pipe-separated flags, e.g. `READ_PUBLIC|INVOKE_PUBLIC`
    pub fn from_combined_str(s: &str) -> Option<Self> {
        s.split('|').try_fold(Self::NONE, |acc, part| {
            Self::from_name(part.trim()).map(|perm| acc.union(perm))
        })
    }
}

impl Default for ReflectionPermission {
    fn default() -> Self {
        Self::ALL
    }
}

impl fmt::Display for ReflectionPermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match Self::NAMED.iter().find(|(_, perm)| perm == self) {
            Some((name, _)) => f.write_str(name),
            None => write!(f, "0x{:02X}", self.0),
        }
    }
}

/// Wildcard rule over type names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypePermissionRule {
    /// Pattern (e.g. `plugins.*`, `**`)
    pub pattern: String,
    /// Permissions for matching types
    pub permissions: ReflectionPermission,
}

impl TypePermissionRule {
    /// Create a rule
    pub fn new(pattern: impl Into<String>, permissions: ReflectionPermission) -> Self {
        Self {
            pattern: pattern.into(),
            permissions,
        }
    }

    /// Check if a type name matches this pattern
    pub fn matches(&self, type_name: &str) -> bool {
        if self.pattern == "**" || self.pattern == "*" {
            return true;
        }

        if let Some(prefix) = self.pattern.strip_suffix(".**") {
            type_name == prefix
                || type_name
                    .strip_prefix(prefix)
                    .is_some_and(|rest| rest.starts_with('.'))
        } else if let Some(prefix) = self.pattern.strip_suffix(".*") {
            type_name
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.len() > 1 && rest.starts_with('.'))
        } else {
            self.pattern == type_name
        }
    }
}

/// Store for reflection permissions
#[derive(Debug, Clone)]
pub struct PermissionStore {
    /// Global default permissions
    global_default: ReflectionPermission,
    /// Exact type-name overrides
    type_permissions: FxHashMap<String, ReflectionPermission>,
    /// Wildcard rules, first match wins
    type_rules: Vec<TypePermissionRule>,
    /// Types whose override may no longer change
    sealed_types: FxHashSet<String>,
}

impl Default for PermissionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PermissionStore {
    /// Create a new permission store with default (ALL) permissions
    pub fn new() -> Self {
        Self {
            global_default: ReflectionPermission::ALL,
            type_permissions: FxHashMap::default(),
            type_rules: Vec::new(),
            sealed_types: FxHashSet::default(),
        }
    }

    /// Check if any permissions are configured (for fast-path optimization)
    pub fn has_any_restrictions(&self) -> bool {
        self.global_default != ReflectionPermission::ALL
            || !self.type_permissions.is_empty()
            || !self.type_rules.is_empty()
    }

    // ===== Global Permissions =====

    /// Set global default permissions
    pub fn set_global(&mut self, permissions: ReflectionPermission) {
        self.global_default = permissions;
    }

    /// Get global default permissions
    pub fn global(&self) -> ReflectionPermission {
        self.global_default
    }

    // ===== Type Permissions =====

    /// Set permissions for one type name
    pub fn set_type(&mut self, type_name: &str, permissions: ReflectionPermission) -> Result<()> {
        self.ensure_unsealed(type_name)?;
        self.type_permissions
            .insert(type_name.to_string(), permissions);
        Ok(())
    }

    /// Exact override for a type (not resolved)
    pub fn get_type(&self, type_name: &str) -> Option<ReflectionPermission> {
        self.type_permissions.get(type_name).copied()
    }

    /// Clear the override for a type
    pub fn clear_type(&mut self, type_name: &str) -> Result<()> {
        self.ensure_unsealed(type_name)?;
        self.type_permissions.remove(type_name);
        Ok(())
    }

    /// Seal type permissions
    pub fn seal_type(&mut self, type_name: &str) {
        self.sealed_types.insert(type_name.to_string());
    }

    /// Check if type permissions are sealed
    pub fn is_type_sealed(&self, type_name: &str) -> bool {
        self.sealed_types.contains(type_name)
    }

    fn ensure_unsealed(&self, type_name: &str) -> Result<()> {
        if self.is_type_sealed(type_name) {
            return Err(ReflectError::precondition(format!(
                "Cannot modify sealed permissions of '{type_name}'"
            )));
        }
        Ok(())
    }

    /// Add a wildcard rule
    pub fn add_type_rule(&mut self, rule: TypePermissionRule) {
        self.type_rules.push(rule);
    }

    /// Clear all wildcard rules
    pub fn clear_type_rules(&mut self) {
        self.type_rules.clear();
    }

    // ===== Permission Resolution =====

    /// Resolve permissions for a type: exact override, then the first
    /// matching rule, then the global default
    pub fn resolve(&self, type_name: &str) -> ReflectionPermission {
        if let Some(perms) = self.get_type(type_name) {
            return perms;
        }
        self.type_rules
            .iter()
            .find(|rule| rule.matches(type_name))
            .map_or(self.global_default, |rule| rule.permissions)
    }

    /// Check if a specific permission is allowed
    pub fn check_permission(&self, type_name: &str, required: ReflectionPermission) -> bool {
        self.resolve(type_name).contains(required)
    }
}

/// What a grant is used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessOperation {
    /// Field read
    Read,
    /// Field write
    Write,
    /// Method call
    Invoke,
    /// Constructor call
    Construct,
}

impl AccessOperation {
    /// Flag needed for this operation on a public or non-public member
    pub fn required(self, relaxed: bool) -> ReflectionPermission {
        match (self, relaxed) {
            (Self::Read, false) => ReflectionPermission::READ_PUBLIC,
            (Self::Read, true) => ReflectionPermission::READ_PRIVATE,
            (Self::Write, false) => ReflectionPermission::WRITE_PUBLIC,
            (Self::Write, true) => ReflectionPermission::WRITE_PRIVATE,
            (Self::Invoke, false) => ReflectionPermission::INVOKE_PUBLIC,
            (Self::Invoke, true) => ReflectionPermission::INVOKE_PRIVATE,
            (Self::Construct, false) => ReflectionPermission::CONSTRUCT_PUBLIC,
            (Self::Construct, true) => ReflectionPermission::CONSTRUCT_PRIVATE,
        }
    }
}

impl fmt::Display for AccessOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Invoke => "invoke",
            Self::Construct => "construct",
        })
    }
}

/// Permission store refused a grant
#[derive(Debug, Clone, thiserror::Error)]
#[error("Permission denied: cannot {operation} {member} (requires {required})")]
pub struct AccessDenied {
    /// `Type.member`
    pub member: String,
    /// Requested operation
    pub operation: AccessOperation,
    /// Missing flag
    pub required: ReflectionPermission,
}

/// Scoped capability to touch one member.
///
/// Borrowed from the member it was issued for; dropping it ends the access.
#[derive(Debug)]
pub struct AccessGrant<'m> {
    key: MemberKey,
    operation: AccessOperation,
    relaxed: bool,
    active: Arc<AtomicUsize>,
    _member: PhantomData<&'m ()>,
}

impl AccessGrant<'_> {
    /// Whether this grant was issued for `key` and `operation`
    pub fn covers(&self, key: MemberKey, operation: AccessOperation) -> bool {
        self.key == key && self.operation == operation
    }

    /// Whether the member is non-public and access was relaxed for this call
    pub fn is_relaxed(&self) -> bool {
        self.relaxed
    }

    /// Operation the grant was issued for
    pub fn operation(&self) -> AccessOperation {
        self.operation
    }
}

impl Drop for AccessGrant<'_> {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Issues [`AccessGrant`]s against a [`PermissionStore`]
#[derive(Debug)]
pub struct AccessNormalizer {
    store: RwLock<PermissionStore>,
    active: Arc<AtomicUsize>,
}

impl Default for AccessNormalizer {
    fn default() -> Self {
        Self::new(PermissionStore::new())
    }
}

impl AccessNormalizer {
    /// Create a normalizer over `store`
    pub fn new(store: PermissionStore) -> Self {
        Self {
            store: RwLock::new(store),
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Grant access to `member` for `operation`.
    ///
    /// Public members of public types pass through unchanged; anything else
    /// is relaxed for the lifetime of the returned grant, provided the
    /// permission store allows it.
    pub fn normalize<'m>(
        &self,
        member: &'m dyn Member,
        operation: AccessOperation,
    ) -> std::result::Result<AccessGrant<'m>, AccessDenied> {
        let relaxed = !(member.visibility().is_public() && member.declaring_type_public());
        let required = operation.required(relaxed);
        if !self
            .store
            .read()
            .check_permission(member.declaring_name(), required)
        {
            return Err(AccessDenied {
                member: member.qualified_name(),
                operation,
                required,
            });
        }
        self.active.fetch_add(1, Ordering::AcqRel);
        Ok(AccessGrant {
            key: member.key(),
            operation,
            relaxed,
            active: self.active.clone(),
            _member: PhantomData,
        })
    }

    /// Number of grants not yet dropped
    pub fn active_grants(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Copy of the current permission store
    pub fn permissions(&self) -> PermissionStore {
        self.store.read().clone()
    }

    /// Mutate the permission store in place
    pub fn update_permissions<R>(&self, f: impl FnOnce(&mut PermissionStore) -> R) -> R {
        f(&mut self.store.write())
    }
}
