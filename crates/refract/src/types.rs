//! Type identity and type descriptors
//!
//! A [`TypeId`] is the opaque identity the rest of the crate keys on. The
//! first ids are reserved for built-in types, registered by every
//! [`TypeRegistry`](crate::TypeRegistry) in a fixed order.

use std::fmt;
use std::sync::Arc;

use crate::member::{ConstructorDescriptor, FieldDescriptor, MethodDescriptor};
use crate::value::Value;

/// Identity of a registered type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(u32);

impl TypeId {
    /// Native `boolean`
    pub const BOOL: TypeId = TypeId::native(PrimitiveKind::Boolean);
    /// Native `byte`
    pub const BYTE: TypeId = TypeId::native(PrimitiveKind::Byte);
    /// Native `char`
    pub const CHAR: TypeId = TypeId::native(PrimitiveKind::Char);
    /// Native `short`
    pub const SHORT: TypeId = TypeId::native(PrimitiveKind::Short);
    /// Native `int`
    pub const INT: TypeId = TypeId::native(PrimitiveKind::Int);
    /// Native `float`
    pub const FLOAT: TypeId = TypeId::native(PrimitiveKind::Float);
    /// Native `long`
    pub const LONG: TypeId = TypeId::native(PrimitiveKind::Long);
    /// Native `double`
    pub const DOUBLE: TypeId = TypeId::native(PrimitiveKind::Double);

    /// Boxed `Boolean`
    pub const BOXED_BOOL: TypeId = TypeId::boxed(PrimitiveKind::Boolean);
    /// Boxed `Byte`
    pub const BOXED_BYTE: TypeId = TypeId::boxed(PrimitiveKind::Byte);
    /// Boxed `Character`
    pub const BOXED_CHAR: TypeId = TypeId::boxed(PrimitiveKind::Char);
    /// Boxed `Short`
    pub const BOXED_SHORT: TypeId = TypeId::boxed(PrimitiveKind::Short);
    /// Boxed `Integer`
    pub const BOXED_INT: TypeId = TypeId::boxed(PrimitiveKind::Int);
    /// Boxed `Float`
    pub const BOXED_FLOAT: TypeId = TypeId::boxed(PrimitiveKind::Float);
    /// Boxed `Long`
    pub const BOXED_LONG: TypeId = TypeId::boxed(PrimitiveKind::Long);
    /// Boxed `Double`
    pub const BOXED_DOUBLE: TypeId = TypeId::boxed(PrimitiveKind::Double);

    /// `String`
    pub const STRING: TypeId = TypeId(16);
    /// `List`
    pub const LIST: TypeId = TypeId(17);
    /// `Set`
    pub const SET: TypeId = TypeId(18);
    /// `Map`
    pub const MAP: TypeId = TypeId(19);

    pub(crate) const BUILTIN_COUNT: u32 = 20;

    /// Id of the native form of a primitive
    pub const fn native(kind: PrimitiveKind) -> TypeId {
        TypeId(kind as u32)
    }

    /// Id of the boxed form of a primitive
    pub const fn boxed(kind: PrimitiveKind) -> TypeId {
        TypeId(kind as u32 + PrimitiveKind::COUNT)
    }

    pub(crate) const fn from_index(index: usize) -> TypeId {
        TypeId(index as u32)
    }

    /// Position in the registry table
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Whether this id is one of the pre-registered built-in types
    pub const fn is_builtin(self) -> bool {
        self.0 < Self::BUILTIN_COUNT
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The eight primitive kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    /// boolean
    Boolean = 0,
    /// 8-bit signed
    Byte = 1,
    /// unicode scalar
    Char = 2,
    /// 16-bit signed
    Short = 3,
    /// 32-bit signed
    Int = 4,
    /// 32-bit float
    Float = 5,
    /// 64-bit signed
    Long = 6,
    /// 64-bit float
    Double = 7,
}

impl PrimitiveKind {
    const COUNT: u32 = 8;

    /// All kinds in id order
    pub const ALL: [PrimitiveKind; 8] = [
        PrimitiveKind::Boolean,
        PrimitiveKind::Byte,
        PrimitiveKind::Char,
        PrimitiveKind::Short,
        PrimitiveKind::Int,
        PrimitiveKind::Float,
        PrimitiveKind::Long,
        PrimitiveKind::Double,
    ];

    /// Name of the native form (`int`)
    pub fn native_name(self) -> &'static str {
        match self {
            PrimitiveKind::Boolean => "boolean",
            PrimitiveKind::Byte => "byte",
            PrimitiveKind::Char => "char",
            PrimitiveKind::Short => "short",
            PrimitiveKind::Int => "int",
            PrimitiveKind::Float => "float",
            PrimitiveKind::Long => "long",
            PrimitiveKind::Double => "double",
        }
    }

    /// Name of the boxed form (`Integer`)
    pub fn boxed_name(self) -> &'static str {
        match self {
            PrimitiveKind::Boolean => "Boolean",
            PrimitiveKind::Byte => "Byte",
            PrimitiveKind::Char => "Character",
            PrimitiveKind::Short => "Short",
            PrimitiveKind::Int => "Integer",
            PrimitiveKind::Float => "Float",
            PrimitiveKind::Long => "Long",
            PrimitiveKind::Double => "Double",
        }
    }

    /// Match a native name, ignoring ASCII case
    pub fn from_native_name(name: &str) -> Option<PrimitiveKind> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.native_name().eq_ignore_ascii_case(name))
    }

    /// Zero value stored in fields of the native type
    pub fn zero_value(self) -> Value {
        match self {
            PrimitiveKind::Boolean => Value::Bool(false),
            PrimitiveKind::Byte => Value::Byte(0),
            PrimitiveKind::Char => Value::Char('\0'),
            PrimitiveKind::Short => Value::Short(0),
            PrimitiveKind::Int => Value::Int(0),
            PrimitiveKind::Float => Value::Float(0.0),
            PrimitiveKind::Long => Value::Long(0),
            PrimitiveKind::Double => Value::Double(0.0),
        }
    }
}

/// Built-in container families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionKind {
    /// Ordered, duplicates allowed
    List,
    /// No duplicates
    Set,
    /// Key to value
    Map,
}

/// Structural kind of a type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    /// Native primitive
    Primitive(PrimitiveKind),
    /// Boxed primitive
    Boxed(PrimitiveKind),
    /// Text string
    String,
    /// List, set or map
    Collection(CollectionKind),
    /// Array of `element`
    Array {
        /// Element type
        element: TypeId,
    },
    /// Enumeration with named variants
    Enum,
    /// User class
    Class,
}

/// Declared visibility of a type or member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Visibility {
    /// Visible everywhere
    #[default]
    Public,
    /// Visible to subtypes
    Protected,
    /// Visible inside the declaring namespace
    Package,
    /// Visible only to the declaring type
    Private,
}

impl Visibility {
    /// Whether this is [`Visibility::Public`]
    pub fn is_public(self) -> bool {
        self == Visibility::Public
    }
}

/// Everything the registry knows about one type
#[derive(Debug)]
pub struct TypeDescriptor {
    pub(crate) id: TypeId,
    pub(crate) generation: u64,
    pub(crate) name: String,
    pub(crate) kind: TypeKind,
    pub(crate) parent: Option<TypeId>,
    pub(crate) visibility: Visibility,
    pub(crate) is_abstract: bool,
    pub(crate) markers: Vec<String>,
    pub(crate) fields: Vec<Arc<FieldDescriptor>>,
    pub(crate) methods: Vec<Arc<MethodDescriptor>>,
    pub(crate) constructors: Vec<Arc<ConstructorDescriptor>>,
    pub(crate) variants: Vec<String>,
    /// Instance slot names, ancestor-first
    pub(crate) layout: Arc<[String]>,
    /// Initial slot values, parallel to `layout`
    pub(crate) slot_defaults: Vec<Value>,
}

impl TypeDescriptor {
    /// Type identity
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Registration generation; changes when the type is redefined
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Registered name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Structural kind
    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    /// Direct ancestor
    pub fn parent(&self) -> Option<TypeId> {
        self.parent
    }

    /// Declared visibility
    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    /// Abstract types cannot be instantiated
    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    /// Only concrete classes can be instantiated
    pub fn is_instantiable(&self) -> bool {
        self.kind == TypeKind::Class && !self.is_abstract
    }

    /// Markers (annotation names) on the type itself
    pub fn markers(&self) -> &[String] {
        &self.markers
    }

    /// Fields declared by this exact type, in declaration order
    pub fn declared_fields(&self) -> &[Arc<FieldDescriptor>] {
        &self.fields
    }

    /// Methods declared by this exact type, in declaration order
    pub fn declared_methods(&self) -> &[Arc<MethodDescriptor>] {
        &self.methods
    }

    /// Constructors declared by this type (an implicit one if none were)
    pub fn constructors(&self) -> &[Arc<ConstructorDescriptor>] {
        &self.constructors
    }

    /// Enum variant names
    pub fn variants(&self) -> &[String] {
        &self.variants
    }

    /// Number of instance slots, inherited ones included
    pub fn instance_slot_count(&self) -> usize {
        self.layout.len()
    }

    /// Instance slot names, ancestor-first
    pub fn layout(&self) -> &Arc<[String]> {
        &self.layout
    }
}
