//! Dynamic values and object instances
//!
//! Objects are shared handles: cloning an [`ObjectRef`] clones the handle,
//! not the instance. Slots are laid out ancestor-first, so a field shadowed
//! by a subtype occupies two slots.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::types::TypeId;

/// A dynamically typed value
#[derive(Clone)]
pub enum Value {
    /// Absence of a value
    Null,
    /// boolean
    Bool(bool),
    /// byte
    Byte(i8),
    /// char
    Char(char),
    /// short
    Short(i16),
    /// int
    Int(i32),
    /// long
    Long(i64),
    /// float
    Float(f32),
    /// double
    Double(f64),
    /// Text string
    Str(Arc<str>),
    /// Enum variant
    Enum {
        /// Enum type
        type_id: TypeId,
        /// Variant name
        variant: Arc<str>,
    },
    /// Typed array
    Array {
        /// Element type
        element: TypeId,
        /// Elements
        items: Vec<Value>,
    },
    /// List container
    List(Vec<Value>),
    /// Set container; insertion order, no duplicates
    Set(Vec<Value>),
    /// Map container; insertion order, unique keys
    Map(Vec<(Value, Value)>),
    /// Class instance
    Object(ObjectRef),
}

impl Value {
    /// Create a string value
    pub fn string(s: impl AsRef<str>) -> Self {
        Value::Str(Arc::from(s.as_ref()))
    }

    /// Create an enum value
    pub fn variant(type_id: TypeId, variant: &str) -> Self {
        Value::Enum {
            type_id,
            variant: Arc::from(variant),
        }
    }

    /// Create an array value
    pub fn array(element: TypeId, items: Vec<Value>) -> Self {
        Value::Array { element, items }
    }

    /// Check for null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get as bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get as i32
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Get as i64
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Long(v) => Some(*v),
            _ => None,
        }
    }

    /// Get as f64
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// Get as string slice
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(&**s),
            _ => None,
        }
    }

    /// Get as object handle
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Look up `key` in a map value
    pub fn map_get(&self, key: &Value) -> Option<&Value> {
        match self {
            Value::Map(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Insert or replace `key` in a map value; returns false for non-maps
    pub fn map_insert(&mut self, key: Value, value: Value) -> bool {
        let Value::Map(entries) = self else {
            return false;
        };
        match entries.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => entries.push((key, value)),
        }
        true
    }

    /// Add to a set value, ignoring duplicates; returns false for non-sets
    pub fn set_insert(&mut self, value: Value) -> bool {
        let Value::Set(items) = self else {
            return false;
        };
        if !items.contains(&value) {
            items.push(value);
        }
        true
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        use Value::*;
        match (self, other) {
            (Null, Null) => true,
            (Bool(a), Bool(b)) => a == b,
            (Byte(a), Byte(b)) => a == b,
            (Char(a), Char(b)) => a == b,
            (Short(a), Short(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            (Long(a), Long(b)) => a == b,
            (Float(a), Float(b)) => a == b,
            (Double(a), Double(b)) => a == b,
            (Str(a), Str(b)) => a == b,
            (
                Enum { type_id: ta, variant: va },
                Enum { type_id: tb, variant: vb },
            ) => ta == tb && va == vb,
            (
                Array { element: ea, items: ia },
                Array { element: eb, items: ib },
            ) => ea == eb && ia == ib,
            (List(a), List(b)) => a == b,
            (Set(a), Set(b)) => a.len() == b.len() && a.iter().all(|v| b.contains(v)),
            (Map(a), Map(b)) => {
                a.len() == b.len()
                    && a.iter().all(|(k, v)| b.iter().any(|(bk, bv)| bk == k && bv == v))
            }
            (Object(a), Object(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Byte(v) => write!(f, "{v}b"),
            Value::Char(v) => write!(f, "{v:?}"),
            Value::Short(v) => write!(f, "{v}s"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Long(v) => write!(f, "{v}L"),
            Value::Float(v) => write!(f, "{v}f"),
            Value::Double(v) => write!(f, "{v}d"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Enum { variant, .. } => write!(f, "{variant}"),
            Value::Array { items, .. } => f.debug_list().entries(items).finish(),
            Value::List(items) => f.debug_list().entries(items).finish(),
            Value::Set(items) => f.debug_set().entries(items).finish(),
            Value::Map(entries) => f
                .debug_map()
                .entries(entries.iter().map(|(k, v)| (k, v)))
                .finish(),
            Value::Object(obj) => write!(f, "{obj:?}"),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i8> for Value {
    fn from(v: i8) -> Self {
        Value::Byte(v)
    }
}

impl From<char> for Value {
    fn from(v: char) -> Self {
        Value::Char(v)
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Value::Short(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::string(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(Arc::from(v))
    }
}

impl From<ObjectRef> for Value {
    fn from(v: ObjectRef) -> Self {
        Value::Object(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// A class instance
pub struct Object {
    type_id: TypeId,
    generation: u64,
    layout: Arc<[String]>,
    slots: RwLock<Vec<Value>>,
}

impl Object {
    pub(crate) fn new(
        type_id: TypeId,
        generation: u64,
        layout: Arc<[String]>,
        slots: Vec<Value>,
    ) -> Self {
        debug_assert_eq!(layout.len(), slots.len());
        Self {
            type_id,
            generation,
            layout,
            slots: RwLock::new(slots),
        }
    }
}

/// Shared handle to an [`Object`]
#[derive(Clone)]
pub struct ObjectRef(Arc<Object>);

impl ObjectRef {
    pub(crate) fn new(object: Object) -> Self {
        Self(Arc::new(object))
    }

    /// Runtime type of the instance
    pub fn type_id(&self) -> TypeId {
        self.0.type_id
    }

    /// Generation of the type definition the instance was built from
    pub fn generation(&self) -> u64 {
        self.0.generation
    }

    /// Field name stored at `slot`
    pub fn slot_name(&self, slot: usize) -> Option<&str> {
        self.0.layout.get(slot).map(String::as_str)
    }

    /// Number of slots
    pub fn slot_count(&self) -> usize {
        self.0.layout.len()
    }

    /// Read a slot
    pub fn get(&self, slot: usize) -> Option<Value> {
        self.0.slots.read().get(slot).cloned()
    }

    /// Write a slot; returns false when out of range
    pub fn set(&self, slot: usize, value: Value) -> bool {
        match self.0.slots.write().get_mut(slot) {
            Some(cell) => {
                *cell = value;
                true
            }
            None => false,
        }
    }

    /// Slot of the most-derived field named `name`
    pub fn slot_of(&self, name: &str) -> Option<usize> {
        self.0.layout.iter().rposition(|n| n == name)
    }

    /// Read the most-derived field named `name`
    pub fn field(&self, name: &str) -> Option<Value> {
        self.slot_of(name).and_then(|slot| self.get(slot))
    }

    /// Write the most-derived field named `name`
    pub fn set_field(&self, name: &str, value: Value) -> bool {
        match self.slot_of(name) {
            Some(slot) => self.set(slot, value),
            None => false,
        }
    }

    /// Mutate a slot in place
    pub fn update<R>(&self, slot: usize, f: impl FnOnce(&mut Value) -> R) -> Option<R> {
        self.0.slots.write().get_mut(slot).map(f)
    }

    /// Whether two handles point at the same instance
    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slots = self.0.slots.read();
        let mut s = f.debug_struct("Object");
        s.field("type", &self.0.type_id);
        for (name, value) in self.0.layout.iter().zip(slots.iter()) {
            s.field(name, value);
        }
        s.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(names: &[&str]) -> Arc<[String]> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_object_slots_prefer_most_derived() {
        let obj = ObjectRef::new(Object::new(
            TypeId::from_index(30),
            0,
            layout(&["x", "y", "x"]),
            vec![Value::Int(0), Value::Int(0), Value::Int(0)],
        ));

        assert_eq!(obj.slot_of("x"), Some(2));
        assert!(obj.set_field("x", Value::Int(5)));
        assert_eq!(obj.get(0), Some(Value::Int(0)));
        assert_eq!(obj.field("x"), Some(Value::Int(5)));
        assert!(!obj.set(9, Value::Null));
        assert_eq!(obj.slot_name(1), Some("y"));
        assert_eq!(obj.slot_name(3), None);
    }

    #[test]
    fn test_object_equality_is_identity() {
        let a = ObjectRef::new(Object::new(TypeId::from_index(30), 0, layout(&[]), vec![]));
        let b = ObjectRef::new(Object::new(TypeId::from_index(30), 0, layout(&[]), vec![]));
        assert_eq!(Value::Object(a.clone()), Value::Object(a.clone()));
        assert_ne!(Value::Object(a), Value::Object(b));
    }

    #[test]
    fn test_map_and_set_helpers() {
        let mut map = Value::Map(Vec::new());
        assert!(map.map_insert(Value::from("key"), Value::from("value")));
        assert!(map.map_insert(Value::from("key"), Value::Null));
        assert_eq!(map.map_get(&Value::from("key")), Some(&Value::Null));

        let mut set = Value::Set(Vec::new());
        set.set_insert(Value::Int(1));
        set.set_insert(Value::Int(1));
        assert_eq!(set, Value::Set(vec![Value::Int(1)]));
        assert!(!Value::Null.clone().set_insert(Value::Int(1)));
    }

    #[test]
    fn test_conversions() {
        assert_eq!(Value::from(3), Value::Int(3));
        assert_eq!(Value::from("a").as_str(), Some("a"));
        assert_eq!(Value::from(None::<i32>), Value::Null);
        assert_eq!(Value::from(7i64).as_i64(), Some(7));
    }
}
