//! Precondition assertions
//!
//! Guards for public operations. Every violated check raises
//! [`ReflectError::Precondition`] carrying the supplied message or the
//! default one for that check. "Null" is modelled by `Option::None` and
//! [`Value::Null`].

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

use crate::error::{ReflectError, Result};
use crate::value::Value;

const IS_TRUE_DEFAULT: &str = "[Assertion failed] - this expression must be true";
const IS_NULL_DEFAULT: &str = "[Assertion failed] - the object argument must be null";
const NOT_NULL_DEFAULT: &str =
    "[Assertion failed] - this argument is required; it must not be null";
const NO_NULL_ELEMENTS_DEFAULT: &str =
    "[Assertion failed] - this array must not contain any null elements";
const ARRAY_NOT_EMPTY_DEFAULT: &str =
    "[Assertion failed] - this array must not be empty: it must contain at least 1 element";
const COLLECTION_NOT_EMPTY_DEFAULT: &str =
    "[Assertion failed] - this collection must not be empty: it must contain at least 1 element";
const MAP_NOT_EMPTY_DEFAULT: &str =
    "[Assertion failed] - this map must not be empty; it must contain at least one entry";

/// Values that can stand for "null"
pub trait Nullable {
    /// Whether this value is null
    fn is_null(&self) -> bool;
}

impl<T> Nullable for Option<T> {
    fn is_null(&self) -> bool {
        self.is_none()
    }
}

impl Nullable for Value {
    fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl<T: Nullable + ?Sized> Nullable for &T {
    fn is_null(&self) -> bool {
        (**self).is_null()
    }
}

/// Containers checked by [`not_empty`]
pub trait Emptiable {
    /// Message used when no explicit one is supplied
    const DEFAULT_MESSAGE: &'static str;

    /// Whether the container holds no elements
    fn has_no_elements(&self) -> bool;
}

impl<T> Emptiable for [T] {
    const DEFAULT_MESSAGE: &'static str = ARRAY_NOT_EMPTY_DEFAULT;
    fn has_no_elements(&self) -> bool {
        self.is_empty()
    }
}

impl<T, const N: usize> Emptiable for [T; N] {
    const DEFAULT_MESSAGE: &'static str = ARRAY_NOT_EMPTY_DEFAULT;
    fn has_no_elements(&self) -> bool {
        N == 0
    }
}

impl<T> Emptiable for Vec<T> {
    const DEFAULT_MESSAGE: &'static str = COLLECTION_NOT_EMPTY_DEFAULT;
    fn has_no_elements(&self) -> bool {
        self.is_empty()
    }
}

impl<T> Emptiable for VecDeque<T> {
    const DEFAULT_MESSAGE: &'static str = COLLECTION_NOT_EMPTY_DEFAULT;
    fn has_no_elements(&self) -> bool {
        self.is_empty()
    }
}

impl<T, S> Emptiable for HashSet<T, S> {
    const DEFAULT_MESSAGE: &'static str = COLLECTION_NOT_EMPTY_DEFAULT;
    fn has_no_elements(&self) -> bool {
        self.is_empty()
    }
}

impl<T> Emptiable for BTreeSet<T> {
    const DEFAULT_MESSAGE: &'static str = COLLECTION_NOT_EMPTY_DEFAULT;
    fn has_no_elements(&self) -> bool {
        self.is_empty()
    }
}

impl<K, V, S> Emptiable for HashMap<K, V, S> {
    const DEFAULT_MESSAGE: &'static str = MAP_NOT_EMPTY_DEFAULT;
    fn has_no_elements(&self) -> bool {
        self.is_empty()
    }
}

impl<K, V> Emptiable for BTreeMap<K, V> {
    const DEFAULT_MESSAGE: &'static str = MAP_NOT_EMPTY_DEFAULT;
    fn has_no_elements(&self) -> bool {
        self.is_empty()
    }
}

fn fail<T>(message: &str) -> Result<T> {
    Err(ReflectError::precondition(message))
}

/// Require `expression` to hold
pub fn is_true(expression: bool) -> Result<()> {
    is_true_msg(expression, IS_TRUE_DEFAULT)
}

/// Require `expression` to hold, failing with `message`
pub fn is_true_msg(expression: bool, message: &str) -> Result<()> {
    if expression {
        Ok(())
    } else {
        fail(message)
    }
}

/// Require `object` to be null
pub fn is_null<T: Nullable>(object: T) -> Result<()> {
    is_null_msg(object, IS_NULL_DEFAULT)
}

/// Require `object` to be null, failing with `message`
pub fn is_null_msg<T: Nullable>(object: T, message: &str) -> Result<()> {
    if object.is_null() {
        Ok(())
    } else {
        fail(message)
    }
}

/// Require `object` to be present, handing back the inner value
pub fn not_null<T>(object: Option<T>) -> Result<T> {
    not_null_msg(object, NOT_NULL_DEFAULT)
}

/// Require `object` to be present, failing with `message`
pub fn not_null_msg<T>(object: Option<T>, message: &str) -> Result<T> {
    match object {
        Some(value) => Ok(value),
        None => fail(message),
    }
}

/// Require a container to hold at least one element
pub fn not_empty<C: Emptiable + ?Sized>(container: &C) -> Result<()> {
    not_empty_msg(container, C::DEFAULT_MESSAGE)
}

/// Require a container to hold at least one element, failing with `message`
pub fn not_empty_msg<C: Emptiable + ?Sized>(container: &C, message: &str) -> Result<()> {
    if container.has_no_elements() {
        fail(message)
    } else {
        Ok(())
    }
}

/// Require a slice to contain no null elements
pub fn no_null_elements<T: Nullable>(array: &[T]) -> Result<()> {
    no_null_elements_msg(array, NO_NULL_ELEMENTS_DEFAULT)
}

/// Require a slice to contain no null elements, failing with `message`
pub fn no_null_elements_msg<T: Nullable>(array: &[T], message: &str) -> Result<()> {
    if array.iter().any(Nullable::is_null) {
        fail(message)
    } else {
        Ok(())
    }
}
