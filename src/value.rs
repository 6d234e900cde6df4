//! Representation of values in Lox.

use std::fmt;
use std::rc::Rc;

use static_assertions::const_assert;

use crate::object::{Object, StringRef};

/// A dynamically typed Lox value.
///
/// (See Crafting Interpreters, ch. 18: "Strings of Values" and ch. 19: "Strings".)
#[derive(Clone)]
pub enum Value {
    Bool(bool),
    Nil,
    Number(f64),
    Object(Object),
}

// A Value shouldn't silently balloon past a couple words; this guards against an accidental
// switch to a boxed representation for every variant.
const_assert!(std::mem::size_of::<Value>() <= 24);

impl Value {
    /// Nil and `false` are falsy; everything else is truthy.
    ///
    /// (See Crafting Interpreters, ch. 23: "Jumping Back and Forth", `isFalsey`.)
    pub fn is_falsy(&self) -> bool {
        matches!(self, Value::Nil | Value::Bool(false))
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&StringRef> {
        match self {
            Value::Object(Object::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Value::Object(Object::String(_)))
    }
}

/// Structural equality per the language's rules: values of different tags are never equal, and
/// object equality (for strings) is handle identity, not byte comparison -- which works out to the
/// same thing, because strings are interned.
///
/// (See Crafting Interpreters, ch. 18: "Strings of Values", `valuesEqual`.)
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Nil, Value::Nil) => true,
        (Value::Number(a), Value::Number(b)) => a == b,
        (Value::Object(a), Value::Object(b)) => a.identity_eq(b),
        _ => false,
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<StringRef> for Value {
    fn from(s: StringRef) -> Self {
        Value::Object(Object::String(s))
    }
}

impl fmt::Display for Value {
    /// Nil -> `nil`; Bool -> `true`/`false`; Number -> shortest round-tripping decimal; String ->
    /// raw bytes (lossily decoded as UTF-8 for terminal output).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::Object(o) => write!(f, "{o}"),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Object(Object::String(s)) => write!(f, "{:?}", Rc::as_ptr(s)),
            other => write!(f, "{other}"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::object::StringObject;

    fn string_value(s: &str) -> Value {
        Value::from(Rc::new(StringObject::new(s.as_bytes().into())))
    }

    #[test]
    fn falsiness() {
        assert!(Value::Nil.is_falsy());
        assert!(Value::Bool(false).is_falsy());
        assert!(!Value::Bool(true).is_falsy());
        assert!(!Value::Number(0.0).is_falsy());
        assert!(!string_value("").is_falsy());
    }

    #[test]
    fn different_tags_never_equal() {
        assert!(!values_equal(&Value::Nil, &Value::Bool(false)));
        assert!(!values_equal(&Value::Number(0.0), &Value::Bool(false)));
    }

    #[test]
    fn numbers_and_bools_compare_by_payload() {
        assert!(values_equal(&Value::Number(1.0), &Value::Number(1.0)));
        assert!(!values_equal(&Value::Number(1.0), &Value::Number(2.0)));
        assert!(values_equal(&Value::Bool(true), &Value::Bool(true)));
    }

    #[test]
    fn distinct_string_objects_with_same_bytes_are_not_equal_without_interning() {
        // object.rs/value.rs alone don't intern -- that's the interner's job. Two independently
        // allocated StringObjects with the same bytes are different Rcs.
        assert!(!values_equal(&string_value("hi"), &string_value("hi")));
    }

    #[test]
    fn same_handle_is_equal_to_itself() {
        let s = string_value("hi");
        assert!(values_equal(&s, &s.clone()));
    }

    #[test]
    fn display_formats_match_spec() {
        assert_eq!("nil", Value::Nil.to_string());
        assert_eq!("true", Value::Bool(true).to_string());
        assert_eq!("false", Value::Bool(false).to_string());
        assert_eq!("1.2", Value::Number(1.2).to_string());
        assert_eq!("3", Value::Number(3.0).to_string());
        assert_eq!("string", string_value("string").to_string());
    }
}
