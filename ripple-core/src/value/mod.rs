//! Values
//!
//! The dynamic data model the engine tracks. A [`Value`] is either a scalar,
//! a raw [`Container`] (object or array), or a [`Facade`] wrapping one.
//!
//! Containers are plain shared data. They know nothing about tracking; only
//! reads and writes that go through a facade (or a ref) are observed.
//!
//! Equality follows same-value semantics: scalars compare by value with
//! `NaN` equal to itself and `0.0` distinct from `-0.0`, containers and
//! facades compare by identity.

mod container;
mod key;

use std::fmt;
use std::sync::Arc;

use crate::reactive::Facade;

pub use container::Container;
pub use key::Key;

/// A dynamically typed value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Arc<str>),
    /// A raw, untracked container.
    Container(Container),
    /// A container seen through a facade.
    Facade(Facade),
}

impl Value {
    /// Build a value from JSON, turning objects and arrays into fresh containers.
    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s.into()),
            serde_json::Value::Array(items) => {
                Value::Container(Container::from_values(items.into_iter().map(Value::from_json)))
            }
            serde_json::Value::Object(entries) => Value::Container(Container::from_entries(
                entries.into_iter().map(|(k, v)| (k, Value::from_json(v))),
            )),
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// True for anything with addressable keys, raw or wrapped.
    pub fn is_container(&self) -> bool {
        matches!(self, Value::Container(_) | Value::Facade(_))
    }

    pub fn is_array(&self) -> bool {
        match self {
            Value::Container(c) => c.is_array(),
            Value::Facade(f) => f.raw().is_array(),
            _ => false,
        }
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Number(_))
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Value::String(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// The number as an integer, if it has no fractional part.
    pub fn as_i64(&self) -> Option<i64> {
        self.as_f64()
            .filter(|n| n.is_finite() && n.fract() == 0.0)
            .map(|n| n as i64)
    }

    /// The number as a length or index.
    pub fn as_usize(&self) -> Option<usize> {
        self.as_f64()
            .filter(|n| n.is_finite() && n.fract() == 0.0 && *n >= 0.0 && *n <= u32::MAX as f64)
            .map(|n| n as usize)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_ref()),
            _ => None,
        }
    }

    pub fn as_container(&self) -> Option<&Container> {
        match self {
            Value::Container(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_facade(&self) -> Option<&Facade> {
        match self {
            Value::Facade(f) => Some(f),
            _ => None,
        }
    }

    pub fn into_facade(self) -> Option<Facade> {
        match self {
            Value::Facade(f) => Some(f),
            _ => None,
        }
    }

    /// Same-value comparison.
    pub fn same_value(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => {
                (a.is_nan() && b.is_nan()) || (a == b && a.is_sign_negative() == b.is_sign_negative())
            }
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Container(a), Value::Container(b)) => a.ptr_eq(b),
            (Value::Facade(a), Value::Facade(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    pub(crate) fn to_json(&self, path: &mut Vec<crate::graph::TargetId>) -> serde_json::Value {
        match self {
            Value::Undefined | Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.to_string()),
            Value::Container(c) => c.to_json_within(path),
            Value::Facade(f) => f.raw().to_json_within(path),
        }
    }
}

/// Whether a write of `new` over `old` counts as a change.
pub fn has_changed(old: &Value, new: &Value) -> bool {
    !old.same_value(new)
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.same_value(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Container(c) => write!(f, "{c:?}"),
            Value::Facade(facade) => write!(f, "{facade:?}"),
        }
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

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n.into())
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(n.into())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s.into())
    }
}

impl From<Container> for Value {
    fn from(c: Container) -> Self {
        Value::Container(c)
    }
}

impl From<Facade> for Value {
    fn from(f: Facade) -> Self {
        Value::Facade(f)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        Value::from_json(json)
    }
}
