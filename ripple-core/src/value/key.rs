//! Property keys.

use std::fmt;
use std::sync::Arc;

const LENGTH: &str = "length";
const VALUE: &str = "value";

/// Indices stop one short of the largest array length.
const MAX_INDEX: usize = u32::MAX as usize;

/// A property key on a container.
///
/// Keys are strings. A key is *integer-like* when it is the canonical decimal
/// spelling of a non-negative integer: `"0"` and `"17"` are, `"01"`, `"-1"`
/// and `"1.5"` are not. Arrays address their items through integer-like keys.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key(Arc<str>);

impl Key {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self(name.into())
    }

    /// The virtual `length` key of arrays.
    pub fn length() -> Self {
        Self::new(LENGTH)
    }

    /// The single key a ref or computed is tracked on.
    pub fn value() -> Self {
        Self::new(VALUE)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_length(&self) -> bool {
        &*self.0 == LENGTH
    }

    /// The array index this key names, if it is integer-like.
    pub fn as_index(&self) -> Option<usize> {
        let digits = self.0.as_bytes();
        let canonical = match digits {
            [] => false,
            [b'0'] => true,
            [b'0', ..] => false,
            _ => digits.iter().all(u8::is_ascii_digit),
        };
        if !canonical {
            return None;
        }
        self.0
            .parse::<usize>()
            .ok()
            .filter(|index| *index < MAX_INDEX)
    }

    pub fn is_integer_key(&self) -> bool {
        self.as_index().is_some()
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

impl From<&String> for Key {
    fn from(name: &String) -> Self {
        Self::new(name.as_str())
    }
}

impl From<usize> for Key {
    fn from(index: usize) -> Self {
        Self::new(index.to_string())
    }
}

impl From<&Key> for Key {
    fn from(key: &Key) -> Self {
        key.clone()
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", &*self.0)
    }
}
