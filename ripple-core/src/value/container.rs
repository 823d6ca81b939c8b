//! Raw containers.
//!
//! A container is shared, lockable storage for an object or an array. Cloning
//! a [`Container`] clones the handle, not the data. All access here is
//! untracked; facades layer tracking on top.

use std::fmt;
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::RwLock;

use super::{has_changed, Key, Value};
use crate::config::DEFAULT_MAX_ARRAY_LENGTH;
use crate::error::{ReactiveError, ReactiveResult};
use crate::graph::{Target, TargetId, TriggerKind};

/// Storage behind a container.
enum Data {
    Object(IndexMap<Key, Value>),
    Array {
        items: Vec<Value>,
        /// Non-index properties set on the array.
        props: IndexMap<Key, Value>,
    },
}

pub(crate) struct ContainerInner {
    id: TargetId,
    array: bool,
    data: RwLock<Data>,
}

/// The result of a raw write: how it was classified and what it replaced.
#[derive(Debug, Clone)]
pub(crate) struct Assignment {
    pub(crate) kind: TriggerKind,
    pub(crate) old: Value,
    pub(crate) changed: bool,
}

impl Assignment {
    fn new(kind: TriggerKind, old: Value, new: &Value) -> Self {
        let changed = kind == TriggerKind::Add || has_changed(&old, new);
        Self { kind, old, changed }
    }
}

/// A shared handle to an object or array.
#[derive(Clone)]
pub struct Container {
    inner: Arc<ContainerInner>,
}

impl Container {
    fn with_data(data: Data) -> Self {
        Self {
            inner: Arc::new(ContainerInner {
                id: TargetId::next(),
                array: matches!(data, Data::Array { .. }),
                data: RwLock::new(data),
            }),
        }
    }

    /// An empty object.
    pub fn object() -> Self {
        Self::with_data(Data::Object(IndexMap::new()))
    }

    /// An empty array.
    pub fn array() -> Self {
        Self::with_data(Data::Array {
            items: Vec::new(),
            props: IndexMap::new(),
        })
    }

    pub fn from_entries<K, V, I>(entries: I) -> Self
    where
        K: Into<Key>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self::with_data(Data::Object(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        ))
    }

    pub fn from_values<V, I>(values: I) -> Self
    where
        V: Into<Value>,
        I: IntoIterator<Item = V>,
    {
        Self::with_data(Data::Array {
            items: values.into_iter().map(Into::into).collect(),
            props: IndexMap::new(),
        })
    }

    pub fn id(&self) -> TargetId {
        self.inner.id
    }

    pub fn is_array(&self) -> bool {
        self.inner.array
    }

    /// Array length, or number of keys for an object.
    pub fn len(&self) -> usize {
        match &*self.inner.data.read() {
            Data::Object(map) => map.len(),
            Data::Array { items, .. } => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Enumerable keys: indices first for arrays, then named properties.
    pub fn keys(&self) -> Vec<Key> {
        match &*self.inner.data.read() {
            Data::Object(map) => map.keys().cloned().collect(),
            Data::Array { items, props } => (0..items.len())
                .map(Key::from)
                .chain(props.keys().cloned())
                .collect(),
        }
    }

    pub fn has(&self, key: impl Into<Key>) -> bool {
        let key = key.into();
        match &*self.inner.data.read() {
            Data::Object(map) => map.contains_key(&key),
            Data::Array { items, props } => match key.as_index() {
                Some(index) => index < items.len(),
                None => key.is_length() || props.contains_key(&key),
            },
        }
    }

    /// Read a key without tracking. Missing keys read as `Undefined`.
    pub fn get(&self, key: impl Into<Key>) -> Value {
        let key = key.into();
        match &*self.inner.data.read() {
            Data::Object(map) => map.get(&key).cloned().unwrap_or_default(),
            Data::Array { items, props } => {
                if let Some(index) = key.as_index() {
                    items.get(index).cloned().unwrap_or_default()
                } else if key.is_length() {
                    Value::from(items.len())
                } else {
                    props.get(&key).cloned().unwrap_or_default()
                }
            }
        }
    }

    /// Write a key without propagating, returning how the write was classified.
    ///
    /// Writing an index at or past the end of an array pads it with
    /// `Undefined`; writing `length` truncates or pads. Neither may take the
    /// array past `max_length` elements.
    pub(crate) fn assign(&self, key: &Key, value: Value, max_length: usize) -> ReactiveResult<Assignment> {
        let mut data = self.inner.data.write();
        match &mut *data {
            Data::Object(map) => Ok(assign_entry(map, key, value)),
            Data::Array { items, props } => {
                if let Some(index) = key.as_index() {
                    let kind = if index < items.len() {
                        TriggerKind::Edit
                    } else {
                        TriggerKind::Add
                    };
                    if index >= items.len() {
                        check_length(index + 1, max_length)?;
                        items.resize(index + 1, Value::Undefined);
                    }
                    let old = std::mem::replace(&mut items[index], value.clone());
                    Ok(Assignment::new(kind, old, &value))
                } else if key.is_length() {
                    let length = value.as_usize().ok_or_else(|| ReactiveError::InvalidLength {
                        value: format!("{value:?}"),
                    })?;
                    if length > items.len() {
                        check_length(length, max_length)?;
                    }
                    let old = Value::from(items.len());
                    items.resize(length, Value::Undefined);
                    Ok(Assignment::new(TriggerKind::Edit, old, &value))
                } else {
                    Ok(assign_entry(props, key, value))
                }
            }
        }
    }

    /// Write a key without tracking or propagation.
    ///
    /// Returns whether the key was added or an existing value replaced.
    /// Arrays grow at most to [`DEFAULT_MAX_ARRAY_LENGTH`] elements here.
    pub fn set(&self, key: impl Into<Key>, value: impl Into<Value>) -> ReactiveResult<TriggerKind> {
        self.assign(&key.into(), value.into(), DEFAULT_MAX_ARRAY_LENGTH)
            .map(|assignment| assignment.kind)
    }

    pub fn ptr_eq(&self, other: &Container) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn target(&self) -> Target {
        let anchor: Weak<ContainerInner> = Arc::downgrade(&self.inner);
        Target::new(self.id(), self.is_array(), anchor)
    }

    /// Render the container as JSON, cutting cycles.
    pub(crate) fn to_json(&self) -> serde_json::Value {
        self.to_json_within(&mut Vec::new())
    }

    pub(crate) fn to_json_within(&self, path: &mut Vec<TargetId>) -> serde_json::Value {
        if path.contains(&self.id()) {
            return serde_json::Value::String("[Circular]".to_string());
        }
        path.push(self.id());
        let json = match &*self.inner.data.read() {
            Data::Object(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(k, v)| (k.to_string(), v.to_json(path)))
                    .collect(),
            ),
            Data::Array { items, .. } => {
                serde_json::Value::Array(items.iter().map(|v| v.to_json(path)).collect())
            }
        };
        path.pop();
        json
    }
}

fn check_length(length: usize, limit: usize) -> ReactiveResult<()> {
    if length > limit {
        return Err(ReactiveError::ArrayTooLong { length, limit });
    }
    Ok(())
}

fn assign_entry(map: &mut IndexMap<Key, Value>, key: &Key, value: Value) -> Assignment {
    match map.get_mut(key) {
        Some(slot) => {
            let old = std::mem::replace(slot, value.clone());
            Assignment::new(TriggerKind::Edit, old, &value)
        }
        None => {
            map.insert(key.clone(), value.clone());
            Assignment::new(TriggerKind::Add, Value::Undefined, &value)
        }
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_array() { "Array" } else { "Object" };
        write!(f, "{kind}{}({})", self.id(), self.to_json())
    }
}
