//! Refs
//!
//! A [`Ref`] is a boxed single value. It is its own dependency target, with a
//! single tracked key, `value`.
//!
//! # How Refs Work
//!
//! 1. Reading a ref inside an effect subscribes the effect to the ref.
//!
//! 2. Writing a ref compares the new value against the last value written
//!    (before any conversion) and notifies subscribers only if it differs.
//!
//! 3. A deep ref stores containers behind writable facades, so nested writes
//!    are observed too. A shallow ref stores what it is given.
//!
//! A [`PropertyRef`] is different: it has no state of its own and simply
//! forwards to one key of a facade or container. It is as reactive as its
//! source.

use std::fmt;
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::Mutex;
use tracing::trace;

use super::facade::{Facade, FacadeFlags, WriteOutcome};
use super::runtime::RuntimeState;
use crate::config::DEFAULT_MAX_ARRAY_LENGTH;
use crate::error::ReactiveResult;
use crate::graph::{Target, TargetId, TriggerKind};
use crate::value::{has_changed, Container, Key, Value};

struct Slot {
    /// The value as last written.
    raw: Value,
    /// What reads return: `raw`, converted for deep refs.
    value: Value,
}

struct RefInner {
    id: TargetId,
    shallow: bool,
    slot: Mutex<Slot>,
    runtime: Weak<RuntimeState>,
}

impl RefInner {
    fn convert(&self, runtime: Option<&Arc<RuntimeState>>, value: &Value) -> Value {
        match runtime {
            Some(runtime) if !self.shallow => runtime.wrap(value.clone(), FacadeFlags::MUTABLE),
            _ => value.clone(),
        }
    }
}

/// A reactive single-value cell.
///
/// # Example
///
/// ```rust
/// use ripple_core::{Runtime, Value};
///
/// let runtime = Runtime::new();
/// let count = runtime.create_ref(0);
///
/// count.set(5);
/// assert_eq!(count.get(), Value::from(5));
///
/// count.update(|n| Value::from(n.as_i64().unwrap_or_default() + 1));
/// assert_eq!(count.get(), Value::from(6));
/// ```
#[derive(Clone)]
pub struct Ref {
    inner: Arc<RefInner>,
}

impl Ref {
    pub(crate) fn new(runtime: &Arc<RuntimeState>, value: Value, shallow: bool) -> Self {
        let inner = RefInner {
            id: TargetId::next(),
            shallow,
            slot: Mutex::new(Slot {
                raw: Value::Undefined,
                value: Value::Undefined,
            }),
            runtime: Arc::downgrade(runtime),
        };
        let converted = inner.convert(Some(runtime), &value);
        *inner.slot.lock() = Slot {
            raw: value,
            value: converted,
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Get the ref's target ID.
    pub fn id(&self) -> TargetId {
        self.inner.id
    }

    pub fn is_shallow(&self) -> bool {
        self.inner.shallow
    }

    fn target(&self) -> Target {
        let anchor: Weak<RefInner> = Arc::downgrade(&self.inner);
        Target::new(self.inner.id, false, anchor)
    }

    /// Get the current value.
    ///
    /// If called while an effect is running, this also subscribes the effect.
    pub fn get(&self) -> Value {
        if let Some(runtime) = self.inner.runtime.upgrade() {
            runtime.track(&self.target(), &Key::value());
        }
        self.get_untracked()
    }

    /// Get the current value without tracking.
    pub fn get_untracked(&self) -> Value {
        self.inner.slot.lock().value.clone()
    }

    /// Set a new value and notify subscribers if it differs from the last
    /// value written.
    pub fn set(&self, value: impl Into<Value>) -> WriteOutcome {
        let value = value.into();
        let runtime = self.inner.runtime.upgrade();
        let converted = self.inner.convert(runtime.as_ref(), &value);

        let old = {
            let mut slot = self.inner.slot.lock();
            if !has_changed(&slot.raw, &value) {
                return WriteOutcome::Unchanged;
            }
            slot.raw = value;
            std::mem::replace(&mut slot.value, converted.clone())
        };

        if let Some(runtime) = runtime {
            runtime.trigger(TriggerKind::Edit, &self.target(), &Key::value(), &converted, Some(&old));
        }
        WriteOutcome::Edited
    }

    /// Update the value using a function of the current one.
    pub fn update<F>(&self, f: F) -> WriteOutcome
    where
        F: FnOnce(&Value) -> Value,
    {
        let next = f(&self.get_untracked());
        self.set(next)
    }

    /// Get the number of effects subscribed to the ref.
    pub fn subscriber_count(&self) -> usize {
        self.inner.runtime.upgrade().map_or(0, |runtime| {
            runtime.graph.lock().subscribers(self.inner.id, &Key::value()).len()
        })
    }
}

impl fmt::Debug for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ref")
            .field("id", &self.inner.id)
            .field("shallow", &self.inner.shallow)
            .field("value", &self.get_untracked())
            .finish()
    }
}

/// What a [`PropertyRef`] forwards to.
#[derive(Debug, Clone)]
pub enum RefSource {
    /// Reads and writes are tracked and propagated as the facade's are.
    Facade(Facade),
    /// Reads and writes go straight to the data.
    Container(Container),
}

impl RefSource {
    fn get(&self, key: &Key) -> Value {
        match self {
            RefSource::Facade(facade) => facade.get(key),
            RefSource::Container(container) => container.get(key),
        }
    }

    fn set(&self, key: &Key, value: Value) -> ReactiveResult<WriteOutcome> {
        match self {
            RefSource::Facade(facade) => facade.set(key, value),
            RefSource::Container(container) => {
                let assignment = container.assign(key, value, DEFAULT_MAX_ARRAY_LENGTH)?;
                Ok(if assignment.changed {
                    assignment.kind.into()
                } else {
                    WriteOutcome::Unchanged
                })
            }
        }
    }

    fn keys(&self) -> Vec<Key> {
        match self {
            RefSource::Facade(facade) => facade.keys(),
            RefSource::Container(container) => container.keys(),
        }
    }

    fn is_array(&self) -> bool {
        match self {
            RefSource::Facade(facade) => facade.raw().is_array(),
            RefSource::Container(container) => container.is_array(),
        }
    }
}

impl From<Facade> for RefSource {
    fn from(facade: Facade) -> Self {
        RefSource::Facade(facade)
    }
}

impl From<Container> for RefSource {
    fn from(container: Container) -> Self {
        RefSource::Container(container)
    }
}

/// An alias for one key of a facade or container.
#[derive(Debug, Clone)]
pub struct PropertyRef {
    source: RefSource,
    key: Key,
}

impl PropertyRef {
    pub(crate) fn new(source: RefSource, key: Key) -> Self {
        Self { source, key }
    }

    pub fn get(&self) -> Value {
        self.source.get(&self.key)
    }

    /// Write through to the source.
    ///
    /// # Errors
    ///
    /// Whatever the source's write returns, e.g. [`ReadOnly`] for a
    /// read-only facade.
    ///
    /// [`ReadOnly`]: crate::ReactiveError::ReadOnly
    pub fn set(&self, value: impl Into<Value>) -> ReactiveResult<WriteOutcome> {
        self.source.set(&self.key, value.into())
    }

    pub fn source(&self) -> &RefSource {
        &self.source
    }

    pub fn key(&self) -> &Key {
        &self.key
    }
}

/// Property refs for every key of a source, shaped like the source.
#[derive(Debug, Clone)]
pub enum Refs {
    Array {
        items: Vec<PropertyRef>,
        /// Named properties set on the array.
        props: IndexMap<Key, PropertyRef>,
    },
    Object(IndexMap<Key, PropertyRef>),
}

impl Refs {
    pub fn len(&self) -> usize {
        match self {
            Refs::Array { items, props } => items.len() + props.len(),
            Refs::Object(refs) => refs.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The ref for `key`; array elements are addressed by index keys.
    pub fn get(&self, key: impl Into<Key>) -> Option<&PropertyRef> {
        let key = key.into();
        match self {
            Refs::Array { items, props } => match key.as_index() {
                Some(index) => items.get(index),
                None => props.get(&key),
            },
            Refs::Object(refs) => refs.get(&key),
        }
    }
}

/// A ref bound to `key` of `source`.
pub fn to_ref(source: impl Into<RefSource>, key: impl Into<Key>) -> PropertyRef {
    PropertyRef::new(source.into(), key.into())
}

/// One property ref per key of `source`.
///
/// Arrays produce one ref per index plus one per named property; objects
/// produce one ref per key, in key order.
pub fn to_refs(source: impl Into<RefSource>) -> Refs {
    let source = source.into();
    let keys = source.keys();
    trace!(keys = keys.len(), "creating property refs");

    if source.is_array() {
        let (indices, named): (Vec<Key>, Vec<Key>) =
            keys.into_iter().partition(Key::is_integer_key);
        Refs::Array {
            items: indices
                .into_iter()
                .map(|key| PropertyRef::new(source.clone(), key))
                .collect(),
            props: named
                .into_iter()
                .map(|key| (key.clone(), PropertyRef::new(source.clone(), key)))
                .collect(),
        }
    } else {
        Refs::Object(
            keys.into_iter()
                .map(|key| (key.clone(), PropertyRef::new(source.clone(), key)))
                .collect(),
        )
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Runtime;
    use std::sync::atomic::{AtomicI32, Ordering};

    #[test]
    fn ref_get_and_set() {
        let runtime = Runtime::new();
        let count = runtime.create_ref(0);
        assert_eq!(count.get(), Value::from(0));

        assert_eq!(count.set(42), WriteOutcome::Edited);
        assert_eq!(count.get(), Value::from(42));
        assert_eq!(count.set(42), WriteOutcome::Unchanged);
    }

    #[test]
    fn ref_update() {
        let runtime = Runtime::new();
        let count = runtime.create_ref(10);
        count.update(|v| Value::from(v.as_i64().unwrap_or_default() + 5));
        assert_eq!(count.get(), Value::from(15));
    }

    #[test]
    fn ref_notifies_subscribers() {
        let runtime = Runtime::new();
        let count = runtime.create_ref(0);
        let call_count = Arc::new(AtomicI32::new(0));

        let (observed, call_count_clone) = (count.clone(), call_count.clone());
        let _effect = runtime.effect(move || {
            observed.get();
            call_count_clone.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
        assert_eq!(count.subscriber_count(), 1);

        count.set(1);
        assert_eq!(call_count.load(Ordering::SeqCst), 2);

        // Same value: no notification
        count.set(1);
        assert_eq!(call_count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn deep_ref_wraps_containers() {
        let runtime = Runtime::new();
        let container = Container::from_entries([("n", 1)]);
        let cell = runtime.create_ref(container.clone());

        let facade = cell.get().into_facade().unwrap();
        assert!(facade.raw().ptr_eq(&container));
        assert!(!cell.is_shallow());

        // Writing the same raw container again is not a change
        assert_eq!(cell.set(container), WriteOutcome::Unchanged);
    }

    #[test]
    fn shallow_ref_stores_values_as_given() {
        let runtime = Runtime::new();
        let container = Container::from_entries([("n", 1)]);
        let cell = runtime.shallow_ref(container.clone());

        assert!(cell.is_shallow());
        assert!(cell.get().as_container().unwrap().ptr_eq(&container));
    }

    #[test]
    fn ref_clone_shares_state() {
        let runtime = Runtime::new();
        let ref1 = runtime.create_ref(0);
        let ref2 = ref1.clone();

        ref1.set(42);
        assert_eq!(ref2.get(), Value::from(42));
        assert_eq!(ref1.id(), ref2.id());
    }

    #[test]
    fn property_ref_forwards_to_source() {
        let runtime = Runtime::new();
        let container = Container::from_entries([("a", 1)]);
        let facade = runtime.wrap(&container);

        let alias = to_ref(facade.clone(), "a");
        assert_eq!(alias.get(), Value::from(1));
        assert_eq!(alias.key(), &Key::from("a"));

        alias.set(2).unwrap();
        assert_eq!(facade.get("a"), Value::from(2));

        facade.set("a", 3).unwrap();
        assert_eq!(alias.get(), Value::from(3));
    }

    #[test]
    fn property_ref_on_raw_container() {
        let container = Container::from_entries([("a", 1)]);
        let alias = to_ref(container.clone(), "a");

        assert_eq!(alias.set(1).unwrap(), WriteOutcome::Unchanged);
        assert_eq!(alias.set(5).unwrap(), WriteOutcome::Edited);
        assert_eq!(container.get("a"), Value::from(5));
        assert!(matches!(alias.source(), RefSource::Container(_)));
    }

    #[test]
    fn to_refs_follows_the_source_shape() {
        let array = Container::from_values(["x", "y"]);
        array.set("label", "letters").unwrap();
        let object = Container::from_entries([("a", 1), ("b", 2)]);

        let refs = to_refs(array.clone());
        assert_eq!(refs.len(), 3);
        assert_eq!(refs.get("label").unwrap().get(), Value::from("letters"));
        let Refs::Array { items, props } = refs else {
            panic!("expected array refs");
        };
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].get(), Value::from("y"));

        props[&Key::from("label")].set("renamed").unwrap();
        assert_eq!(array.get("label"), Value::from("renamed"));

        let refs = to_refs(object);
        assert!(matches!(refs, Refs::Object(_)));
        assert_eq!(refs.get("b").unwrap().get(), Value::from(2));
    }
}
