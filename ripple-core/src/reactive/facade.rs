//! Facades
//!
//! A facade is the observed view of a container. Reads through a writable
//! facade subscribe the running effect; writes through it propagate. A
//! read-only facade never tracks and rejects every write.
//!
//! # Depth
//!
//! Deep facades wrap the nested containers they return, in the same family
//! (a nested read through a read-only facade is read-only too). Shallow
//! facades return nested containers raw.
//!
//! # Write Order
//!
//! A write lands in the container before any subscriber is notified, so
//! subscribers always observe the new value.

use std::fmt;
use std::sync::{Arc, Weak};

use tracing::warn;

use super::refs::{self, PropertyRef, RefSource, Refs};
use super::runtime::RuntimeState;
use crate::config::DEFAULT_MAX_ARRAY_LENGTH;
use crate::error::{ReactiveError, ReactiveResult};
use crate::graph::TriggerKind;
use crate::value::{Container, Key, Value};

/// What kind of facade to create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FacadeFlags {
    pub read_only: bool,
    pub shallow: bool,
}

impl FacadeFlags {
    pub const MUTABLE: Self = Self {
        read_only: false,
        shallow: false,
    };
    pub const SHALLOW_MUTABLE: Self = Self {
        read_only: false,
        shallow: true,
    };
    pub const READ_ONLY: Self = Self {
        read_only: true,
        shallow: false,
    };
    pub const SHALLOW_READ_ONLY: Self = Self {
        read_only: true,
        shallow: true,
    };

    /// Flags for nested values read through a deep facade.
    fn nested(self) -> Self {
        Self {
            read_only: self.read_only,
            shallow: false,
        }
    }
}

/// The effect of an accepted write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The key did not exist before.
    Added,
    /// An existing key got a different value.
    Edited,
    /// The new value is the same as the old one; nothing was notified.
    Unchanged,
}

impl From<TriggerKind> for WriteOutcome {
    fn from(kind: TriggerKind) -> Self {
        match kind {
            TriggerKind::Add => WriteOutcome::Added,
            TriggerKind::Edit => WriteOutcome::Edited,
        }
    }
}

pub(crate) struct FacadeInner {
    target: Container,
    flags: FacadeFlags,
    runtime: Weak<RuntimeState>,
}

/// An observed view of a container.
///
/// Facades compare by identity. Cloning a facade clones the handle.
#[derive(Clone)]
pub struct Facade {
    inner: Arc<FacadeInner>,
}

impl Facade {
    pub(crate) fn new(target: Container, flags: FacadeFlags, runtime: Weak<RuntimeState>) -> Self {
        Self {
            inner: Arc::new(FacadeInner {
                target,
                flags,
                runtime,
            }),
        }
    }

    pub(crate) fn downgrade(&self) -> Weak<FacadeInner> {
        Arc::downgrade(&self.inner)
    }

    pub(crate) fn upgrade(weak: &Weak<FacadeInner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    fn track(&self, runtime: Option<&Arc<RuntimeState>>, key: &Key) {
        if self.inner.flags.read_only {
            return;
        }
        if let Some(runtime) = runtime {
            runtime.track(&self.inner.target.target(), key);
        }
    }

    /// Read a key, subscribing the running effect unless read-only.
    ///
    /// Nested containers come back wrapped unless this facade is shallow.
    pub fn get(&self, key: impl Into<Key>) -> Value {
        let key = key.into();
        let runtime = self.inner.runtime.upgrade();
        self.track(runtime.as_ref(), &key);

        let value = self.inner.target.get(&key);
        if self.inner.flags.shallow || !value.is_container() {
            return value;
        }
        match runtime {
            Some(runtime) => runtime.wrap(value, self.inner.flags.nested()),
            None => value,
        }
    }

    /// Write a key and notify its subscribers.
    ///
    /// # Errors
    ///
    /// - [`ReactiveError::ReadOnly`] on a read-only facade; nothing is written.
    /// - [`ReactiveError::InvalidLength`] when `length` of an array is set to
    ///   something other than a non-negative integer.
    /// - [`ReactiveError::ArrayTooLong`] when the write would grow an array
    ///   past the runtime's `max_array_length`.
    pub fn set(&self, key: impl Into<Key>, value: impl Into<Value>) -> ReactiveResult<WriteOutcome> {
        let key = key.into();
        let value = value.into();

        if self.inner.flags.read_only {
            let target = self.inner.target.to_json().to_string();
            warn!(key = %key, "{target} is readonly");
            return Err(ReactiveError::ReadOnly { target, key });
        }

        let runtime = self.inner.runtime.upgrade();
        let max_length = runtime
            .as_ref()
            .map_or(DEFAULT_MAX_ARRAY_LENGTH, |runtime| runtime.config.max_array_length);
        let assignment = self
            .inner
            .target
            .assign(&key, value.clone(), max_length)
            .map_err(|err| {
                warn!(key = %key, "{err}");
                err
            })?;
        if !assignment.changed {
            return Ok(WriteOutcome::Unchanged);
        }

        if let Some(runtime) = runtime {
            let old = match assignment.kind {
                TriggerKind::Edit => Some(&assignment.old),
                TriggerKind::Add => None,
            };
            runtime.trigger(assignment.kind, &self.inner.target.target(), &key, &value, old);
        }
        Ok(assignment.kind.into())
    }

    /// Whether `key` exists, subscribing the running effect to it.
    pub fn has(&self, key: impl Into<Key>) -> bool {
        let key = key.into();
        self.track(self.inner.runtime.upgrade().as_ref(), &key);
        self.inner.target.has(&key)
    }

    /// Array length or object key count. On arrays this reads `length`.
    pub fn len(&self) -> usize {
        if self.inner.target.is_array() {
            self.track(self.inner.runtime.upgrade().as_ref(), &Key::length());
        }
        self.inner.target.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Enumerable keys. On arrays this reads `length`; key enumeration of
    /// objects is not tracked.
    pub fn keys(&self) -> Vec<Key> {
        if self.inner.target.is_array() {
            self.track(self.inner.runtime.upgrade().as_ref(), &Key::length());
        }
        self.inner.target.keys()
    }

    /// The container behind the facade. Access through it is untracked.
    pub fn raw(&self) -> Container {
        self.inner.target.clone()
    }

    pub fn flags(&self) -> FacadeFlags {
        self.inner.flags
    }

    pub fn is_read_only(&self) -> bool {
        self.inner.flags.read_only
    }

    pub fn is_shallow(&self) -> bool {
        self.inner.flags.shallow
    }

    pub fn ptr_eq(&self, other: &Facade) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// A ref bound to one key of this facade.
    pub fn to_ref(&self, key: impl Into<Key>) -> PropertyRef {
        PropertyRef::new(RefSource::Facade(self.clone()), key.into())
    }

    /// A ref for every key, shaped like the container.
    pub fn to_refs(&self) -> Refs {
        refs::to_refs(self.clone())
    }
}

impl fmt::Debug for Facade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match (self.is_read_only(), self.is_shallow()) {
            (false, false) => "Reactive",
            (false, true) => "ShallowReactive",
            (true, false) => "Readonly",
            (true, true) => "ShallowReadonly",
        };
        write!(f, "{kind}({:?})", self.inner.target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;
    use crate::reactive::Runtime;
    use serde_json::json;
    use std::sync::atomic::{AtomicI32, Ordering};

    fn counting_effect(runtime: &Runtime, read: impl Fn() + Send + Sync + 'static) -> Arc<AtomicI32> {
        let runs = Arc::new(AtomicI32::new(0));
        let runs_clone = runs.clone();
        let effect = runtime.effect(move || {
            runs_clone.fetch_add(1, Ordering::SeqCst);
            read();
        });
        // The graph holds subscribed effects
        drop(effect);
        runs
    }

    #[test]
    fn writes_classify_and_skip_unchanged() {
        let runtime = Runtime::new();
        let facade = runtime.wrap(&Container::object());

        assert_eq!(facade.set("a", 1).unwrap(), WriteOutcome::Added);
        assert_eq!(facade.set("a", 2).unwrap(), WriteOutcome::Edited);
        assert_eq!(facade.set("a", 2).unwrap(), WriteOutcome::Unchanged);
        assert_eq!(facade.set("nan", f64::NAN).unwrap(), WriteOutcome::Added);
        assert_eq!(facade.set("nan", f64::NAN).unwrap(), WriteOutcome::Unchanged);
    }

    #[test]
    fn unchanged_write_does_not_notify() {
        let runtime = Runtime::new();
        let facade = runtime.wrap(&Container::from_entries([("a", 1)]));

        let observed = facade.clone();
        let runs = counting_effect(&runtime, move || {
            observed.get("a");
        });

        facade.set("a", 1).unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        facade.set("a", 3).unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn read_only_rejects_writes() {
        let runtime = Runtime::new();
        let container = Container::from_entries([("a", 1)]);
        let read_only = runtime.wrap_with(&container, FacadeFlags::READ_ONLY);

        let err = read_only.set("a", 2).unwrap_err();
        assert_eq!(
            err,
            ReactiveError::ReadOnly {
                target: r#"{"a":1.0}"#.to_string(),
                key: Key::from("a"),
            }
        );
        assert_eq!(container.get("a"), Value::from(1));
    }

    #[test]
    fn read_only_reads_do_not_track() {
        let runtime = Runtime::new();
        let container = Container::from_entries([("a", 1)]);
        let read_only = runtime.wrap_with(&container, FacadeFlags::READ_ONLY);
        let writable = runtime.wrap(&container);

        let runs = counting_effect(&runtime, move || {
            read_only.get("a");
        });

        writable.set("a", 2).unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(runtime.subscribers(&container, "a").is_empty());
    }

    #[test]
    fn deep_reads_wrap_in_the_same_family() {
        let runtime = Runtime::new();
        let root = runtime.reactive(json!({ "user": { "name": "ann" } })).into_facade().unwrap();

        let user = root.get("user").into_facade().unwrap();
        assert!(!user.is_read_only() && !user.is_shallow());
        assert!(root.get("user").into_facade().unwrap().ptr_eq(&user));

        let read_only = runtime.readonly(root.raw()).into_facade().unwrap();
        let nested = read_only.get("user").into_facade().unwrap();
        assert!(nested.is_read_only());
        assert!(nested.set("name", "bob").is_err());
    }

    #[test]
    fn shallow_reads_return_raw_containers() {
        let runtime = Runtime::new();
        let root = runtime
            .shallow_reactive(json!({ "user": { "name": "ann" } }))
            .into_facade()
            .unwrap();

        let user = root.get("user");
        assert!(user.as_container().is_some());

        let shallow_read_only = runtime.shallow_readonly(root.raw()).into_facade().unwrap();
        assert!(shallow_read_only.get("user").as_container().is_some());
    }

    #[test]
    fn nested_writes_notify_nested_readers() {
        let runtime = Runtime::new();
        let root = runtime.reactive(json!({ "user": { "name": "ann" } })).into_facade().unwrap();

        let observed = root.clone();
        let runs = counting_effect(&runtime, move || {
            observed.get("user").into_facade().unwrap().get("name");
        });

        root.get("user").into_facade().unwrap().set("name", "bob").unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn has_tracks_the_key() {
        let runtime = Runtime::new();
        let container = Container::object();
        let facade = runtime.wrap(&container);

        let observed = facade.clone();
        let runs = counting_effect(&runtime, move || {
            observed.has("later");
        });

        facade.set("later", true).unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn invalid_length_is_an_error() {
        let runtime = Runtime::new();
        let array = runtime.wrap(&Container::from_values([1, 2]));

        assert!(matches!(
            array.set("length", -1),
            Err(ReactiveError::InvalidLength { .. })
        ));
        assert_eq!(array.len(), 2);
    }

    #[test]
    fn array_growth_respects_the_configured_limit() {
        let runtime = Runtime::with_config(RuntimeConfig {
            max_array_length: 8,
            ..RuntimeConfig::default()
        });
        let array = runtime.wrap(&Container::from_values([1]));

        let observed = array.clone();
        let runs = counting_effect(&runtime, move || {
            observed.len();
        });

        assert_eq!(
            array.set(8usize, 1),
            Err(ReactiveError::ArrayTooLong { length: 9, limit: 8 })
        );
        assert!(matches!(
            array.set("length", 9),
            Err(ReactiveError::ArrayTooLong { .. })
        ));
        assert_eq!(array.len(), 1);
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        assert_eq!(array.set(7usize, 1).unwrap(), WriteOutcome::Added);
        assert_eq!(array.len(), 8);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn large_index_on_default_runtime_is_rejected() {
        let runtime = Runtime::new();
        let container = Container::from_values([1]);
        let array = runtime.wrap(&container);

        assert!(matches!(
            array.set(4_000_000_000usize, 7),
            Err(ReactiveError::ArrayTooLong { .. })
        ));
        assert!(matches!(
            array.set("length", 4_000_000_000u32),
            Err(ReactiveError::ArrayTooLong { .. })
        ));
        assert_eq!(container.len(), 1);
    }

    #[test]
    fn read_only_facade_stays_read_only_when_rewrapped() {
        let runtime = Runtime::new();
        let container = Container::from_entries([("secret", 1)]);
        let read_only = runtime.wrap_with(&container, FacadeFlags::READ_ONLY);

        let rewrapped = runtime.reactive(read_only.clone()).into_facade().unwrap();
        assert!(rewrapped.ptr_eq(&read_only));
        assert!(matches!(
            rewrapped.set("secret", 2),
            Err(ReactiveError::ReadOnly { .. })
        ));

        // Stored inside a writable facade and read back deeply
        let state = runtime.wrap(&Container::object());
        state.set("child", read_only.clone()).unwrap();
        let child = state.get("child").into_facade().unwrap();
        assert!(child.is_read_only());
        assert!(child.set("secret", 3).is_err());

        // Held by a deep ref
        let cell = runtime.create_ref(read_only);
        let held = cell.get().into_facade().unwrap();
        assert!(held.is_read_only());
        assert!(held.set("secret", 4).is_err());

        assert_eq!(container.get("secret"), Value::from(1));
    }

    #[test]
    fn debug_names_the_kind() {
        let runtime = Runtime::new();
        let container = Container::from_values([1]);
        let facade = runtime.wrap_with(&container, FacadeFlags::SHALLOW_READ_ONLY);

        assert!(format!("{facade:?}").starts_with("ShallowReadonly(Array"));
    }
}
