//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects facades, refs,
//! computeds and effects. It owns the dependency graph, the identity cache
//! and the stack of running effects, and it propagates writes.
//!
//! # How It Works
//!
//! 1. Wrapping a container returns the cached facade for its family, or
//!    creates and caches one.
//!
//! 2. When a facade or ref is read while an effect is running, the runtime
//!    subscribes that effect to the key that was read.
//!
//! 3. When a key is written with a new value, the runtime:
//!    a. Collects the subscribers the write affects
//!    b. Releases every lock
//!    c. Notifies each subscriber in subscription order (its scheduler if it
//!       has one, otherwise a re-run)
//!
//! # Thread Safety
//!
//! All shared state sits behind `parking_lot` mutexes, and no lock is held
//! while user code runs. A subscriber may therefore read, write and create
//! effects freely from inside a notification.
//!
//! # Faults
//!
//! A panicking subscriber does not keep the remaining subscribers from being
//! notified. Propagation logs the fault, finishes the pass, and then resumes
//! unwinding with the first panic it caught.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, trace};

use super::cache::{Family, IdentityCache};
use super::computed::Computed;
use super::context::EffectStack;
use super::effect::{Effect, EffectOptions};
use super::facade::{Facade, FacadeFlags};
use super::refs::Ref;
use super::subscriber::SubscriberId;
use crate::config::RuntimeConfig;
use crate::graph::{self, DependencyGraph, Target, TriggerKind};
use crate::value::{Container, Key, Value};

/// Shared state behind a [`Runtime`] handle.
pub(crate) struct RuntimeState {
    pub(crate) config: RuntimeConfig,
    pub(crate) graph: Mutex<DependencyGraph>,
    pub(crate) cache: Mutex<IdentityCache>,
    pub(crate) stack: Mutex<EffectStack>,
}

impl RuntimeState {
    fn new(config: RuntimeConfig) -> Self {
        Self {
            cache: Mutex::new(IdentityCache::new(config.sweep_interval)),
            graph: Mutex::new(DependencyGraph::new()),
            stack: Mutex::new(EffectStack::default()),
            config,
        }
    }

    /// Subscribe the running effect, if any, to `key` of `target`.
    pub(crate) fn track(&self, target: &Target, key: &Key) {
        let Some(subscriber) = self.stack.lock().current() else {
            return;
        };
        if self.graph.lock().track(target, key, &subscriber) {
            trace!(target_id = %target.id, key = %key, subscriber = %subscriber.id(), "tracked read");
        }
    }

    /// Notify the subscribers affected by a write.
    pub(crate) fn trigger(
        &self,
        kind: TriggerKind,
        target: &Target,
        key: &Key,
        new_value: &Value,
        old_value: Option<&Value>,
    ) {
        let subscribers = {
            let graph = self.graph.lock();
            graph::collect(&graph, kind, target, key, new_value)
        };
        if subscribers.is_empty() {
            return;
        }

        debug!(
            target_id = %target.id,
            key = %key,
            ?kind,
            ?old_value,
            ?new_value,
            subscribers = subscribers.len(),
            "propagating write"
        );

        let mut fault: Option<Box<dyn Any + Send>> = None;
        for subscriber in &subscribers {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| subscriber.notify())) {
                error!(subscriber = %subscriber.id(), key = %key, "subscriber panicked during propagation");
                fault.get_or_insert(payload);
            }
        }

        if let Some(payload) = fault {
            panic::resume_unwind(payload);
        }
    }

    /// Wrap a value in a facade of the given kind.
    ///
    /// Scalars come back unchanged. A facade of the requested family comes
    /// back as-is, and so does a read-only facade asked to be writable. A
    /// writable facade asked to be read-only is replaced by the read-only
    /// facade of its container.
    pub(crate) fn wrap(self: &Arc<Self>, value: Value, flags: FacadeFlags) -> Value {
        match value {
            Value::Container(container) => Value::Facade(self.facade(&container, flags)),
            Value::Facade(facade) if facade.is_read_only() || !flags.read_only => Value::Facade(facade),
            Value::Facade(facade) => Value::Facade(self.facade(&facade.raw(), flags)),
            other => other,
        }
    }

    /// The cached facade of `container` in the family of `flags`, created on
    /// first request. A later request with a different `shallow` flag gets
    /// the facade created first.
    pub(crate) fn facade(self: &Arc<Self>, container: &Container, flags: FacadeFlags) -> Facade {
        let family = Family::of(flags);
        let (facade, sweep_due) = {
            let mut cache = self.cache.lock();
            if let Some(existing) = cache.get(container.id(), family) {
                return existing;
            }
            let facade = Facade::new(container.clone(), flags, Arc::downgrade(self));
            let sweep_due = cache.insert(container.id(), family, &facade);
            (facade, sweep_due)
        };

        trace!(target_id = %container.id(), ?flags, "created facade");
        if sweep_due {
            self.sweep();
        }
        facade
    }

    /// Drop cache entries and graph targets whose data has been released.
    pub(crate) fn sweep(&self) -> usize {
        let facades = self.cache.lock().sweep();
        let (targets, retired) = self.graph.lock().sweep_released();
        // Retired handles may own the last reference to an effect.
        drop(retired);

        if facades + targets > 0 {
            debug!(facades, targets, "swept released entries");
        }
        facades + targets
    }
}

/// Handle to a reactive runtime.
///
/// A runtime is an isolated world: facades, refs, computeds and effects
/// created through one runtime only see reads and writes made through that
/// runtime. Cloning the handle shares the runtime.
///
/// # Example
///
/// ```rust
/// use ripple_core::Runtime;
/// use serde_json::json;
///
/// let runtime = Runtime::new();
/// let state = runtime.reactive(json!({ "count": 1 })).into_facade().unwrap();
///
/// let doubled = {
///     let state = state.clone();
///     runtime.computed(move || state.get("count").as_i64().unwrap_or_default() * 2)
/// };
///
/// assert_eq!(doubled.get(), 2);
/// state.set("count", 5).unwrap();
/// assert_eq!(doubled.get(), 10);
/// ```
#[derive(Clone)]
pub struct Runtime {
    state: Arc<RuntimeState>,
}

impl Runtime {
    /// Create a runtime with the default configuration.
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        debug!(?config, "created reactive runtime");
        Self {
            state: Arc::new(RuntimeState::new(config)),
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.state.config
    }

    /// Deep, writable facade over `value`. Scalars are returned unchanged.
    pub fn reactive(&self, value: impl Into<Value>) -> Value {
        self.state.wrap(value.into(), FacadeFlags::MUTABLE)
    }

    /// Writable facade whose reads return nested containers raw.
    pub fn shallow_reactive(&self, value: impl Into<Value>) -> Value {
        self.state.wrap(value.into(), FacadeFlags::SHALLOW_MUTABLE)
    }

    /// Deep, read-only facade over `value`. Scalars are returned unchanged.
    pub fn readonly(&self, value: impl Into<Value>) -> Value {
        self.state.wrap(value.into(), FacadeFlags::READ_ONLY)
    }

    pub fn shallow_readonly(&self, value: impl Into<Value>) -> Value {
        self.state.wrap(value.into(), FacadeFlags::SHALLOW_READ_ONLY)
    }

    /// Typed form of [`reactive`](Self::reactive) for a known container.
    pub fn wrap(&self, container: &Container) -> Facade {
        self.state.facade(container, FacadeFlags::MUTABLE)
    }

    /// The facade of `container` with the given flags.
    pub fn wrap_with(&self, container: &Container, flags: FacadeFlags) -> Facade {
        self.state.facade(container, flags)
    }

    /// Register an effect and run it once.
    pub fn effect<T, F>(&self, run: F) -> Effect<T>
    where
        T: 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        Effect::new(&self.state, run, EffectOptions::default())
    }

    pub fn effect_with_options<T, F>(&self, run: F, options: EffectOptions) -> Effect<T>
    where
        T: 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        Effect::new(&self.state, run, options)
    }

    /// A lazily evaluated, cached derived value.
    pub fn computed<T, F>(&self, getter: F) -> Computed<T>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        Computed::new(&self.state, getter, None)
    }

    /// A computed whose writes are forwarded to `setter`.
    pub fn computed_with_setter<T, G, S>(&self, getter: G, setter: S) -> Computed<T>
    where
        T: Clone + Send + Sync + 'static,
        G: Fn() -> T + Send + Sync + 'static,
        S: Fn(T) + Send + Sync + 'static,
    {
        Computed::new(&self.state, getter, Some(Box::new(setter)))
    }

    /// A single-value cell. Containers stored in it are read back deeply
    /// reactive.
    pub fn create_ref(&self, value: impl Into<Value>) -> Ref {
        Ref::new(&self.state, value.into(), false)
    }

    /// A single-value cell that stores containers as given.
    pub fn shallow_ref(&self, value: impl Into<Value>) -> Ref {
        Ref::new(&self.state, value.into(), true)
    }

    /// Drop bookkeeping for data that no longer exists.
    ///
    /// Returns how many entries were removed. Runs on its own every
    /// `sweep_interval` facade creations.
    pub fn sweep(&self) -> usize {
        self.state.sweep()
    }

    /// Subscribers of `key` on `container`, in notification order.
    pub fn subscribers(&self, container: &Container, key: impl Into<Key>) -> Vec<SubscriberId> {
        self.state.graph.lock().subscribers(container.id(), &key.into())
    }

    /// Whether a live facade of the given family exists for `container`.
    pub fn has_facade(&self, container: &Container, read_only: bool) -> bool {
        let family = if read_only { Family::ReadOnly } else { Family::Mutable };
        self.state.cache.lock().get(container.id(), family).is_some()
    }

    /// The effect reads are currently attributed to.
    pub fn active_effect(&self) -> Option<SubscriberId> {
        self.state.stack.lock().current().map(|handle| handle.id())
    }

    /// Check if reads are currently being tracked.
    pub fn is_tracking(&self) -> bool {
        self.active_effect().is_some()
    }

    /// Number of effects currently running, nested ones included.
    pub fn stack_depth(&self) -> usize {
        self.state.stack.lock().depth()
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.state.config)
            .field("tracked_targets", &self.state.graph.lock().target_count())
            .field("cached_facades", &self.state.cache.lock().len())
            .finish()
    }
}
