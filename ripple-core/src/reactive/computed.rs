//! Computed Implementation
//!
//! A Computed is a cached derived value that re-evaluates only when its
//! dependencies change.
//!
//! # How Computeds Work
//!
//! 1. A computed is backed by a lazy effect. Nothing runs until the first
//!    read.
//!
//! 2. On read, if the computed is dirty, the effect runs the getter, the
//!    result is cached and the computed becomes clean.
//!
//! 3. When a dependency changes, the effect's scheduler only marks the
//!    computed dirty. It never recomputes.
//!
//! 4. Effects that read the computed are subscribed to it. When it turns
//!    dirty they are notified, re-run, and pull the new value.
//!
//! # Why This Matters
//!
//! This lazy approach avoids unnecessary recomputation:
//!
//! - A value changes
//! - 10 computeds depend on it
//! - Only the computeds actually read will recompute
//! - Computeds that are never read stay dirty (no wasted work)

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::warn;

use super::effect::{Effect, EffectOptions};
use super::runtime::RuntimeState;
use crate::error::{ReactiveError, ReactiveResult};
use crate::graph::{Target, TargetId, TriggerKind};
use crate::value::{Key, Value};

type Setter<T> = Box<dyn Fn(T) + Send + Sync>;

struct ComputedInner<T>
where
    T: Clone + Send + Sync + 'static,
{
    id: TargetId,
    effect: Effect<T>,
    dirty: AtomicBool,
    value: Mutex<Option<T>>,
    setter: Option<Setter<T>>,
    runtime: Weak<RuntimeState>,
}

impl<T> ComputedInner<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn target(self: &Arc<Self>) -> Target {
        let anchor: Weak<Self> = Arc::downgrade(self);
        Target::new(self.id, false, anchor)
    }

    /// Called by the effect's scheduler when a dependency changed.
    fn mark_dirty(self: &Arc<Self>) {
        if self.dirty.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(runtime) = self.runtime.upgrade() {
            runtime.trigger(TriggerKind::Edit, &self.target(), &Key::value(), &Value::Undefined, None);
        }
    }
}

impl<T> Drop for ComputedInner<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn drop(&mut self) {
        self.effect.stop();
    }
}

/// A cached derived value that recomputes only when dependencies change.
///
/// # Type Parameters
///
/// - `T`: The type of the computed value. Must be Clone + Send + Sync.
///
/// # Example
///
/// ```rust
/// use ripple_core::Runtime;
///
/// let runtime = Runtime::new();
/// let count = runtime.create_ref(2);
///
/// let squared = {
///     let count = count.clone();
///     runtime.computed(move || {
///         let n = count.get().as_i64().unwrap_or_default();
///         n * n
///     })
/// };
///
/// assert_eq!(squared.get(), 4);
/// count.set(3);
/// assert!(squared.is_dirty());
/// assert_eq!(squared.get(), 9);
/// ```
pub struct Computed<T>
where
    T: Clone + Send + Sync + 'static,
{
    inner: Arc<ComputedInner<T>>,
}

impl<T> Computed<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub(crate) fn new<G>(runtime: &Arc<RuntimeState>, getter: G, setter: Option<Setter<T>>) -> Self
    where
        G: Fn() -> T + Send + Sync + 'static,
    {
        let inner = Arc::new_cyclic(|this: &Weak<ComputedInner<T>>| {
            let this = this.clone();
            let options = EffectOptions::new().lazy().with_scheduler(move |_| {
                if let Some(inner) = this.upgrade() {
                    inner.mark_dirty();
                }
            });

            ComputedInner {
                id: TargetId::next(),
                effect: Effect::new(runtime, getter, options),
                dirty: AtomicBool::new(true),
                value: Mutex::new(None),
                setter,
                runtime: Arc::downgrade(runtime),
            }
        });

        Self { inner }
    }

    /// Get the computed's target ID.
    pub fn id(&self) -> TargetId {
        self.inner.id
    }

    /// Get the current value, recomputing if necessary.
    ///
    /// # Panics
    ///
    /// Panics if the getter reads this computed before it ever produced a
    /// value. Use [`try_get`](Self::try_get) to get an error instead.
    pub fn get(&self) -> T {
        match self.try_get() {
            Ok(value) => value,
            Err(err) => panic!("{err}"),
        }
    }

    /// Get the current value, recomputing if necessary.
    ///
    /// # Errors
    ///
    /// [`ReactiveError::CyclicComputed`] if the getter is already running
    /// further up the stack and no value was cached yet.
    pub fn try_get(&self) -> ReactiveResult<T> {
        if let Some(runtime) = self.inner.runtime.upgrade() {
            runtime.track(&self.inner.target(), &Key::value());
        }

        if self.inner.dirty.load(Ordering::SeqCst) {
            if let Some(value) = self.inner.effect.run() {
                *self.inner.value.lock() = Some(value);
                self.inner.dirty.store(false, Ordering::SeqCst);
            }
        }

        self.inner
            .value
            .lock()
            .clone()
            .ok_or(ReactiveError::CyclicComputed)
    }

    /// Forward a write to the setter.
    ///
    /// The cached value is left alone; if the setter writes something the
    /// getter reads, the computed turns dirty the usual way.
    pub fn set(&self, value: T) -> ReactiveResult<()> {
        match &self.inner.setter {
            Some(setter) => {
                setter(value);
                Ok(())
            }
            None => {
                warn!(computed = %self.inner.id, "write operation failed: computed value is readonly");
                Err(ReactiveError::ComputedWithoutSetter)
            }
        }
    }

    /// Whether the next read will recompute.
    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.load(Ordering::SeqCst)
    }

    /// Check if the computed has a cached value.
    pub fn has_value(&self) -> bool {
        self.inner.value.lock().is_some()
    }

    pub fn has_setter(&self) -> bool {
        self.inner.setter.is_some()
    }

    /// The effect that runs the getter.
    pub fn effect(&self) -> &Effect<T> {
        &self.inner.effect
    }
}

impl<T> Clone for Computed<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Computed<T>
where
    T: Clone + Send + Sync + fmt::Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("id", &self.inner.id)
            .field("dirty", &self.is_dirty())
            .field("value", &*self.inner.value.lock())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
