//! Effect Implementation
//!
//! An Effect is a computation that re-runs whenever data it read changes.
//!
//! # How Effects Work
//!
//! 1. When registered, the effect runs once to establish its dependencies
//!    (unless it is lazy).
//!
//! 2. Every tracked read during a run subscribes the effect to that key.
//!
//! 3. When a subscribed key is written, propagation hands the effect to its
//!    scheduler if it has one, and re-runs it otherwise.
//!
//! 4. Before re-running, the effect drops its old subscriptions so only what
//!    the latest run read keeps it subscribed.
//!
//! # Reentrancy
//!
//! An effect that is already running is never started again. This is what
//! keeps `count = count + 1` inside an effect from re-triggering itself
//! forever: the write notifies the effect, and that notification is a no-op.
//!
//! # Differences from Computed
//!
//! - Effects are eager by default; computeds are always lazy.
//! - Effects run their side effect on every notification; a computed only
//!   marks itself dirty and recomputes on the next read.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use tracing::{trace, trace_span};

use super::context::ActiveEffect;
use super::runtime::RuntimeState;
use super::subscriber::{Scheduler, Subscriber, SubscriberHandle, SubscriberId};

/// Configuration for an effect.
#[derive(Clone, Default)]
pub struct EffectOptions {
    /// Do not run at registration; the first run happens on an explicit
    /// [`Effect::run`].
    pub lazy: bool,

    /// Called with the effect instead of re-running it when a dependency
    /// changes.
    pub scheduler: Option<Scheduler>,
}

impl EffectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lazy(mut self) -> Self {
        self.lazy = true;
        self
    }

    pub fn with_scheduler<F>(mut self, scheduler: F) -> Self
    where
        F: Fn(&SubscriberHandle) + Send + Sync + 'static,
    {
        self.scheduler = Some(Arc::new(scheduler));
        self
    }
}

impl fmt::Debug for EffectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectOptions")
            .field("lazy", &self.lazy)
            .field("scheduler", &self.scheduler.is_some())
            .finish()
    }
}

struct EffectInner<T> {
    id: SubscriberId,
    raw: Box<dyn Fn() -> T + Send + Sync>,
    options: EffectOptions,
    runtime: Weak<RuntimeState>,
    active: AtomicBool,
    run_count: AtomicUsize,
}

impl<T: 'static> EffectInner<T> {
    fn run(self: &Arc<Self>) -> Option<T> {
        if !self.active.load(Ordering::SeqCst) {
            return None;
        }

        let Some(runtime) = self.runtime.upgrade() else {
            self.run_count.fetch_add(1, Ordering::SeqCst);
            return Some((self.raw)());
        };

        if runtime.stack.lock().contains(self.id) {
            trace!(effect = %self.id, "skipping reentrant run");
            return None;
        }

        if runtime.config.prune_stale_dependencies {
            runtime.graph.lock().clear_subscriber(self.id);
        }

        let _span = trace_span!("effect", id = self.id.raw()).entered();
        let _active = ActiveEffect::enter(&runtime.stack, SubscriberHandle::new(self.clone()));
        self.run_count.fetch_add(1, Ordering::SeqCst);
        Some((self.raw)())
    }
}

impl<T: 'static> Subscriber for EffectInner<T> {
    fn id(&self) -> SubscriberId {
        self.id
    }

    fn scheduler(&self) -> Option<Scheduler> {
        self.options.scheduler.clone()
    }

    fn run_erased(self: Arc<Self>) {
        let _ = self.run();
    }
}

/// A registered, re-runnable computation.
///
/// Cloning an effect clones the handle; all clones share identity and state.
///
/// # Example
///
/// ```rust
/// use ripple_core::{Container, Runtime};
///
/// let runtime = Runtime::new();
/// let state = runtime.wrap(&Container::from_entries([("count", 0)]));
///
/// let observed = state.clone();
/// let effect = runtime.effect(move || observed.get("count").as_i64());
///
/// state.set("count", 5).unwrap();
/// assert_eq!(effect.run_count(), 2);
/// ```
pub struct Effect<T: 'static = ()> {
    inner: Arc<EffectInner<T>>,
}

impl<T: 'static> Effect<T> {
    pub(crate) fn new<F>(runtime: &Arc<RuntimeState>, run: F, options: EffectOptions) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        let effect = Self {
            inner: Arc::new(EffectInner {
                id: SubscriberId::new(),
                raw: Box::new(run),
                options,
                runtime: Arc::downgrade(runtime),
                active: AtomicBool::new(true),
                run_count: AtomicUsize::new(0),
            }),
        };

        if !effect.inner.options.lazy {
            // Run immediately to establish dependencies
            let _ = effect.run();
        }

        effect
    }

    /// Get the effect's unique ID.
    pub fn id(&self) -> SubscriberId {
        self.inner.id
    }

    /// Run the computation now and return its result.
    ///
    /// Returns `None` without running if the effect is already running
    /// further up the stack, or if it was stopped.
    pub fn run(&self) -> Option<T> {
        self.inner.run()
    }

    /// The computation this effect wraps, callable without tracking.
    pub fn raw(&self) -> &(dyn Fn() -> T + Send + Sync) {
        &*self.inner.raw
    }

    pub fn options(&self) -> &EffectOptions {
        &self.inner.options
    }

    /// A type-erased handle, as schedulers receive it.
    pub fn handle(&self) -> SubscriberHandle {
        SubscriberHandle::new(self.inner.clone())
    }

    /// Unsubscribe the effect from everything and make later runs no-ops.
    pub fn stop(&self) {
        if !self.inner.active.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(runtime) = self.inner.runtime.upgrade() {
            let removed = runtime.graph.lock().clear_subscriber(self.inner.id);
            trace!(effect = %self.inner.id, removed, "stopped effect");
        }
    }

    /// Whether the effect has not been stopped.
    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::SeqCst)
    }

    /// Get the number of times the computation has run.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.load(Ordering::SeqCst)
    }

    /// Get the number of keys the effect is currently subscribed to.
    pub fn dependency_count(&self) -> usize {
        self.inner
            .runtime
            .upgrade()
            .map_or(0, |runtime| runtime.graph.lock().read_count(self.inner.id))
    }
}

impl<T: 'static> Clone for Effect<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: 'static> fmt::Debug for Effect<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.id())
            .field("run_count", &self.run_count())
            .field("active", &self.is_active())
            .field("options", self.options())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Runtime;
    use crate::value::{Container, Value};
    use std::sync::atomic::AtomicI32;

    #[test]
    fn effect_runs_on_creation() {
        let runtime = Runtime::new();
        let run_count = Arc::new(AtomicI32::new(0));
        let run_count_clone = run_count.clone();

        let _effect = runtime.effect(move || {
            run_count_clone.fetch_add(1, Ordering::SeqCst);
        });

        // Effect should have run once on creation
        assert_eq!(run_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn lazy_effect_does_not_run_on_creation() {
        let runtime = Runtime::new();
        let effect = runtime.effect_with_options(|| 7, EffectOptions::new().lazy());

        assert_eq!(effect.run_count(), 0);
        assert_eq!(effect.run(), Some(7));
        assert_eq!(effect.run_count(), 1);
    }

    #[test]
    fn effect_reruns_when_dependency_changes() {
        let runtime = Runtime::new();
        let state = runtime.wrap(&Container::from_entries([("n", 1)]));
        let seen = Arc::new(AtomicI32::new(0));

        let (observed, seen_clone) = (state.clone(), seen.clone());
        let effect = runtime.effect(move || {
            let n = observed.get("n").as_i64().unwrap_or_default();
            seen_clone.store(n as i32, Ordering::SeqCst);
        });

        state.set("n", 2).unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 2);
        assert_eq!(effect.run_count(), 2);
        assert_eq!(effect.dependency_count(), 1);
    }

    #[test]
    fn self_increment_runs_once_per_trigger() {
        let runtime = Runtime::new();
        let state = runtime.wrap(&Container::from_entries([("count", 0)]));

        let observed = state.clone();
        let effect = runtime.effect(move || {
            let count = observed.get("count").as_i64().unwrap_or_default();
            observed.set("count", count + 1).unwrap();
        });

        assert_eq!(effect.run_count(), 1);
        assert_eq!(state.get("count"), Value::from(1));

        state.set("count", 10).unwrap();
        assert_eq!(effect.run_count(), 2);
        assert_eq!(state.get("count"), Value::from(11));
    }

    #[test]
    fn scheduler_replaces_rerun() {
        let runtime = Runtime::new();
        let state = runtime.wrap(&Container::from_entries([("n", 1)]));
        let scheduled = Arc::new(AtomicI32::new(0));

        let (observed, scheduled_clone) = (state.clone(), scheduled.clone());
        let effect = runtime.effect_with_options(
            move || {
                observed.get("n");
            },
            EffectOptions::new().with_scheduler(move |_| {
                scheduled_clone.fetch_add(1, Ordering::SeqCst);
            }),
        );

        state.set("n", 2).unwrap();
        state.set("n", 3).unwrap();

        assert_eq!(scheduled.load(Ordering::SeqCst), 2);
        assert_eq!(effect.run_count(), 1);
    }

    #[test]
    fn stopped_effect_does_not_run() {
        let runtime = Runtime::new();
        let state = runtime.wrap(&Container::from_entries([("n", 1)]));

        let observed = state.clone();
        let effect = runtime.effect(move || {
            observed.get("n");
        });

        effect.stop();
        assert!(!effect.is_active());
        assert_eq!(effect.dependency_count(), 0);

        state.set("n", 2).unwrap();
        assert_eq!(effect.run(), None);
        assert_eq!(effect.run_count(), 1);
    }

    #[test]
    fn panicking_run_restores_stack() {
        let runtime = Runtime::new();
        let effect = runtime.effect_with_options(|| panic!("boom"), EffectOptions::new().lazy());

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| effect.run()));

        assert!(result.is_err());
        assert_eq!(runtime.stack_depth(), 0);
        assert!(runtime.active_effect().is_none());
    }

    #[test]
    fn effect_clone_shares_state() {
        let runtime = Runtime::new();
        let effect1 = runtime.effect(|| {});
        let effect2 = effect1.clone();

        // Same ID
        assert_eq!(effect1.id(), effect2.id());

        effect1.run();
        assert_eq!(effect2.run_count(), 2);

        // Shared stop state
        effect1.stop();
        assert!(!effect2.is_active());
    }
}
