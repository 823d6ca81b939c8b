//! Subscriber types for the reactive system.
//!
//! A Subscriber is any computation that can be notified when data it read
//! changes. Effects and the effect behind every computed are subscribers.
//! The graph stores them type-erased as [`SubscriberHandle`]s.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Unique identifier for a subscriber.
///
/// Each subscriber gets a unique, increasing ID when created. This ID is used
/// to track dependencies and avoid duplicate subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    ///
    /// Uses an atomic counter to ensure uniqueness across threads.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "effect#{}", self.0)
    }
}

/// Custom notification handler for a subscriber.
///
/// When present, propagation calls it with the subscriber instead of running
/// the subscriber. Deferring, batching or dropping the run is up to it.
pub type Scheduler = Arc<dyn Fn(&SubscriberHandle) + Send + Sync>;

/// A computation the graph can notify.
pub trait Subscriber: Send + Sync {
    /// Get the subscriber's unique ID.
    fn id(&self) -> SubscriberId;

    /// The custom notification handler, if any.
    fn scheduler(&self) -> Option<Scheduler>;

    /// Re-run the computation, discarding its result.
    fn run_erased(self: Arc<Self>);
}

/// A type-erased, shared handle to a subscriber.
///
/// Equality and hashing go by [`SubscriberId`].
#[derive(Clone)]
pub struct SubscriberHandle {
    inner: Arc<dyn Subscriber>,
}

impl SubscriberHandle {
    pub fn new(inner: Arc<dyn Subscriber>) -> Self {
        Self { inner }
    }

    pub fn id(&self) -> SubscriberId {
        self.inner.id()
    }

    pub fn has_scheduler(&self) -> bool {
        self.inner.scheduler().is_some()
    }

    /// Run the subscriber now, ignoring its scheduler.
    pub fn run(&self) {
        Arc::clone(&self.inner).run_erased();
    }

    /// Deliver a change notification: hand the subscriber to its scheduler if
    /// it has one, otherwise run it.
    pub fn notify(&self) {
        match self.inner.scheduler() {
            Some(scheduler) => scheduler(self),
            None => self.run(),
        }
    }
}

impl PartialEq for SubscriberHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for SubscriberHandle {}

impl Hash for SubscriberHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl fmt::Debug for SubscriberHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriberHandle")
            .field("id", &self.id())
            .field("has_scheduler", &self.has_scheduler())
            .finish()
    }
}
