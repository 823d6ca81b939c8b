//! Graph Targets
//!
//! A target is anything with tracked keys: a container, a ref or a computed.
//! The graph refers to targets by id and holds only a weak anchor to the
//! owning allocation, so tracking never extends a target's lifetime.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Weak;

/// Unique identifier for a tracked target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(u64);

impl TargetId {
    /// Generate a new unique target ID.
    ///
    /// Uses an atomic counter so ids stay unique across runtimes and threads.
    pub(crate) fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What the tracker and the propagation engine need to know about a target.
#[derive(Clone)]
pub(crate) struct Target {
    pub(crate) id: TargetId,
    pub(crate) is_array: bool,
    anchor: Weak<dyn Any + Send + Sync>,
}

impl Target {
    pub(crate) fn new(id: TargetId, is_array: bool, anchor: Weak<dyn Any + Send + Sync>) -> Self {
        Self { id, is_array, anchor }
    }

    pub(crate) fn anchor(&self) -> Weak<dyn Any + Send + Sync> {
        self.anchor.clone()
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Target")
            .field("id", &self.id)
            .field("is_array", &self.is_array)
            .field("released", &(self.anchor.strong_count() == 0))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn target_ids_are_unique() {
        let id1 = TargetId::next();
        let id2 = TargetId::next();
        assert_ne!(id1, id2);
        assert!(id2.raw() > id1.raw());
    }

    #[test]
    fn anchor_does_not_keep_target_alive() {
        let owner: Arc<dyn Any + Send + Sync> = Arc::new(5u8);
        let target = Target::new(TargetId::next(), false, Arc::downgrade(&owner));

        assert_eq!(target.anchor().strong_count(), 1);
        drop(owner);
        assert_eq!(target.anchor().strong_count(), 0);
    }
}
