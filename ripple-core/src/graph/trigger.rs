//! Propagation
//!
//! Decides which subscribers a write must notify. The algorithm works in one
//! pass over the target's tracked keys and produces a deduplicated list in
//! first-subscription order:
//!
//! 1. Writing `length` on an array notifies `length` subscribers and the
//!    subscribers of every index at or beyond the new length, since those
//!    slots no longer exist.
//! 2. Any other write notifies the subscribers of exactly that key.
//! 3. Adding an index to an array also notifies `length` subscribers, since
//!    the length grew.
//!
//! Invoking the collected subscribers is the runtime's job; this module only
//! reads the graph so the caller can release it before any user code runs.

use indexmap::IndexMap;

use super::deps::{Dep, DependencyGraph};
use super::target::Target;
use crate::reactive::{SubscriberHandle, SubscriberId};
use crate::value::{Key, Value};

/// How a write changed its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerKind {
    /// The key did not exist before (or the index was past the end).
    Add,
    /// An existing key got a new value.
    Edit,
}

/// Collect the subscribers to notify for a write of `new_value` to `key`.
pub(crate) fn collect(
    graph: &DependencyGraph,
    kind: TriggerKind,
    target: &Target,
    key: &Key,
    new_value: &Value,
) -> Vec<SubscriberHandle> {
    let Some(keys) = graph.keys_of(target.id) else {
        return Vec::new();
    };

    let mut collected: IndexMap<SubscriberId, SubscriberHandle> = IndexMap::new();
    let mut add = |dep: &Dep| {
        for (id, subscriber) in dep {
            collected.entry(*id).or_insert_with(|| subscriber.clone());
        }
    };

    if target.is_array && key.is_length() {
        let new_length = new_value.as_usize();
        for (tracked, dep) in keys {
            let truncated = matches!(
                (tracked.as_index(), new_length),
                (Some(index), Some(length)) if index >= length
            );
            if tracked.is_length() || truncated {
                add(dep);
            }
        }
    } else {
        if let Some(dep) = keys.get(key) {
            add(dep);
        }
        if kind == TriggerKind::Add && target.is_array && key.is_integer_key() {
            if let Some(dep) = keys.get(&Key::length()) {
                add(dep);
            }
        }
    }

    collected.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::TargetId;
    use crate::reactive::subscriber::tests::CountingSubscriber;
    use std::any::Any;
    use std::sync::Arc;

    struct Fixture {
        graph: DependencyGraph,
        _owner: Arc<dyn Any + Send + Sync>,
        target: Target,
    }

    impl Fixture {
        fn new(is_array: bool) -> Self {
            let owner: Arc<dyn Any + Send + Sync> = Arc::new(());
            let target = Target::new(TargetId::next(), is_array, Arc::downgrade(&owner));
            Self {
                graph: DependencyGraph::new(),
                _owner: owner,
                target,
            }
        }

        fn subscribe(&mut self, key: impl Into<Key>) -> SubscriberHandle {
            let (_, handle) = CountingSubscriber::handle();
            self.graph.track(&self.target, &key.into(), &handle);
            handle
        }

        fn collect(&self, kind: TriggerKind, key: impl Into<Key>, value: impl Into<Value>) -> Vec<SubscriberId> {
            collect(&self.graph, kind, &self.target, &key.into(), &value.into())
                .iter()
                .map(SubscriberHandle::id)
                .collect()
        }
    }

    #[test]
    fn untracked_target_collects_nothing() {
        let fixture = Fixture::new(false);
        assert!(fixture.collect(TriggerKind::Edit, "a", 1).is_empty());
    }

    #[test]
    fn edit_collects_exact_key_only() {
        let mut fixture = Fixture::new(false);
        let a = fixture.subscribe("a");
        let _b = fixture.subscribe("b");

        assert_eq!(fixture.collect(TriggerKind::Edit, "a", 1), vec![a.id()]);
    }

    #[test]
    fn subscriber_on_several_keys_is_collected_once() {
        let mut fixture = Fixture::new(true);
        let (_, both) = CountingSubscriber::handle();
        fixture.graph.track(&fixture.target, &Key::from(3usize), &both);
        fixture.graph.track(&fixture.target, &Key::length(), &both);

        assert_eq!(fixture.collect(TriggerKind::Add, 3usize, 1), vec![both.id()]);
    }

    #[test]
    fn length_truncation_collects_removed_indices() {
        let mut fixture = Fixture::new(true);
        let index0 = fixture.subscribe(0usize);
        let index1 = fixture.subscribe(1usize);
        let index2 = fixture.subscribe(2usize);
        let length = fixture.subscribe("length");

        let collected = fixture.collect(TriggerKind::Edit, "length", 1);

        assert!(!collected.contains(&index0.id()));
        assert!(collected.contains(&index1.id()));
        assert!(collected.contains(&index2.id()));
        assert!(collected.contains(&length.id()));
        assert_eq!(collected.len(), 3);
    }

    #[test]
    fn adding_an_index_collects_length() {
        let mut fixture = Fixture::new(true);
        let length = fixture.subscribe("length");

        assert_eq!(fixture.collect(TriggerKind::Add, 5usize, "x"), vec![length.id()]);
        assert!(fixture.collect(TriggerKind::Edit, 0usize, "x").is_empty());
    }

    #[test]
    fn length_on_objects_is_an_ordinary_key() {
        let mut fixture = Fixture::new(false);
        let zero = fixture.subscribe(0usize);
        let length = fixture.subscribe("length");

        assert_eq!(fixture.collect(TriggerKind::Edit, "length", 0), vec![length.id()]);
        assert!(!fixture.collect(TriggerKind::Add, "1", 0).contains(&zero.id()));
    }
}
