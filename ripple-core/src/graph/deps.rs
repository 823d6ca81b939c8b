//! Dependency Tracker
//!
//! The three-level subscription structure: target -> key -> subscribers.
//!
//! Entries appear lazily, the first time a key of a target is read while a
//! subscriber is active. A key whose subscriber set becomes empty is removed,
//! and so is a target with no keys left, so "tracked" and "present" are the
//! same thing.
//!
//! The graph also keeps the reverse index (subscriber -> what it read) so a
//! subscriber's subscriptions can be dropped in one call, either before it
//! re-runs or when it is stopped.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Weak;

use indexmap::{IndexMap, IndexSet};

use super::target::{Target, TargetId};
use crate::reactive::{SubscriberHandle, SubscriberId};
use crate::value::Key;

/// Subscribers of one key, in subscription order.
pub(crate) type Dep = IndexMap<SubscriberId, SubscriberHandle>;

struct TargetEntry {
    anchor: Weak<dyn Any + Send + Sync>,
    keys: IndexMap<Key, Dep>,
}

/// The subscription graph.
#[derive(Default)]
pub(crate) struct DependencyGraph {
    targets: HashMap<TargetId, TargetEntry>,
    reads: HashMap<SubscriberId, IndexSet<(TargetId, Key)>>,
}

impl DependencyGraph {
    /// Create a new empty graph.
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Subscribe `subscriber` to `key` of `target`.
    ///
    /// Returns false if it was already subscribed.
    pub(crate) fn track(&mut self, target: &Target, key: &Key, subscriber: &SubscriberHandle) -> bool {
        let entry = self.targets.entry(target.id).or_insert_with(|| TargetEntry {
            anchor: target.anchor(),
            keys: IndexMap::new(),
        });
        let dep = entry.keys.entry(key.clone()).or_default();
        if dep.contains_key(&subscriber.id()) {
            return false;
        }
        dep.insert(subscriber.id(), subscriber.clone());

        self.reads
            .entry(subscriber.id())
            .or_default()
            .insert((target.id, key.clone()));
        true
    }

    /// All tracked keys of a target with their subscribers.
    pub(crate) fn keys_of(&self, target: TargetId) -> Option<&IndexMap<Key, Dep>> {
        self.targets.get(&target).map(|entry| &entry.keys)
    }

    /// IDs of the subscribers of `key` on `target`, in subscription order.
    pub(crate) fn subscribers(&self, target: TargetId, key: &Key) -> Vec<SubscriberId> {
        self.keys_of(target)
            .and_then(|keys| keys.get(key))
            .map(|dep| dep.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Number of `(target, key)` pairs a subscriber is subscribed to.
    pub(crate) fn read_count(&self, subscriber: SubscriberId) -> usize {
        self.reads.get(&subscriber).map_or(0, IndexSet::len)
    }

    /// Get the total number of tracked targets.
    pub(crate) fn target_count(&self) -> usize {
        self.targets.len()
    }

    /// Remove every subscription of a subscriber.
    ///
    /// Returns how many subscriptions were removed.
    pub(crate) fn clear_subscriber(&mut self, subscriber: SubscriberId) -> usize {
        let Some(reads) = self.reads.remove(&subscriber) else {
            return 0;
        };

        for (target, key) in &reads {
            let Some(entry) = self.targets.get_mut(target) else {
                continue;
            };
            if let Some(dep) = entry.keys.get_mut(key) {
                dep.shift_remove(&subscriber);
                if dep.is_empty() {
                    entry.keys.shift_remove(key);
                }
            }
            if entry.keys.is_empty() {
                self.targets.remove(target);
            }
        }

        reads.len()
    }

    /// Drop every target whose owner has been released.
    ///
    /// Returns how many targets were removed and the subscriber handles the
    /// removed entries held. Dropping one may release the last reference to
    /// an effect and run arbitrary destructors, so the runtime drops them only
    /// after it has let go of the graph lock.
    pub(crate) fn sweep_released(&mut self) -> (usize, Vec<SubscriberHandle>) {
        let released: Vec<TargetId> = self
            .targets
            .iter()
            .filter(|(_, entry)| entry.anchor.strong_count() == 0)
            .map(|(id, _)| *id)
            .collect();

        let mut retired = Vec::new();
        for id in &released {
            let Some(entry) = self.targets.remove(id) else {
                continue;
            };
            for (key, dep) in entry.keys {
                for (subscriber, handle) in dep {
                    if let Some(reads) = self.reads.get_mut(&subscriber) {
                        reads.shift_remove(&(*id, key.clone()));
                        if reads.is_empty() {
                            self.reads.remove(&subscriber);
                        }
                    }
                    retired.push(handle);
                }
            }
        }

        (released.len(), retired)
    }
}
