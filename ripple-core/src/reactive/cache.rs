//! Identity cache.
//!
//! Maps a container to its facades so that wrapping the same container twice
//! yields the same facade. There is one slot per family: writable facades and
//! read-only facades never share an entry.
//!
//! Entries hold facades weakly. A facade nobody references is gone; the next
//! request creates a fresh one, and `sweep` drops the dead slot.

use std::collections::HashMap;
use std::sync::Weak;

use super::facade::{Facade, FacadeFlags, FacadeInner};
use crate::graph::TargetId;

/// Which cache slot a facade lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Family {
    Mutable,
    ReadOnly,
}

impl Family {
    pub(crate) fn of(flags: FacadeFlags) -> Self {
        if flags.read_only {
            Family::ReadOnly
        } else {
            Family::Mutable
        }
    }
}

pub(crate) struct IdentityCache {
    entries: HashMap<(TargetId, Family), Weak<FacadeInner>>,
    sweep_interval: usize,
    inserts_since_sweep: usize,
}

impl IdentityCache {
    pub(crate) fn new(sweep_interval: usize) -> Self {
        Self {
            entries: HashMap::new(),
            sweep_interval,
            inserts_since_sweep: 0,
        }
    }

    pub(crate) fn get(&self, id: TargetId, family: Family) -> Option<Facade> {
        self.entries.get(&(id, family)).and_then(Facade::upgrade)
    }

    /// Record a new facade. Returns true once every `sweep_interval` inserts.
    pub(crate) fn insert(&mut self, id: TargetId, family: Family, facade: &Facade) -> bool {
        self.entries.insert((id, family), facade.downgrade());
        if self.sweep_interval == 0 {
            return false;
        }
        self.inserts_since_sweep += 1;
        self.inserts_since_sweep >= self.sweep_interval
    }

    /// Drop entries whose facade has been released.
    pub(crate) fn sweep(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, facade| facade.strong_count() > 0);
        self.inserts_since_sweep = 0;
        before - self.entries.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Container;

    fn facade(container: &Container, flags: FacadeFlags) -> Facade {
        Facade::new(container.clone(), flags, Weak::new())
    }

    #[test]
    fn families_have_separate_slots() {
        let mut cache = IdentityCache::new(0);
        let container = Container::object();
        let mutable = facade(&container, FacadeFlags::MUTABLE);
        let read_only = facade(&container, FacadeFlags::READ_ONLY);

        cache.insert(container.id(), Family::Mutable, &mutable);
        cache.insert(container.id(), Family::ReadOnly, &read_only);

        assert!(cache.get(container.id(), Family::Mutable).unwrap().ptr_eq(&mutable));
        assert!(cache.get(container.id(), Family::ReadOnly).unwrap().ptr_eq(&read_only));
        assert_eq!(Family::of(FacadeFlags::SHALLOW_READ_ONLY), Family::ReadOnly);
    }

    #[test]
    fn released_facades_are_not_returned() {
        let mut cache = IdentityCache::new(0);
        let container = Container::object();
        let mutable = facade(&container, FacadeFlags::MUTABLE);
        cache.insert(container.id(), Family::Mutable, &mutable);

        drop(mutable);
        assert!(cache.get(container.id(), Family::Mutable).is_none());
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.sweep(), 1);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn sweep_is_due_every_interval() {
        let mut cache = IdentityCache::new(2);
        let first = Container::object();
        let second = Container::object();
        let a = facade(&first, FacadeFlags::MUTABLE);
        let b = facade(&second, FacadeFlags::MUTABLE);

        assert!(!cache.insert(first.id(), Family::Mutable, &a));
        assert!(cache.insert(second.id(), Family::Mutable, &b));
        cache.sweep();
        assert!(!cache.insert(first.id(), Family::ReadOnly, &a));
    }
}
