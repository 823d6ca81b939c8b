//! Active Effect Stack
//!
//! The stack tracks which computation is currently running. This enables
//! automatic dependency tracking: when a facade or ref is read, the top of
//! the stack is recorded as a subscriber.
//!
//! # Implementation
//!
//! Each runtime owns one stack. Running an effect pushes it and returns a
//! guard; dropping the guard pops it. The guard runs on every exit path,
//! unwinding included, so a panicking computation never leaves a stale
//! subscriber on top.
//!
//! This design supports nested effects: an effect created (and run) inside
//! another one sits above it while it runs, and the outer effect becomes
//! current again as soon as the inner one returns.

use parking_lot::Mutex;
use smallvec::SmallVec;

use super::subscriber::{SubscriberHandle, SubscriberId};

/// The stack of running subscribers.
#[derive(Default)]
pub(crate) struct EffectStack {
    entries: SmallVec<[SubscriberHandle; 8]>,
}

impl EffectStack {
    /// The subscriber new reads are attributed to.
    pub(crate) fn current(&self) -> Option<SubscriberHandle> {
        self.entries.last().cloned()
    }

    /// Whether `id` is running anywhere on the stack.
    pub(crate) fn contains(&self, id: SubscriberId) -> bool {
        self.entries.iter().any(|entry| entry.id() == id)
    }

    pub(crate) fn depth(&self) -> usize {
        self.entries.len()
    }

    fn push(&mut self, subscriber: SubscriberHandle) {
        self.entries.push(subscriber);
    }

    fn pop(&mut self) -> Option<SubscriberHandle> {
        self.entries.pop()
    }
}

/// Guard that pops the stack when dropped.
///
/// This ensures the stack is properly maintained even if the computation
/// panics.
pub(crate) struct ActiveEffect<'a> {
    stack: &'a Mutex<EffectStack>,
    subscriber_id: SubscriberId,
}

impl<'a> ActiveEffect<'a> {
    /// Push `subscriber` and make it current until the guard drops.
    pub(crate) fn enter(stack: &'a Mutex<EffectStack>, subscriber: SubscriberHandle) -> Self {
        let subscriber_id = subscriber.id();
        stack.lock().push(subscriber);
        Self { stack, subscriber_id }
    }
}

impl Drop for ActiveEffect<'_> {
    fn drop(&mut self) {
        let popped = self.stack.lock().pop();

        // Verify we're popping the right entry.
        // This helps catch bugs where guards are dropped out of order.
        if let Some(entry) = popped {
            debug_assert_eq!(
                entry.id(),
                self.subscriber_id,
                "ActiveEffect mismatch: expected {:?}, got {:?}",
                self.subscriber_id,
                entry.id()
            );
        }
    }
}
