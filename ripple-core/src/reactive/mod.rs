//! Reactive Primitives
//!
//! This module implements the core reactive system: facades, refs, computeds
//! and effects. These primitives form the foundation of Ripple's
//! fine-grained reactivity.
//!
//! # Concepts
//!
//! ## Facades
//!
//! A Facade is an observed view of a container. When a key is read through a
//! facade while an effect is running, the effect is subscribed to that key.
//! When a key is written through it, every subscriber of the key is
//! notified. Facades come in four kinds: deep or shallow, writable or
//! read-only.
//!
//! ## Refs
//!
//! A Ref is a reactive box around a single value. It behaves like a facade
//! with exactly one key.
//!
//! ## Computeds
//!
//! A Computed is a derived value that caches its result. It re-evaluates only
//! when one of its dependencies changed and it is read again.
//!
//! ## Effects
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change.
//!
//! # Implementation Notes
//!
//! Every primitive belongs to a [`Runtime`], which owns the dependency graph
//! and the stack of running effects. When a facade or ref is read, the
//! runtime checks whether an effect is running and, if so, records the
//! dependency.
//!
//! This approach (sometimes called "automatic dependency tracking" or
//! "transparent reactivity") is used by SolidJS, Vue 3, and Leptos.

mod cache;
mod computed;
mod context;
mod effect;
mod facade;
mod refs;
mod runtime;
pub(crate) mod subscriber;

pub use computed::Computed;
pub use effect::{Effect, EffectOptions};
pub use facade::{Facade, FacadeFlags, WriteOutcome};
pub use refs::{to_ref, to_refs, PropertyRef, Ref, RefSource, Refs};
pub use runtime::Runtime;
pub use subscriber::{Scheduler, Subscriber, SubscriberHandle, SubscriberId};
