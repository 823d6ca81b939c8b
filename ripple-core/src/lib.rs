//! Ripple Core
//!
//! This crate provides the core runtime for the Ripple reactive state
//! library. It implements:
//!
//! - Observed views over shared objects and arrays (facades)
//! - Automatic dependency tracking between reads and running effects
//! - Change propagation, including array length and index semantics
//! - Derived values (computeds) and single-value cells (refs)
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `value`: The dynamic data model: values, keys and raw containers
//! - `graph`: The dependency graph and the propagation rules
//! - `reactive`: Facades, refs, computeds, effects and the runtime
//! - `config` / `error`: Runtime configuration and error types
//!
//! # Example
//!
//! ```rust
//! use std::sync::atomic::{AtomicI64, Ordering};
//! use std::sync::Arc;
//!
//! use ripple_core::Runtime;
//! use serde_json::json;
//!
//! let runtime = Runtime::new();
//!
//! // Wrap some state
//! let state = runtime.reactive(json!({ "count": 1 })).into_facade().unwrap();
//!
//! // Create a derived value
//! let doubled = {
//!     let state = state.clone();
//!     runtime.computed(move || state.get("count").as_i64().unwrap_or_default() * 2)
//! };
//!
//! // Create an effect
//! let last_seen = Arc::new(AtomicI64::new(0));
//! let _effect = {
//!     let (doubled, last_seen) = (doubled.clone(), last_seen.clone());
//!     runtime.effect(move || last_seen.store(doubled.get(), Ordering::SeqCst))
//! };
//!
//! // Update the state; the effect runs again
//! state.set("count", 5).unwrap();
//! assert_eq!(last_seen.load(Ordering::SeqCst), 10);
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod reactive;
pub mod value;

pub use config::RuntimeConfig;
pub use error::{ReactiveError, ReactiveResult};
pub use graph::{TargetId, TriggerKind};
pub use reactive::{
    to_ref, to_refs, Computed, Effect, EffectOptions, Facade, FacadeFlags, PropertyRef, Ref,
    RefSource, Refs, Runtime, Scheduler, SubscriberHandle, SubscriberId, WriteOutcome,
};
pub use value::{has_changed, Container, Key, Value};
