//! Dependency Graph
//!
//! This module implements the subscription graph that records which
//! subscribers read which keys of which targets, and the propagation step
//! that turns a write into the set of subscribers to notify.
//!
//! # Overview
//!
//! The graph has three levels:
//!
//! - Targets: containers, refs and computeds, identified by [`TargetId`]
//! - Keys: the properties of a target that were read while tracking
//! - Subscribers: the effects that read them
//!
//! # Design Decisions
//!
//! 1. Targets are keyed by id and held through weak anchors, so the graph
//!    never keeps data alive. Released targets are dropped by a sweep.
//!
//! 2. Subscriber sets and key maps are insertion-ordered, which makes the
//!    notification order deterministic (first subscribed, first notified).
//!
//! 3. The graph keeps a reverse index from subscriber to the keys it read,
//!    so stale subscriptions can be removed without scanning every target.

mod deps;
mod target;
mod trigger;

pub use target::TargetId;
pub use trigger::TriggerKind;

pub(crate) use deps::DependencyGraph;
pub(crate) use target::Target;
pub(crate) use trigger::collect;
