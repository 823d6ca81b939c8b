//! Error types.
//!
//! Everything here is a recoverable policy violation: the operation that
//! produced it was dropped, a warning was logged, and state is unchanged.
//! Faults inside user computations are panics and never show up here.

use thiserror::Error;

use crate::value::Key;

/// Result alias used throughout the crate.
pub type ReactiveResult<T> = Result<T, ReactiveError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReactiveError {
    /// A write went through a read-only facade.
    #[error("{target} is readonly, cannot set `{key}`")]
    ReadOnly {
        /// JSON rendering of the target at the time of the write.
        target: String,
        key: Key,
    },

    /// An array length was set to something that is not a valid length.
    #[error("invalid array length: {value}")]
    InvalidLength { value: String },

    /// A write would have grown an array past the configured limit.
    #[error("array length {length} exceeds the limit of {limit}")]
    ArrayTooLong { length: usize, limit: usize },

    /// A computed built from a bare getter was written to.
    #[error("computed value is readonly")]
    ComputedWithoutSetter,

    /// A computed read itself before it ever produced a value.
    #[error("computed value read itself while computing its first value")]
    CyclicComputed,

    /// A runtime configuration could not be parsed.
    #[error("invalid runtime configuration: {0}")]
    Config(String),
}

impl From<serde_json::Error> for ReactiveError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(err.to_string())
    }
}
