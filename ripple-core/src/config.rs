//! Runtime configuration.

use serde::{Deserialize, Serialize};

use crate::error::ReactiveResult;

/// Largest array length a write may produce unless configured otherwise.
pub const DEFAULT_MAX_ARRAY_LENGTH: usize = 1 << 24;

/// Knobs for a [`Runtime`](crate::reactive::Runtime).
///
/// Every field has a default, so a partial JSON document is enough:
///
/// ```rust
/// use ripple_core::RuntimeConfig;
///
/// let config = RuntimeConfig::from_json_str(r#"{ "prune_stale_dependencies": false }"#).unwrap();
/// assert!(!config.prune_stale_dependencies);
/// assert_eq!(config.sweep_interval, 256);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Drop an effect's subscriptions before each run so that only what the
    /// latest run read stays subscribed. Turning this off keeps every
    /// subscription an effect ever made.
    pub prune_stale_dependencies: bool,

    /// Number of facade insertions between two sweeps of released targets.
    /// Zero disables automatic sweeping; `Runtime::sweep` still works.
    pub sweep_interval: usize,

    /// Arrays are stored densely; writes that would grow one past this many
    /// elements are rejected.
    pub max_array_length: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            prune_stale_dependencies: true,
            sweep_interval: 256,
            max_array_length: DEFAULT_MAX_ARRAY_LENGTH,
        }
    }
}

impl RuntimeConfig {
    /// Parse a configuration from JSON.
    pub fn from_json_str(source: &str) -> ReactiveResult<Self> {
        Ok(serde_json::from_str(source)?)
    }
}
