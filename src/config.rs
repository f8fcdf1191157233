//! Problem configuration
//!
//! # Example
//!
//! ```
//! use trueno_sssp::{GatherPolicy, PartitionMethod, SsspConfig};
//!
//! let config = SsspConfig::default()
//!     .with_mark_paths(true)
//!     .with_partition_method(PartitionMethod::Block)
//!     .with_gather_policy(GatherPolicy::Strict);
//! assert!(config.validate().is_ok());
//! assert_eq!(config.delta_factor, 16.0);
//! ```

use crate::error::{Result, SsspError};
use crate::partition::PartitionMethod;

/// Idempotent relaxation (skipping the atomic min in favor of a visited
/// filter) is never enabled: every relaxation is exact.
pub const ENABLE_IDEMPOTENCE: bool = false;

/// Default bucket-width multiplier
pub const DEFAULT_DELTA_FACTOR: f32 = 16.0;

/// Default frontier over-provisioning factor
pub const DEFAULT_QUEUE_SIZING: f64 = 2.0;

/// Default halo buffer over-provisioning factor
pub const DEFAULT_IN_SIZING: f64 = 1.0;

/// What `extract` does with a partition/conversion entry that is out of range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GatherPolicy {
    /// Log the entry, skip the vertex and keep gathering
    #[default]
    BestEffort,
    /// Fail the call on the first bad entry
    Strict,
}

/// SSSP problem configuration
#[derive(Debug, Clone, PartialEq)]
pub struct SsspConfig {
    /// Bucket-width multiplier for delta-stepping
    pub delta_factor: f32,

    /// Frontier queue over-provisioning (× local node/edge count)
    pub queue_sizing: f64,

    /// Halo staging over-provisioning (× halo vertex count)
    pub in_sizing: f64,

    /// Partitioner used when more than one device is present
    pub partition_method: PartitionMethod,

    /// Track predecessors
    pub mark_paths: bool,

    /// Handling of inconsistent table entries during `extract`
    pub gather_policy: GatherPolicy,
}

impl Default for SsspConfig {
    fn default() -> Self {
        Self {
            delta_factor: DEFAULT_DELTA_FACTOR,
            queue_sizing: DEFAULT_QUEUE_SIZING,
            in_sizing: DEFAULT_IN_SIZING,
            partition_method: PartitionMethod::default(),
            mark_paths: false,
            gather_policy: GatherPolicy::default(),
        }
    }
}

impl SsspConfig {
    /// Set the bucket-width multiplier
    #[must_use]
    pub fn with_delta_factor(mut self, delta_factor: f32) -> Self {
        self.delta_factor = delta_factor;
        self
    }

    /// Set the frontier over-provisioning factor
    #[must_use]
    pub fn with_queue_sizing(mut self, queue_sizing: f64) -> Self {
        self.queue_sizing = queue_sizing;
        self
    }

    /// Set the halo buffer over-provisioning factor
    #[must_use]
    pub fn with_in_sizing(mut self, in_sizing: f64) -> Self {
        self.in_sizing = in_sizing;
        self
    }

    /// Set the partitioner
    #[must_use]
    pub fn with_partition_method(mut self, method: PartitionMethod) -> Self {
        self.partition_method = method;
        self
    }

    /// Enable or disable predecessor tracking
    #[must_use]
    pub fn with_mark_paths(mut self, mark_paths: bool) -> Self {
        self.mark_paths = mark_paths;
        self
    }

    /// Set the gather policy
    #[must_use]
    pub fn with_gather_policy(mut self, policy: GatherPolicy) -> Self {
        self.gather_policy = policy;
        self
    }

    /// Check every knob is in range
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` naming the first offending option
    pub fn validate(&self) -> Result<()> {
        if !self.delta_factor.is_finite() || self.delta_factor < 0.0 {
            return Err(SsspError::InvalidConfig(format!(
                "delta_factor must be finite and >= 0, got {}",
                self.delta_factor
            )));
        }
        validate_sizing("queue_sizing", self.queue_sizing, 1.0)?;
        validate_sizing("in_sizing", self.in_sizing, 0.0)?;
        Ok(())
    }
}

/// Check a queue sizing factor and return it
///
/// # Errors
///
/// Returns `InvalidConfig` if `value` is not finite or below `min`
pub(crate) fn validate_sizing(name: &str, value: f64, min: f64) -> Result<f64> {
    if !value.is_finite() || value < min {
        return Err(SsspError::InvalidConfig(format!(
            "{name} must be finite and >= {min}, got {value}"
        )));
    }
    Ok(value)
}

/// `ceil(count × factor)`
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub(crate) fn scaled(count: usize, factor: f64) -> usize {
    (count as f64 * factor).ceil() as usize
}
