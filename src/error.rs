//! Error taxonomy
//!
//! Device-facing failures (`AllocationFailure`, `TransferFailure`,
//! `DeviceSelectFailure`) are fail-fast: the first one aborts the current call
//! and reaches the caller unchanged. `IndexOutOfRange` is raised while
//! gathering results and is only fatal under [`GatherPolicy::Strict`].
//!
//! [`GatherPolicy::Strict`]: crate::config::GatherPolicy::Strict

use crate::device::DeviceId;
use thiserror::Error;

/// Errors raised by device-level operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    /// Device memory exhausted
    #[error("Allocation of {requested} bytes for `{buffer}` failed on device {device} ({available} bytes available)")]
    AllocationFailure {
        /// Device the allocation was issued on
        device: DeviceId,
        /// Buffer name
        buffer: &'static str,
        /// Requested size in bytes
        requested: usize,
        /// Bytes still free on the device
        available: usize,
    },

    /// Host/device copy failed
    #[error("Transfer of `{buffer}` failed on device {device}: {reason}")]
    TransferFailure {
        /// Device the transfer was issued on
        device: DeviceId,
        /// Buffer name
        buffer: &'static str,
        /// What went wrong
        reason: String,
    },

    /// Device index is invalid or the device is unavailable
    #[error("Cannot select device {device}: {reason}")]
    DeviceSelectFailure {
        /// Requested device
        device: DeviceId,
        /// What went wrong
        reason: String,
    },

    /// A buffer was accessed at a location where it is not allocated
    #[error("Buffer `{buffer}` is not allocated on the {location}")]
    BufferMissing {
        /// Buffer name
        buffer: &'static str,
        /// `host` or `device`
        location: &'static str,
    },
}

/// Errors raised by the SSSP problem manager
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SsspError {
    /// Device-level failure, surfaced unchanged
    #[error(transparent)]
    Device(#[from] DeviceError),

    /// Partition or conversion table entry outside its declared bounds
    #[error("Vertex {vertex} maps to device {device}, local index {local}, which is out of range")]
    IndexOutOfRange {
        /// Global vertex id
        vertex: u32,
        /// Owning device recorded in the partition table
        device: u32,
        /// Local index recorded in the conversion table
        local: u32,
    },

    /// Source vertex outside the graph
    #[error("Source vertex {vertex} out of bounds (graph has {num_nodes} nodes)")]
    InvalidSource {
        /// Requested source
        vertex: u32,
        /// Number of nodes in the graph
        num_nodes: usize,
    },

    /// Input graph cannot be processed
    #[error("Invalid graph: {0}")]
    InvalidGraph(String),

    /// Configuration value outside its allowed range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Operation called in the wrong lifecycle state
    #[error("Cannot {operation} while problem is {state}")]
    InvalidState {
        /// Attempted operation
        operation: &'static str,
        /// Current lifecycle state
        state: &'static str,
    },

    /// Caller-supplied output buffer has the wrong length
    #[error("Output buffer `{name}` has length {actual}, expected {expected}")]
    OutputLength {
        /// Buffer name
        name: &'static str,
        /// Expected length
        expected: usize,
        /// Supplied length
        actual: usize,
    },
}

/// Result alias for problem-level operations
pub type Result<T, E = SsspError> = std::result::Result<T, E>;
