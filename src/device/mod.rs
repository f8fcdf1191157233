//! Device layer
//!
//! Based on the host/device buffer model of Gunrock (Wang et al., ACM `ToPC`
//! 2017): every per-vertex and per-edge array has a host copy and a device copy
//! moved explicitly between the two.
//!
//! # Architecture
//!
//! - `context`: device registry and explicit device selection
//! - `memory`: memory limits and allocation ledger
//! - `buffer`: dual-location buffers with atomic device words
//! - `associate`: which arrays travel with halo vertices

mod associate;
mod buffer;
mod context;
mod memory;

pub use associate::{AssociateKind, AssociateRegistry};
pub use buffer::{DeviceArray, DeviceWord, DualBuffer, Location, OrderedWord};
pub use context::{Device, DeviceContext, DeviceId, DeviceSet};
pub use memory::{DeviceMemoryLimits, MemoryStats, DEFAULT_DEVICE_MEMORY};
