//! trueno-sssp: multi-device single-source shortest paths
//!
//! # Overview
//!
//! trueno-sssp keeps the per-device state of a delta-stepping SSSP run and the
//! functors a bulk-synchronous traversal engine calls for every frontier edge.
//! The graph is partitioned across a set of devices; each device owns a slice
//! of the vertices plus halo copies of the remote vertices its edges reach.
//!
//! # Quick Start
//!
//! ```
//! use trueno_sssp::{
//!     CsrGraph, DeviceMemoryLimits, DeviceSet, Enactor, FrontierType, NodeId, Problem,
//!     SsspConfig,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let edges = vec![
//!     (NodeId(0), NodeId(1), 2.0),
//!     (NodeId(0), NodeId(2), 5.0),
//!     (NodeId(1), NodeId(2), 1.0),
//!     (NodeId(2), NodeId(3), 1.0),
//! ];
//! let graph = CsrGraph::from_edge_list(&edges)?;
//!
//! // Two simulated devices, predecessor tracking on
//! let devices = DeviceSet::new(2, DeviceMemoryLimits::default());
//! let mut problem = Problem::new(devices, SsspConfig::default().with_mark_paths(true))?;
//! problem.init(&graph)?;
//! problem.reset(NodeId(0), FrontierType::Mixed, 2.0)?;
//!
//! Enactor::new(&mut problem)?.enact()?;
//!
//! let result = problem.extract_result()?;
//! assert_eq!(result.distance(NodeId(3)), Some(4.0));
//! assert_eq!(
//!     result.path_to(NodeId(3)),
//!     Some(vec![NodeId(0), NodeId(1), NodeId(2), NodeId(3)])
//! );
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - **Storage**: CSR (Compressed Sparse Row) input graph
//! - **Devices**: simulated devices with a memory ledger and host/device buffers
//! - **Partitioning**: random, block, round-robin or explicit vertex ownership
//! - **SSSP**: data slices, problem lifecycle, relaxation and priority functors,
//!   reference enactor and CPU validation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod device;
pub mod error;
pub mod partition;
pub mod sssp;
pub mod storage;

// Re-export core types
pub use config::{GatherPolicy, SsspConfig, ENABLE_IDEMPOTENCE};
pub use device::{
    AssociateKind, AssociateRegistry, Device, DeviceContext, DeviceId, DeviceMemoryLimits,
    DeviceSet, DualBuffer, Location,
};
pub use error::{DeviceError, Result, SsspError};
pub use partition::{partition_graph, PartitionMethod, PartitionTable, Partitioner, SubGraph};
pub use sssp::{
    dijkstra, validate, DataSlice, EdgeRef, EnactStats, Enactor, FrontierType, Functor,
    GatherReport, PriorityFunctor, Problem, ProblemState, SsspFunctor, SsspResult,
};
pub use storage::{CsrGraph, NodeId};
