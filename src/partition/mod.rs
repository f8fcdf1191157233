//! Graph partitioning across devices
//!
//! Each vertex is owned by exactly one device. A device's subgraph holds its
//! owned vertices (local indices `0..num_owned`, in ascending global order)
//! followed by halo copies of remote vertices its edges point at. Only owned
//! vertices have outgoing edges locally.
//!
//! # Example
//!
//! ```
//! use trueno_sssp::{partition_graph, CsrGraph, NodeId, PartitionMethod};
//!
//! let edges = vec![(NodeId(0), NodeId(1), 1.0), (NodeId(1), NodeId(2), 1.0)];
//! let graph = CsrGraph::from_edge_list(&edges).unwrap();
//!
//! let (table, subgraphs) = partition_graph(&graph, 2, &PartitionMethod::Block).unwrap();
//! assert_eq!(subgraphs.len(), 2);
//! assert_eq!(table.num_nodes(), 3);
//! ```

mod subgraph;
mod table;

pub use subgraph::{HaloVertex, SubGraph};
pub use table::PartitionTable;

use crate::error::{Result, SsspError};
use crate::storage::CsrGraph;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Seed used by the default random partitioner
pub const DEFAULT_PARTITION_SEED: u64 = 0x5353_5350;

/// How vertices are assigned to devices
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartitionMethod {
    /// Uniformly random owner per vertex, reproducible from `seed`
    Random {
        /// RNG seed
        seed: u64,
    },
    /// Contiguous ranges of roughly equal size
    Block,
    /// Vertex `v` goes to device `v % num_devices`
    RoundRobin,
    /// Caller-supplied owner per vertex
    Explicit(Vec<u32>),
}

impl Default for PartitionMethod {
    fn default() -> Self {
        Self::Random {
            seed: DEFAULT_PARTITION_SEED,
        }
    }
}

/// Assigns an owning device to every vertex
pub trait Partitioner {
    /// Owner of each vertex, indexed by global id
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the assignment cannot be produced
    fn assign(&self, graph: &CsrGraph, num_devices: usize) -> Result<Vec<u32>>;
}

impl Partitioner for PartitionMethod {
    #[allow(clippy::cast_possible_truncation)]
    fn assign(&self, graph: &CsrGraph, num_devices: usize) -> Result<Vec<u32>> {
        if num_devices == 0 {
            return Err(SsspError::InvalidConfig(
                "at least one device is required".to_string(),
            ));
        }

        let n = graph.num_nodes();
        let devices = num_devices as u32;

        let owners = match self {
            Self::Random { seed } => {
                let mut rng = StdRng::seed_from_u64(*seed);
                (0..n).map(|_| rng.gen_range(0..devices)).collect()
            }
            Self::Block => {
                let block = n.div_ceil(num_devices).max(1);
                (0..n).map(|v| (v / block) as u32).collect()
            }
            Self::RoundRobin => (0..n).map(|v| (v % num_devices) as u32).collect(),
            Self::Explicit(owners) => {
                if owners.len() != n {
                    return Err(SsspError::InvalidConfig(format!(
                        "explicit partition has {} entries for {} nodes",
                        owners.len(),
                        n
                    )));
                }
                if let Some(bad) = owners.iter().find(|&&d| d >= devices) {
                    return Err(SsspError::InvalidConfig(format!(
                        "explicit partition names device {bad}, only {num_devices} configured"
                    )));
                }
                owners.clone()
            }
        };

        Ok(owners)
    }
}

/// Partition `graph` over `num_devices` devices
///
/// A single device always receives the whole graph with identity numbering,
/// whatever the method.
///
/// # Errors
///
/// Returns `InvalidConfig` for an unusable partition and `InvalidGraph` if a
/// subgraph cannot be built
pub fn partition_graph(
    graph: &CsrGraph,
    num_devices: usize,
    method: &PartitionMethod,
) -> Result<(PartitionTable, Vec<SubGraph>)> {
    let owners = if num_devices == 1 {
        vec![0; graph.num_nodes()]
    } else {
        method.assign(graph, num_devices)?
    };

    let table = PartitionTable::from_owners(owners, num_devices);
    let subgraphs = (0..num_devices)
        .map(|device| SubGraph::build(graph, &table, device))
        .collect::<Result<Vec<_>>>()?;

    tracing::debug!(
        num_devices,
        method = ?method,
        owned = ?table.owned_counts(),
        halo = ?subgraphs.iter().map(SubGraph::num_halo).collect::<Vec<_>>(),
        "Partitioned graph"
    );

    Ok((table, subgraphs))
}
