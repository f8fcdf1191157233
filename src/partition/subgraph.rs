//! Per-device subgraphs

use super::PartitionTable;
use crate::device::DeviceId;
use crate::error::{Result, SsspError};
use crate::storage::CsrGraph;
use std::collections::HashMap;

/// Remote vertex copied onto a device because a local edge points at it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HaloVertex {
    /// Device owning the vertex
    pub owner: DeviceId,
    /// Local index of the vertex on its owner
    pub remote_index: u32,
}

/// The part of the graph a single device works on
#[derive(Debug, Clone, PartialEq)]
pub struct SubGraph {
    device: DeviceId,
    num_owned: usize,
    /// Local CSR over owned + halo vertices; halo rows are empty
    graph: CsrGraph,
    /// Local index → global vertex id
    original_vertex: Vec<u32>,
    /// Halo slot (local index − `num_owned`) → owner
    halo: Vec<HaloVertex>,
}

impl SubGraph {
    #[allow(clippy::cast_possible_truncation)]
    pub(crate) fn build(graph: &CsrGraph, table: &PartitionTable, device: usize) -> Result<Self> {
        let device_id = DeviceId(device as u32);
        let owners = table.partition();
        let conversion = table.conversion();

        let mut original_vertex: Vec<u32> = (0..graph.num_nodes() as u32)
            .filter(|&v| owners[v as usize] as usize == device)
            .collect();
        let num_owned = original_vertex.len();

        let mut halo = Vec::new();
        let mut halo_slots: HashMap<u32, u32> = HashMap::new();
        let mut row_offsets = Vec::with_capacity(num_owned + 1);
        let mut col_indices = Vec::new();
        let mut edge_weights = Vec::new();
        row_offsets.push(0);

        for local in 0..num_owned {
            let (targets, weights) = graph.adjacency(crate::NodeId(original_vertex[local]));
            for (&target, &weight) in targets.iter().zip(weights) {
                let owner = owners[target as usize];
                let local_target = if owner as usize == device {
                    conversion[target as usize]
                } else {
                    *halo_slots.entry(target).or_insert_with(|| {
                        halo.push(HaloVertex {
                            owner: DeviceId(owner),
                            remote_index: conversion[target as usize],
                        });
                        (num_owned + halo.len() - 1) as u32
                    })
                };
                col_indices.push(local_target);
                edge_weights.push(weight);
            }
            row_offsets.push(col_indices.len() as u32);
        }

        let mut halo_globals: Vec<(u32, u32)> =
            halo_slots.into_iter().map(|(g, l)| (l, g)).collect();
        halo_globals.sort_unstable();
        original_vertex.extend(halo_globals.into_iter().map(|(_, g)| g));

        let last = *row_offsets.last().unwrap_or(&0);
        row_offsets.resize(original_vertex.len() + 1, last);

        let local_graph = CsrGraph::from_csr(row_offsets, col_indices, edge_weights)
            .map_err(|e| SsspError::InvalidGraph(format!("subgraph {device}: {e}")))?;

        Ok(Self {
            device: device_id,
            num_owned,
            graph: local_graph,
            original_vertex,
            halo,
        })
    }

    /// Device this subgraph belongs to
    #[must_use]
    pub const fn device(&self) -> DeviceId {
        self.device
    }

    /// Local CSR (owned + halo vertices)
    #[must_use]
    pub const fn graph(&self) -> &CsrGraph {
        &self.graph
    }

    /// Number of owned vertices
    #[must_use]
    pub const fn num_owned(&self) -> usize {
        self.num_owned
    }

    /// Number of halo vertices
    #[must_use]
    pub fn num_halo(&self) -> usize {
        self.halo.len()
    }

    /// Owned + halo vertex count
    #[must_use]
    pub fn num_nodes(&self) -> usize {
        self.graph.num_nodes()
    }

    /// Local edge count
    #[must_use]
    pub fn num_edges(&self) -> usize {
        self.graph.num_edges()
    }

    /// Local index → global id
    #[must_use]
    pub fn original_vertex(&self) -> &[u32] {
        &self.original_vertex
    }

    /// Owner of a halo vertex given its local index
    #[must_use]
    pub fn halo_owner(&self, local: u32) -> Option<HaloVertex> {
        (local as usize)
            .checked_sub(self.num_owned)
            .and_then(|slot| self.halo.get(slot).copied())
    }

    /// Whether `local` is a halo copy
    #[must_use]
    pub const fn is_halo(&self, local: u32) -> bool {
        local as usize >= self.num_owned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NodeId;

    #[test]
    fn test_halo_vertices_appended_after_owned() {
        // 0 → 1 → 2 → 3, 0 → 3
        let edges = vec![
            (NodeId(0), NodeId(1), 1.0),
            (NodeId(1), NodeId(2), 2.0),
            (NodeId(2), NodeId(3), 3.0),
            (NodeId(0), NodeId(3), 9.0),
        ];
        let graph = CsrGraph::from_edge_list(&edges).unwrap();
        let table = PartitionTable::from_owners(vec![0, 0, 1, 1], 2);

        let sub0 = SubGraph::build(&graph, &table, 0).unwrap();
        assert_eq!(sub0.num_owned(), 2);
        assert_eq!(sub0.num_halo(), 2);
        // Halo slots in first-seen edge order: 3 (from 0 → 3), then 2 (from 1 → 2)
        assert_eq!(sub0.original_vertex(), &[0, 1, 3, 2]);
        assert_eq!(sub0.graph().adjacency(NodeId(0)), (&[1, 2][..], &[1.0, 9.0][..]));
        assert_eq!(sub0.graph().adjacency(NodeId(1)), (&[3][..], &[2.0][..]));
        assert_eq!(
            sub0.halo_owner(2),
            Some(HaloVertex {
                owner: DeviceId(1),
                remote_index: 1,
            })
        );
        assert_eq!(sub0.halo_owner(1), None);
        assert!(sub0.is_halo(3));

        let sub1 = SubGraph::build(&graph, &table, 1).unwrap();
        assert_eq!(sub1.num_owned(), 2);
        assert_eq!(sub1.num_halo(), 0);
        assert_eq!(sub1.original_vertex(), &[2, 3]);
        assert_eq!(sub1.num_edges(), 1);
        assert_eq!(sub1.device(), DeviceId(1));
    }

    #[test]
    fn test_empty_partition() {
        let edges = vec![(NodeId(0), NodeId(1), 1.0)];
        let graph = CsrGraph::from_edge_list(&edges).unwrap();
        let table = PartitionTable::from_owners(vec![0, 0], 2);

        let sub1 = SubGraph::build(&graph, &table, 1).unwrap();
        assert_eq!(sub1.num_nodes(), 0);
        assert_eq!(sub1.num_edges(), 0);
    }
}
