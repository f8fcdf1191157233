//! CSR (Compressed Sparse Row) graph representation
//!
//! The read-only input to the SSSP problem. Edge weights are distances and must
//! be finite and non-negative.
//!
//! # CSR Format
//!
//! ```text
//! Graph: 0 → 1 (2.0), 0 → 2 (5.0), 1 → 2 (1.0)
//!
//! CSR:
//!   row_offsets:  [0, 2, 3, 3]     // Node 0: edges [0..2), Node 1: [2..3), Node 2: [3..3)
//!   col_indices:  [1, 2, 2]
//!   edge_weights: [2.0, 5.0, 1.0]
//! ```

use anyhow::{anyhow, ensure, Result};
use std::ops::Range;

/// Node identifier (zero-indexed)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

/// CSR (Compressed Sparse Row) graph
///
/// # Example
///
/// ```
/// use trueno_sssp::{CsrGraph, NodeId};
///
/// let mut graph = CsrGraph::new();
/// graph.add_edge(NodeId(0), NodeId(1), 1.0).unwrap();
/// graph.add_edge(NodeId(0), NodeId(2), 4.0).unwrap();
///
/// let neighbors = graph.outgoing_neighbors(NodeId(0)).unwrap();
/// assert_eq!(neighbors, &[1, 2]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct CsrGraph {
    /// node i's edges start at `row_offsets`[i]
    /// Length: `num_nodes` + 1
    row_offsets: Vec<u32>,

    /// Edge targets
    /// Length: `num_edges`
    col_indices: Vec<u32>,

    /// Length: `num_edges`
    edge_weights: Vec<f32>,

    num_nodes: usize,
}

impl CsrGraph {
    /// Create new empty graph
    #[must_use]
    pub fn new() -> Self {
        Self {
            row_offsets: vec![0],
            col_indices: Vec::new(),
            edge_weights: Vec::new(),
            num_nodes: 0,
        }
    }

    /// Create graph from edge list
    ///
    /// The node count is the largest endpoint + 1. Use [`CsrGraph::with_nodes`]
    /// when trailing isolated vertices must be kept.
    ///
    /// # Errors
    ///
    /// Returns error if a weight is negative or not finite
    pub fn from_edge_list(edges: &[(NodeId, NodeId, f32)]) -> Result<Self> {
        let num_nodes = edges
            .iter()
            .flat_map(|(src, dst, _)| [src.0, dst.0])
            .max()
            .map_or(0, |max| max as usize + 1);

        Self::with_nodes(num_nodes, edges)
    }

    /// Create graph with an explicit node count from an edge list
    ///
    /// # Errors
    ///
    /// Returns error if an endpoint is `>= num_nodes` or a weight is negative
    /// or not finite
    pub fn with_nodes(num_nodes: usize, edges: &[(NodeId, NodeId, f32)]) -> Result<Self> {
        let mut adj_list: Vec<Vec<(u32, f32)>> = vec![Vec::new(); num_nodes];

        for &(src, dst, weight) in edges {
            ensure!(
                (src.0 as usize) < num_nodes && (dst.0 as usize) < num_nodes,
                "Edge {} → {} out of bounds for {} nodes",
                src.0,
                dst.0,
                num_nodes
            );
            check_weight(weight)?;
            adj_list[src.0 as usize].push((dst.0, weight));
        }

        let mut row_offsets = Vec::with_capacity(num_nodes + 1);
        let mut col_indices = Vec::with_capacity(edges.len());
        let mut edge_weights = Vec::with_capacity(edges.len());

        row_offsets.push(0);
        for neighbors in &adj_list {
            for &(target, weight) in neighbors {
                col_indices.push(target);
                edge_weights.push(weight);
            }
            #[allow(clippy::cast_possible_truncation)] // Graphs >4B edges not supported
            row_offsets.push(col_indices.len() as u32);
        }

        Ok(Self {
            row_offsets,
            col_indices,
            edge_weights,
            num_nodes,
        })
    }

    /// Create graph from raw CSR arrays
    ///
    /// # Errors
    ///
    /// Returns error if the arrays do not form a valid CSR structure
    pub fn from_csr(
        row_offsets: Vec<u32>,
        col_indices: Vec<u32>,
        edge_weights: Vec<f32>,
    ) -> Result<Self> {
        let num_nodes = row_offsets
            .len()
            .checked_sub(1)
            .ok_or_else(|| anyhow!("row_offsets must hold at least one entry"))?;

        ensure!(row_offsets[0] == 0, "row_offsets must start at 0");
        ensure!(
            row_offsets.windows(2).all(|w| w[0] <= w[1]),
            "row_offsets must be non-decreasing"
        );
        ensure!(
            row_offsets[num_nodes] as usize == col_indices.len(),
            "last row offset {} does not match {} column indices",
            row_offsets[num_nodes],
            col_indices.len()
        );
        ensure!(
            col_indices.len() == edge_weights.len(),
            "{} column indices but {} edge weights",
            col_indices.len(),
            edge_weights.len()
        );
        if let Some(bad) = col_indices.iter().find(|&&c| c as usize >= num_nodes) {
            return Err(anyhow!("Column index {bad} out of bounds for {num_nodes} nodes"));
        }
        for &weight in &edge_weights {
            check_weight(weight)?;
        }

        Ok(Self {
            row_offsets,
            col_indices,
            edge_weights,
            num_nodes,
        })
    }

    /// Add edge to graph (dynamic insertion)
    ///
    /// Note: For large graphs, use `from_edge_list` for better performance.
    ///
    /// # Errors
    ///
    /// Returns error if the weight is negative or not finite
    pub fn add_edge(&mut self, src: NodeId, dst: NodeId, weight: f32) -> Result<()> {
        check_weight(weight)?;

        let max_node = src.0.max(dst.0) as usize;
        if max_node >= self.num_nodes {
            self.expand_to(max_node + 1);
        }

        let src_idx = src.0 as usize;
        let end = self.row_offsets[src_idx + 1] as usize;

        self.col_indices.insert(end, dst.0);
        self.edge_weights.insert(end, weight);

        for offset in &mut self.row_offsets[src_idx + 1..] {
            *offset += 1;
        }

        Ok(())
    }

    /// Get outgoing neighbors of a node
    ///
    /// # Errors
    ///
    /// Returns error if node ID is out of bounds
    pub fn outgoing_neighbors(&self, node: NodeId) -> Result<&[u32]> {
        if (node.0 as usize) >= self.num_nodes {
            return Err(anyhow!("Node ID {} out of bounds", node.0));
        }
        Ok(&self.col_indices[self.edge_range(node.0)])
    }

    /// Targets and weights of a node's outgoing edges
    ///
    /// Out-of-bounds nodes have no edges.
    #[must_use]
    pub fn adjacency(&self, node: NodeId) -> (&[u32], &[f32]) {
        if (node.0 as usize) >= self.num_nodes {
            return (&[], &[]);
        }
        let range = self.edge_range(node.0);
        (&self.col_indices[range.clone()], &self.edge_weights[range])
    }

    /// Edge-index range of a node's outgoing edges
    ///
    /// `node` must be `< num_nodes`.
    #[must_use]
    pub fn edge_range(&self, node: u32) -> Range<usize> {
        let idx = node as usize;
        self.row_offsets[idx] as usize..self.row_offsets[idx + 1] as usize
    }

    /// Get number of nodes
    #[must_use]
    pub const fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    /// Get number of edges
    #[must_use]
    pub fn num_edges(&self) -> usize {
        self.col_indices.len()
    }

    /// Mean out-degree (`0.0` for an empty graph)
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn average_degree(&self) -> f64 {
        if self.num_nodes == 0 {
            return 0.0;
        }
        self.num_edges() as f64 / self.num_nodes as f64
    }

    /// Mean edge weight (`0.0` when there are no edges)
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn average_weight(&self) -> f64 {
        if self.edge_weights.is_empty() {
            return 0.0;
        }
        let total: f64 = self.edge_weights.iter().map(|&w| f64::from(w)).sum();
        total / self.edge_weights.len() as f64
    }

    /// Get CSR components (`row_offsets`, `col_indices`, `edge_weights`)
    #[must_use]
    pub fn csr_components(&self) -> (&[u32], &[u32], &[f32]) {
        (&self.row_offsets, &self.col_indices, &self.edge_weights)
    }

    fn expand_to(&mut self, new_size: usize) {
        if new_size <= self.num_nodes {
            return;
        }
        let last_offset = *self.row_offsets.last().unwrap_or(&0);
        self.row_offsets.resize(new_size + 1, last_offset);
        self.num_nodes = new_size;
    }
}

impl Default for CsrGraph {
    fn default() -> Self {
        Self::new()
    }
}

fn check_weight(weight: f32) -> Result<()> {
    ensure!(
        weight.is_finite() && weight >= 0.0,
        "Edge weight {weight} must be finite and non-negative"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_graph() {
        let graph = CsrGraph::new();
        assert_eq!(graph.num_nodes(), 0);
        assert_eq!(graph.num_edges(), 0);
        assert_eq!(graph.average_degree(), 0.0);
        assert_eq!(graph.average_weight(), 0.0);
    }

    #[test]
    fn test_from_edge_list_simple() {
        let edges = vec![
            (NodeId(0), NodeId(1), 2.0),
            (NodeId(0), NodeId(2), 5.0),
            (NodeId(1), NodeId(2), 1.0),
        ];

        let graph = CsrGraph::from_edge_list(&edges).unwrap();

        assert_eq!(graph.num_nodes(), 3);
        assert_eq!(graph.num_edges(), 3);
        assert_eq!(graph.row_offsets, vec![0, 2, 3, 3]);
        assert_eq!(graph.col_indices, vec![1, 2, 2]);
        assert_eq!(graph.edge_weights, vec![2.0, 5.0, 1.0]);
    }

    #[test]
    fn test_with_nodes_keeps_isolated_vertices() {
        let edges = vec![(NodeId(0), NodeId(1), 1.0)];
        let graph = CsrGraph::with_nodes(4, &edges).unwrap();

        assert_eq!(graph.num_nodes(), 4);
        assert_eq!(graph.adjacency(NodeId(3)), (&[][..], &[][..]));
    }

    #[test]
    fn test_with_nodes_rejects_out_of_bounds_edge() {
        let edges = vec![(NodeId(0), NodeId(5), 1.0)];
        assert!(CsrGraph::with_nodes(3, &edges).is_err());
    }

    #[test]
    fn test_negative_and_nan_weights_rejected() {
        assert!(CsrGraph::from_edge_list(&[(NodeId(0), NodeId(1), -1.0)]).is_err());
        assert!(CsrGraph::from_edge_list(&[(NodeId(0), NodeId(1), f32::NAN)]).is_err());

        let mut graph = CsrGraph::new();
        assert!(graph.add_edge(NodeId(0), NodeId(1), f32::INFINITY).is_err());
    }

    #[test]
    fn test_from_csr_validation() {
        let graph = CsrGraph::from_csr(vec![0, 1, 1], vec![1], vec![3.0]).unwrap();
        assert_eq!(graph.num_nodes(), 2);
        assert_eq!(graph.num_edges(), 1);

        assert!(CsrGraph::from_csr(vec![], vec![], vec![]).is_err());
        assert!(CsrGraph::from_csr(vec![1, 1], vec![0], vec![1.0]).is_err());
        assert!(CsrGraph::from_csr(vec![0, 2, 1], vec![0, 1], vec![1.0, 1.0]).is_err());
        assert!(CsrGraph::from_csr(vec![0, 1], vec![3], vec![1.0]).is_err());
        assert!(CsrGraph::from_csr(vec![0, 1], vec![0], vec![]).is_err());
    }

    #[test]
    fn test_adjacency_and_edge_range() {
        let edges = vec![(NodeId(0), NodeId(1), 1.0), (NodeId(0), NodeId(2), 2.0)];
        let graph = CsrGraph::from_edge_list(&edges).unwrap();

        let (targets, weights) = graph.adjacency(NodeId(0));
        assert_eq!(targets, &[1, 2]);
        assert_eq!(weights, &[1.0, 2.0]);
        assert_eq!(graph.edge_range(0), 0..2);
        assert_eq!(graph.edge_range(1), 2..2);
        assert_eq!(graph.adjacency(NodeId(42)), (&[][..], &[][..]));
    }

    #[test]
    fn test_add_edge_dynamic() {
        let mut graph = CsrGraph::new();

        graph.add_edge(NodeId(0), NodeId(1), 1.0).unwrap();
        graph.add_edge(NodeId(2), NodeId(0), 3.0).unwrap();
        graph.add_edge(NodeId(0), NodeId(2), 2.0).unwrap();

        assert_eq!(graph.num_nodes(), 3);
        assert_eq!(graph.num_edges(), 3);
        assert_eq!(graph.outgoing_neighbors(NodeId(0)).unwrap(), &[1, 2]);
        assert_eq!(graph.outgoing_neighbors(NodeId(2)).unwrap(), &[0]);
        assert!(graph.outgoing_neighbors(NodeId(3)).is_err());
    }

    #[test]
    fn test_averages() {
        let edges = vec![
            (NodeId(0), NodeId(1), 1.0),
            (NodeId(0), NodeId(2), 3.0),
            (NodeId(1), NodeId(2), 2.0),
        ];
        let graph = CsrGraph::with_nodes(4, &edges).unwrap();

        assert!((graph.average_degree() - 0.75).abs() < 1e-12);
        assert!((graph.average_weight() - 2.0).abs() < 1e-12);
    }
}
