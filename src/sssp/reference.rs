//! CPU reference: Dijkstra's algorithm and result validation
//!
//! Used to check device results; not tuned for speed.
//!
//! # Example
//!
//! ```
//! use trueno_sssp::{dijkstra, CsrGraph, NodeId};
//!
//! let edges = vec![
//!     (NodeId(0), NodeId(1), 1.0),
//!     (NodeId(1), NodeId(2), 2.0),
//!     (NodeId(0), NodeId(2), 5.0),
//! ];
//! let graph = CsrGraph::from_edge_list(&edges).unwrap();
//!
//! let result = dijkstra(&graph, NodeId(0));
//! assert_eq!(result.distance(NodeId(2)), Some(3.0)); // 0→1→2, not 0→2
//! assert_eq!(result.predecessor(NodeId(2)), Some(NodeId(1)));
//! ```

use super::functor::{extend_rank, rank_distance, NO_RANK, SOURCE_RANK};
use super::result::SsspResult;
use crate::storage::{CsrGraph, NodeId};
use anyhow::{anyhow, bail, Result};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Relative tolerance when comparing labels computed along different paths
const LABEL_TOLERANCE: f32 = 1e-4;

/// State for Dijkstra's priority queue
///
/// `rank` packs distance and hop count, see [`super::functor::pack_rank`].
#[derive(Clone, Copy, PartialEq, Eq)]
struct State {
    rank: u64,
    node: u32,
}

impl Ord for State {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap (BinaryHeap is max-heap by default)
        other
            .rank
            .cmp(&self.rank)
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for State {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Single-source shortest paths with predecessors
///
/// Among equally short paths the one with the fewest edges wins, then the
/// smallest predecessor id, which is the rule the device run settles on. An
/// out-of-range source yields an all-unreached result.
///
/// # Complexity
///
/// O((V + E) log V) using a binary heap
#[must_use]
pub fn dijkstra(graph: &CsrGraph, source: NodeId) -> SsspResult {
    let n = graph.num_nodes();
    let mut ranks = vec![NO_RANK; n];
    let mut preds: Vec<Option<NodeId>> = vec![None; n];

    if (source.0 as usize) < n {
        let mut heap = BinaryHeap::new();
        ranks[source.0 as usize] = SOURCE_RANK;
        heap.push(State {
            rank: SOURCE_RANK,
            node: source.0,
        });

        while let Some(State { rank, node }) = heap.pop() {
            // Skip if we've found a better path
            if rank > ranks[node as usize] {
                continue;
            }

            let (neighbors, weights) = graph.adjacency(NodeId(node));
            for (&neighbor, &weight) in neighbors.iter().zip(weights) {
                let Some(next) = extend_rank(rank, weight) else {
                    continue;
                };
                let slot = neighbor as usize;
                match next.cmp(&ranks[slot]) {
                    Ordering::Greater => {}
                    Ordering::Equal => {
                        if preds[slot].is_some_and(|p| node < p.0) {
                            preds[slot] = Some(NodeId(node));
                        }
                    }
                    Ordering::Less => {
                        ranks[slot] = next;
                        preds[slot] = Some(NodeId(node));
                        heap.push(State {
                            rank: next,
                            node: neighbor,
                        });
                    }
                }
            }
        }
    }

    SsspResult {
        source,
        labels: ranks
            .into_iter()
            .map(|rank| (rank != NO_RANK).then(|| rank_distance(rank)))
            .collect(),
        preds: Some(preds),
    }
}

fn close(a: f32, b: f32) -> bool {
    (a - b).abs() <= LABEL_TOLERANCE * a.abs().max(b.abs()).max(1.0)
}

/// Check `result` against the graph it was computed on
///
/// Labels must match a Dijkstra run from the same source. When predecessors
/// are present, every reached non-source vertex must name a reached
/// predecessor with an edge whose weight closes the distance gap, and the
/// chain must reach the source within `|V| - 1` steps.
///
/// # Errors
///
/// Returns an error describing the first mismatch
pub fn validate(graph: &CsrGraph, result: &SsspResult) -> Result<()> {
    let n = graph.num_nodes();
    if result.labels.len() != n {
        bail!("result has {} labels for {} nodes", result.labels.len(), n);
    }

    let expected = dijkstra(graph, result.source);
    for (v, (&got, &want)) in result.labels.iter().zip(&expected.labels).enumerate() {
        match (got, want) {
            (None, None) => {}
            (Some(g), Some(w)) if close(g, w) => {}
            _ => bail!("vertex {v}: label {got:?}, expected {want:?}"),
        }
    }

    let Some(preds) = &result.preds else {
        return Ok(());
    };
    if preds.len() != n {
        bail!("result has {} predecessors for {} nodes", preds.len(), n);
    }

    #[allow(clippy::cast_possible_truncation)]
    for v in 0..n as u32 {
        let node = NodeId(v);
        let Some(label) = result.distance(node) else {
            if preds[v as usize].is_some() {
                bail!("unreached vertex {v} has a predecessor");
            }
            continue;
        };
        if node == result.source {
            continue;
        }

        let pred = result
            .predecessor(node)
            .ok_or_else(|| anyhow!("reached vertex {v} has no predecessor"))?;
        let pred_label = result
            .distance(pred)
            .ok_or_else(|| anyhow!("vertex {v}: predecessor {} is unreached", pred.0))?;
        let (targets, weights) = graph.adjacency(pred);
        let tight = targets
            .iter()
            .zip(weights)
            .any(|(&t, &w)| t == v && close(pred_label + w, label));
        if !tight {
            bail!(
                "vertex {v}: no edge from predecessor {} closes distance {label}",
                pred.0
            );
        }
        if result.path_to(node).is_none() {
            bail!("vertex {v}: predecessor chain does not reach the source");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_graph() {
        let graph = CsrGraph::new();
        let result = dijkstra(&graph, NodeId(0));
        assert!(result.labels.is_empty());
    }

    #[test]
    fn test_chain() {
        // 0 --1.0--> 1 --2.0--> 2
        let edges = vec![(NodeId(0), NodeId(1), 1.0), (NodeId(1), NodeId(2), 2.0)];
        let graph = CsrGraph::from_edge_list(&edges).unwrap();

        let result = dijkstra(&graph, NodeId(0));
        assert_eq!(result.labels, vec![Some(0.0), Some(1.0), Some(3.0)]);
        assert_eq!(
            result.path_to(NodeId(2)),
            Some(vec![NodeId(0), NodeId(1), NodeId(2)])
        );
    }

    #[test]
    fn test_unreachable_node() {
        // 0 → 1, 2 → 3 (disconnected)
        let edges = vec![(NodeId(0), NodeId(1), 1.0), (NodeId(2), NodeId(3), 1.0)];
        let graph = CsrGraph::from_edge_list(&edges).unwrap();

        let result = dijkstra(&graph, NodeId(0));
        assert_eq!(result.distance(NodeId(2)), None);
        assert_eq!(result.predecessor(NodeId(3)), None);
        assert_eq!(result.reached_count(), 2);
    }

    #[test]
    fn test_tie_keeps_smallest_predecessor() {
        // 3 reached at 2.0 through both 1 and 2
        let edges = vec![
            (NodeId(0), NodeId(2), 1.0),
            (NodeId(0), NodeId(1), 1.0),
            (NodeId(2), NodeId(3), 1.0),
            (NodeId(1), NodeId(3), 1.0),
        ];
        let graph = CsrGraph::from_edge_list(&edges).unwrap();

        let result = dijkstra(&graph, NodeId(0));
        assert_eq!(result.predecessor(NodeId(3)), Some(NodeId(1)));
    }

    #[test]
    fn test_tie_prefers_fewer_edges() {
        // 3 reached at 2.0 through 0 → 4 → 3 and through 0 → 1 → 2 → 3
        let edges = vec![
            (NodeId(0), NodeId(4), 1.0),
            (NodeId(4), NodeId(3), 1.0),
            (NodeId(0), NodeId(1), 1.0),
            (NodeId(1), NodeId(2), 1.0),
            (NodeId(2), NodeId(3), 0.0),
        ];
        let graph = CsrGraph::from_edge_list(&edges).unwrap();

        let result = dijkstra(&graph, NodeId(0));
        assert_eq!(result.distance(NodeId(3)), Some(2.0));
        // Two edges beat three, even from a larger id
        assert_eq!(result.predecessor(NodeId(3)), Some(NodeId(4)));
    }

    #[test]
    fn test_zero_weight_cycle_has_acyclic_predecessors() {
        let edges = vec![
            (NodeId(0), NodeId(5), 1.0),
            (NodeId(5), NodeId(3), 0.0),
            (NodeId(0), NodeId(6), 1.0),
            (NodeId(6), NodeId(4), 0.0),
            (NodeId(3), NodeId(4), 0.0),
            (NodeId(4), NodeId(3), 0.0),
        ];
        let graph = CsrGraph::from_edge_list(&edges).unwrap();

        let result = dijkstra(&graph, NodeId(0));
        assert_eq!(result.predecessor(NodeId(3)), Some(NodeId(5)));
        assert_eq!(result.predecessor(NodeId(4)), Some(NodeId(6)));
        assert!(validate(&graph, &result).is_ok());
    }

    #[test]
    fn test_zero_weight_edge_into_source() {
        let edges = vec![(NodeId(0), NodeId(1), 0.0), (NodeId(1), NodeId(0), 0.0)];
        let graph = CsrGraph::from_edge_list(&edges).unwrap();

        let result = dijkstra(&graph, NodeId(0));
        assert_eq!(result.predecessor(NodeId(0)), None);
        assert_eq!(
            result.path_to(NodeId(1)),
            Some(vec![NodeId(0), NodeId(1)])
        );
    }

    #[test]
    fn test_validate_rejects_predecessor_cycle() {
        let edges = vec![
            (NodeId(0), NodeId(1), 1.0),
            (NodeId(1), NodeId(2), 0.0),
            (NodeId(2), NodeId(1), 0.0),
        ];
        let graph = CsrGraph::from_edge_list(&edges).unwrap();
        let mut result = dijkstra(&graph, NodeId(0));
        // Both tight, but 1 and 2 now point at each other
        if let Some(preds) = result.preds.as_mut() {
            preds[1] = Some(NodeId(2));
        }
        let err = validate(&graph, &result).unwrap_err();
        assert!(err.to_string().contains("does not reach the source"));
    }

    #[test]
    fn test_source_out_of_bounds() {
        let edges = vec![(NodeId(0), NodeId(1), 1.0)];
        let graph = CsrGraph::from_edge_list(&edges).unwrap();

        let result = dijkstra(&graph, NodeId(100));
        assert_eq!(result.reached_count(), 0);
    }

    #[test]
    fn test_zero_weight_edge() {
        let edges = vec![(NodeId(0), NodeId(1), 0.0), (NodeId(1), NodeId(2), 0.0)];
        let graph = CsrGraph::from_edge_list(&edges).unwrap();

        let result = dijkstra(&graph, NodeId(0));
        assert_eq!(result.distance(NodeId(2)), Some(0.0));
    }

    #[test]
    fn test_validate_accepts_reference() {
        let edges = vec![
            (NodeId(0), NodeId(1), 4.0),
            (NodeId(0), NodeId(2), 1.0),
            (NodeId(2), NodeId(1), 2.0),
        ];
        let graph = CsrGraph::from_edge_list(&edges).unwrap();
        let result = dijkstra(&graph, NodeId(0));
        assert!(validate(&graph, &result).is_ok());
    }

    #[test]
    fn test_validate_rejects_wrong_label() {
        let edges = vec![(NodeId(0), NodeId(1), 4.0)];
        let graph = CsrGraph::from_edge_list(&edges).unwrap();
        let mut result = dijkstra(&graph, NodeId(0));
        result.labels[1] = Some(3.0);
        assert!(validate(&graph, &result).is_err());
    }

    #[test]
    fn test_validate_rejects_loose_predecessor() {
        let edges = vec![
            (NodeId(0), NodeId(1), 4.0),
            (NodeId(0), NodeId(2), 1.0),
            (NodeId(2), NodeId(1), 2.0),
        ];
        let graph = CsrGraph::from_edge_list(&edges).unwrap();
        let mut result = dijkstra(&graph, NodeId(0));
        // 0 → 1 costs 4, not 3
        if let Some(preds) = result.preds.as_mut() {
            preds[1] = Some(NodeId(0));
        }
        let err = validate(&graph, &result).unwrap_err();
        assert!(err.to_string().contains("vertex 1"));
    }

    #[test]
    fn test_validate_without_preds_checks_labels_only() {
        let edges = vec![(NodeId(0), NodeId(1), 4.0)];
        let graph = CsrGraph::from_edge_list(&edges).unwrap();
        let mut result = dijkstra(&graph, NodeId(0));
        result.preds = None;
        assert!(validate(&graph, &result).is_ok());
    }
}
