//! Gathered SSSP output

use crate::error::SsspError;
use crate::storage::NodeId;

/// Distances and (optionally) predecessors indexed by global vertex id
#[derive(Debug, Clone, PartialEq)]
pub struct SsspResult {
    /// Source the run started from
    pub source: NodeId,
    /// Shortest distance per vertex, `None` if unreachable
    pub labels: Vec<Option<f32>>,
    /// Predecessor per vertex when paths were tracked
    pub preds: Option<Vec<Option<NodeId>>>,
}

impl SsspResult {
    /// Distance to `node`, `None` if unreachable or out of range
    #[must_use]
    pub fn distance(&self, node: NodeId) -> Option<f32> {
        self.labels.get(node.0 as usize).copied().flatten()
    }

    /// Predecessor of `node` on its shortest path
    #[must_use]
    pub fn predecessor(&self, node: NodeId) -> Option<NodeId> {
        self.preds.as_ref()?.get(node.0 as usize).copied().flatten()
    }

    /// Number of reachable vertices (the source included)
    #[must_use]
    pub fn reached_count(&self) -> usize {
        self.labels.iter().filter(|l| l.is_some()).count()
    }

    /// Path from the source to `target`, following predecessors
    ///
    /// `None` if the target is unreachable, paths were not tracked, or the
    /// chain does not lead back to the source within `|V|` steps.
    #[must_use]
    pub fn path_to(&self, target: NodeId) -> Option<Vec<NodeId>> {
        self.distance(target)?;
        self.preds.as_ref()?;

        let mut path = vec![target];
        let mut current = target;
        while current != self.source {
            if path.len() > self.labels.len() {
                return None;
            }
            current = self.predecessor(current)?;
            path.push(current);
        }
        path.reverse();
        Some(path)
    }
}

/// Outcome of a gather
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GatherReport {
    /// Vertices whose entries were copied out
    pub gathered: usize,
    /// Vertices skipped because their table entries were out of range
    pub skipped: Vec<SsspError>,
}

impl GatherReport {
    /// Whether every vertex was gathered
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}
