//! Edge relaxation and vertex filter functors
//!
//! The traversal engine calls [`Functor::relax`] once per frontier edge, from
//! many workers at once. Exactly the callers that strictly lower a vertex's
//! key see `true` and then call [`Functor::on_relaxed`].
//!
//! Without path tracking the key is the distance label. With it, every vertex
//! also carries a rank: `(distance bits << 32) | hops`, lowered with an atomic
//! minimum. A path that ties the distance but needs fewer edges still wins, so
//! once the run converges the ranks are the lexicographic minimum over all
//! paths, whatever order the relaxations ran in. Predecessors written here are
//! provisional; the enactor replaces them with canonical ones at convergence.

use super::data_slice::{DataSlice, INVALID_VERTEX};
use crate::device::DeviceArray;
use crate::error::DeviceError;

/// Predecessor slot that names no vertex
pub const NO_PREDECESSOR: u32 = INVALID_VERTEX;

/// Rank of a vertex no path has reached yet
pub const NO_RANK: u64 = u64::MAX;

/// Rank of the source: distance zero, zero hops
pub const SOURCE_RANK: u64 = 0;

/// Edge handed to the functor, in local indices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeRef {
    /// Source vertex (owned)
    pub src: u32,
    /// Destination vertex (owned or halo)
    pub dst: u32,
    /// Edge index into the weight array
    pub edge: u32,
}

/// Callbacks the traversal engine invokes during advance and filter
pub trait Functor: Sync {
    /// Try to improve `dst` through `edge`; `true` iff its key strictly dropped
    fn relax(&self, edge: EdgeRef) -> bool;

    /// Follow-up for a winning relaxation
    fn on_relaxed(&self, edge: EdgeRef);

    /// Whether `vertex` stays in the next frontier
    fn accept_vertex(&self, vertex: u32) -> bool;

    /// Follow-up for an accepted vertex
    fn on_vertex_accepted(&self, vertex: u32);
}

/// Pack a distance and a hop count into one ordered word
///
/// The distance occupies the high half, so the atomic minimum keeps the
/// smallest distance and, among equal distances, the fewest hops.
#[must_use]
pub fn pack_rank(distance: f32, hops: u32) -> u64 {
    let bits = if distance == 0.0 { 0 } else { distance.to_bits() };
    (u64::from(bits) << 32) | u64::from(hops)
}

/// Distance half of a rank
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub const fn rank_distance(rank: u64) -> f32 {
    f32::from_bits((rank >> 32) as u32)
}

/// Hop half of a rank
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub const fn rank_hops(rank: u64) -> u32 {
    rank as u32
}

/// Rank reached by following one edge of `weight` out of a vertex ranked `rank`
///
/// `None` when the vertex itself is unreached.
#[must_use]
pub fn extend_rank(rank: u64, weight: f32) -> Option<u64> {
    (rank != NO_RANK)
        .then(|| pack_rank(rank_distance(rank) + weight, rank_hops(rank).saturating_add(1)))
}

#[derive(Clone, Copy)]
struct PathArrays<'a> {
    ranks: DeviceArray<'a, u64>,
    preds: DeviceArray<'a, u32>,
}

/// Shortest-path relaxation over one device's buffers
#[derive(Clone, Copy)]
pub struct SsspFunctor<'a> {
    labels: DeviceArray<'a, f32>,
    weights: DeviceArray<'a, f32>,
    paths: Option<PathArrays<'a>>,
    original_vertex: DeviceArray<'a, u32>,
}

impl<'a> SsspFunctor<'a> {
    /// Bind the functor to a data slice's device buffers
    ///
    /// # Errors
    ///
    /// Returns `BufferMissing` if the slice has not been initialized and reset
    pub fn new(slice: &'a DataSlice) -> Result<Self, DeviceError> {
        let paths = match (slice.ranks(), slice.preds()) {
            (Some(ranks), Some(preds)) => Some(PathArrays {
                ranks: ranks.device_array()?,
                preds: preds.device_array()?,
            }),
            _ => None,
        };
        Ok(Self {
            labels: slice.labels().device_array()?,
            weights: slice.weights().device_array()?,
            paths,
            original_vertex: slice.original_vertex()?,
        })
    }
}

impl Functor for SsspFunctor<'_> {
    fn relax(&self, edge: EdgeRef) -> bool {
        let weight = self.weights.load(edge.edge as usize);
        let dst = edge.dst as usize;
        let Some(paths) = self.paths else {
            let candidate = self.labels.load(edge.src as usize) + weight;
            return candidate < self.labels.fetch_min(dst, candidate);
        };

        let Some(candidate) = extend_rank(paths.ranks.load(edge.src as usize), weight) else {
            return false;
        };
        let previous = paths.ranks.fetch_min(dst, candidate);
        self.labels.fetch_min(dst, rank_distance(candidate));
        candidate < previous
    }

    fn on_relaxed(&self, edge: EdgeRef) {
        if let Some(paths) = self.paths {
            let source = self.original_vertex.load(edge.src as usize);
            paths.preds.store(edge.dst as usize, source);
        }
    }

    fn accept_vertex(&self, vertex: u32) -> bool {
        vertex != INVALID_VERTEX
    }

    fn on_vertex_accepted(&self, _vertex: u32) {}
}
