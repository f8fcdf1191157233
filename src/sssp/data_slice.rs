//! Per-device SSSP state
//!
//! A [`DataSlice`] owns every buffer one device needs for a run: distance
//! labels, a device copy of the edge weights, optional ranks and predecessors,
//! visited marks, the frontier queue and the halo staging buffers. Labels,
//! ranks, predecessors and visited marks are reset for every source; everything
//! else is allocated once by [`DataSlice::init`].

use super::functor::{NO_PREDECESSOR, NO_RANK, SOURCE_RANK};
use crate::config::{scaled, SsspConfig};
use crate::device::{
    AssociateKind, AssociateRegistry, DeviceArray, DeviceContext, DeviceId, DualBuffer, Location,
};
use crate::error::DeviceError;
use crate::partition::SubGraph;

/// Label of a vertex no path has reached yet
pub const UNREACHED: f32 = f32::INFINITY;

/// Visited mark of a vertex not queued in any round
pub const UNVISITED: u32 = u32::MAX;

/// Vertex id that never names a real vertex
pub const INVALID_VERTEX: u32 = u32::MAX;

/// Bucket-width scale applied before `delta_factor`
const DELTA_SCALE: f64 = 32.0;

/// What the frontier queue holds, which sets its sizing base
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrontierType {
    /// Vertices: sized from the local node count
    Vertex,
    /// Edges: sized from the local edge count
    Edge,
    /// Either: sized from the larger of the two
    #[default]
    Mixed,
}

impl FrontierType {
    /// Base element count before over-provisioning
    #[must_use]
    pub fn base_len(self, num_nodes: usize, num_edges: usize) -> usize {
        match self {
            Self::Vertex => num_nodes,
            Self::Edge => num_edges,
            Self::Mixed => num_nodes.max(num_edges),
        }
    }
}

/// Delta-stepping bucket width
///
/// `(avg_weight × 32) / avg_degree × delta_factor`, where an average degree of
/// zero counts as one. `None` (bucketing disabled) when the result is zero or
/// not finite.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn compute_delta(avg_weight: f64, avg_degree: f64, delta_factor: f32) -> Option<f32> {
    let degree = if avg_degree > 0.0 { avg_degree } else { 1.0 };
    let delta = (avg_weight * DELTA_SCALE / degree * f64::from(delta_factor)) as f32;
    (delta.is_finite() && delta > 0.0).then_some(delta)
}

/// Frontier queue resident on the device
#[derive(Debug)]
pub struct Frontier {
    queue: DualBuffer<u32>,
    len: usize,
}

impl Frontier {
    fn new() -> Self {
        Self {
            queue: DualBuffer::new("frontier"),
            len: 0,
        }
    }

    /// Number of queued entries
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether the queue is empty
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Allocated capacity
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.queue.len()
    }

    /// Grow to at least `capacity`; returns whether a new allocation happened
    fn reserve(&mut self, ctx: &DeviceContext<'_>, capacity: usize) -> Result<bool, DeviceError> {
        if self.queue.is_allocated(Location::Device) && self.queue.len() >= capacity {
            return Ok(false);
        }
        let grown = self
            .queue
            .allocate(ctx, capacity.max(self.queue.len()), Location::Device)?;
        self.len = 0;
        Ok(grown)
    }

    /// Replace the queue contents with `items`, growing the queue if needed
    ///
    /// Returns whether the queue had to grow.
    pub(crate) fn load(
        &mut self,
        ctx: &DeviceContext<'_>,
        items: &[u32],
    ) -> Result<bool, DeviceError> {
        let grew = if items.len() > self.capacity() {
            let capacity = items.len().max(self.capacity() * 2);
            self.queue.allocate(ctx, capacity, Location::Device)?
        } else {
            false
        };

        let queue = self.queue.device_array()?;
        for (i, &item) in items.iter().enumerate() {
            queue.store(i, item);
        }
        self.len = items.len();
        Ok(grew)
    }

    /// Copy the queued entries out
    ///
    /// # Errors
    ///
    /// Returns `BufferMissing` before the queue is allocated
    pub fn to_vec(&self) -> Result<Vec<u32>, DeviceError> {
        if self.len == 0 {
            return Ok(Vec::new());
        }
        let queue = self.queue.device_array()?;
        Ok((0..self.len).map(|i| queue.load(i)).collect())
    }

    fn clear(&mut self) {
        self.len = 0;
    }
}

/// Halo staging buffers: outgoing updates for boundary vertices
#[derive(Debug)]
pub(crate) struct HaloStaging {
    pub(crate) keys: DualBuffer<u32>,
    pub(crate) labels: DualBuffer<f32>,
    /// Rank staging, only with path tracking
    pub(crate) ranks: Option<DualBuffer<u64>>,
}

impl HaloStaging {
    fn new(mark_paths: bool) -> Self {
        Self {
            keys: DualBuffer::new("halo_keys"),
            labels: DualBuffer::new("halo_labels"),
            ranks: mark_paths.then(|| DualBuffer::new("halo_ranks")),
        }
    }

    /// Staged entries that fit without reallocation
    pub(crate) const fn capacity(&self) -> usize {
        self.keys.len()
    }

    /// Ensure room for `len` staged entries; returns whether memory was allocated
    pub(crate) fn reserve(
        &mut self,
        ctx: &DeviceContext<'_>,
        len: usize,
    ) -> Result<bool, DeviceError> {
        if len <= self.capacity() && self.keys.is_allocated(Location::Device) {
            return Ok(false);
        }
        let len = len.max(self.capacity());
        let mut grew = self.keys.allocate(ctx, len, Location::Device)?;
        grew |= self.labels.allocate(ctx, len, Location::Device)?;
        if let Some(ranks) = &mut self.ranks {
            grew |= ranks.allocate(ctx, len, Location::Device)?;
        }
        Ok(grew)
    }
}

/// Per-device SSSP state
#[derive(Debug)]
pub struct DataSlice {
    device: DeviceId,
    num_nodes: usize,
    num_owned: usize,
    num_edges: usize,
    mark_paths: bool,
    delta: Option<f32>,
    labels: DualBuffer<f32>,
    weights: DualBuffer<f32>,
    /// `(distance bits << 32) | hops`, see [`super::functor::pack_rank`]
    ranks: Option<DualBuffer<u64>>,
    /// Global predecessor ids
    preds: Option<DualBuffer<u32>>,
    visited: DualBuffer<u32>,
    original_vertex: DualBuffer<u32>,
    frontier: Frontier,
    pub(crate) halo: HaloStaging,
}

impl DataSlice {
    /// Empty slice for `device`; nothing allocated until [`DataSlice::init`]
    #[must_use]
    pub fn new(device: DeviceId, mark_paths: bool) -> Self {
        Self {
            device,
            num_nodes: 0,
            num_owned: 0,
            num_edges: 0,
            mark_paths,
            delta: None,
            labels: DualBuffer::new("labels"),
            weights: DualBuffer::new("weights"),
            ranks: mark_paths.then(|| DualBuffer::new("ranks")),
            preds: mark_paths.then(|| DualBuffer::new("preds")),
            visited: DualBuffer::new("visited"),
            original_vertex: DualBuffer::new("original_vertex"),
            frontier: Frontier::new(),
            halo: HaloStaging::new(mark_paths),
        }
    }

    /// Allocate and upload everything the device needs for `subgraph`
    ///
    /// Allocation stops at the first failing device operation; buffers
    /// allocated before it stay owned by the slice.
    ///
    /// # Errors
    ///
    /// Returns `AllocationFailure` or `TransferFailure` from the first failing
    /// device operation
    pub fn init(
        &mut self,
        ctx: &DeviceContext<'_>,
        subgraph: &SubGraph,
        config: &SsspConfig,
        num_devices: usize,
        registry: &mut AssociateRegistry,
    ) -> Result<(), DeviceError> {
        self.num_nodes = subgraph.num_nodes();
        self.num_owned = subgraph.num_owned();
        self.num_edges = subgraph.num_edges();

        self.labels.allocate(ctx, self.num_nodes, Location::Device)?;

        let (_, _, weights) = subgraph.graph().csr_components();
        self.weights.set_host(weights.to_vec());
        self.weights.allocate(ctx, self.num_edges, Location::Device)?;
        self.weights
            .move_data(ctx, Location::Host, Location::Device)?;

        self.visited.allocate(ctx, self.num_nodes, Location::Device)?;

        self.original_vertex
            .set_host(subgraph.original_vertex().to_vec());
        self.original_vertex
            .allocate(ctx, self.num_nodes, Location::Device)?;
        self.original_vertex
            .move_data(ctx, Location::Host, Location::Device)?;

        let queue_len = scaled(
            FrontierType::Mixed.base_len(self.num_nodes, self.num_edges),
            config.queue_sizing,
        );
        self.frontier.reserve(ctx, queue_len.max(1))?;

        if let Some(ranks) = &mut self.ranks {
            ranks.allocate(ctx, self.num_nodes, Location::Device)?;
        }
        if let Some(preds) = &mut self.preds {
            preds.allocate(ctx, self.num_nodes, Location::Device)?;
        }

        if num_devices > 1 {
            let staging = scaled(subgraph.num_halo(), config.in_sizing);
            if staging > 0 {
                self.halo.reserve(ctx, staging)?;
            }
            registry.register(self.device, AssociateKind::Labels);
            if self.mark_paths {
                registry.register(self.device, AssociateKind::Predecessors);
            }
        }

        // Halo rows carry no edges, so only owned vertices count toward the degree
        let graph = subgraph.graph();
        #[allow(clippy::cast_precision_loss)]
        let avg_degree = if self.num_owned == 0 {
            0.0
        } else {
            self.num_edges as f64 / self.num_owned as f64
        };
        self.delta = compute_delta(graph.average_weight(), avg_degree, config.delta_factor);

        tracing::debug!(
            device = %self.device,
            nodes = self.num_nodes,
            owned = self.num_owned,
            edges = self.num_edges,
            delta = ?self.delta,
            frontier_capacity = self.frontier.capacity(),
            halo_capacity = self.halo.capacity(),
            "Initialized data slice"
        );

        Ok(())
    }

    /// Reset labels, ranks, predecessors, visited marks and the frontier
    ///
    /// Missing buffers are allocated; present ones are reused. The frontier
    /// only grows when `frontier_type` × `queue_sizing` exceeds its capacity.
    ///
    /// # Errors
    ///
    /// Returns `AllocationFailure` if a lazily allocated buffer does not fit
    pub fn reset(
        &mut self,
        ctx: &DeviceContext<'_>,
        frontier_type: FrontierType,
        queue_sizing: f64,
    ) -> Result<(), DeviceError> {
        self.labels.allocate(ctx, self.num_nodes, Location::Device)?;
        self.visited.allocate(ctx, self.num_nodes, Location::Device)?;
        if let Some(ranks) = &mut self.ranks {
            ranks.allocate(ctx, self.num_nodes, Location::Device)?;
        }
        if let Some(preds) = &mut self.preds {
            preds.allocate(ctx, self.num_nodes, Location::Device)?;
        }

        let queue_len = scaled(
            frontier_type.base_len(self.num_nodes, self.num_edges),
            queue_sizing,
        );
        self.frontier.reserve(ctx, queue_len.max(1))?;
        self.frontier.clear();

        self.labels.fill(UNREACHED)?;
        self.visited.fill(UNVISITED)?;
        if let Some(ranks) = &self.ranks {
            ranks.fill(NO_RANK)?;
        }
        if let Some(preds) = &self.preds {
            preds.fill(NO_PREDECESSOR)?;
        }

        tracing::trace!(device = %self.device, "Reset data slice");
        Ok(())
    }

    /// Make `local` the source: label 0, rank 0, no predecessor, sole frontier entry
    ///
    /// # Errors
    ///
    /// Returns `BufferMissing` if called before [`DataSlice::reset`]
    pub fn seed_source(&mut self, ctx: &DeviceContext<'_>, local: u32) -> Result<(), DeviceError> {
        self.labels.device_array()?.store(local as usize, 0.0);
        if let Some(ranks) = &self.ranks {
            ranks.device_array()?.store(local as usize, SOURCE_RANK);
        }
        if let Some(preds) = &self.preds {
            preds.device_array()?.store(local as usize, NO_PREDECESSOR);
        }
        self.frontier.load(ctx, &[local])?;
        Ok(())
    }

    /// Move labels (and predecessors) to host memory
    ///
    /// # Errors
    ///
    /// Returns `TransferFailure` or `BufferMissing` from the first failing move
    pub fn download(&mut self, ctx: &DeviceContext<'_>) -> Result<(), DeviceError> {
        self.labels
            .move_data(ctx, Location::Device, Location::Host)?;
        if let Some(preds) = &mut self.preds {
            preds.move_data(ctx, Location::Device, Location::Host)?;
        }
        Ok(())
    }

    /// Device this slice lives on
    #[must_use]
    pub const fn device(&self) -> DeviceId {
        self.device
    }

    /// Owned + halo vertex count
    #[must_use]
    pub const fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    /// Owned vertex count
    #[must_use]
    pub const fn num_owned(&self) -> usize {
        self.num_owned
    }

    /// Local edge count
    #[must_use]
    pub const fn num_edges(&self) -> usize {
        self.num_edges
    }

    /// Bucket width, `None` when bucketing is disabled
    #[must_use]
    pub const fn delta(&self) -> Option<f32> {
        self.delta
    }

    /// Whether predecessors are tracked
    #[must_use]
    pub const fn mark_paths(&self) -> bool {
        self.mark_paths
    }

    /// Current frontier
    #[must_use]
    pub const fn frontier(&self) -> &Frontier {
        &self.frontier
    }

    pub(crate) fn frontier_mut(&mut self) -> &mut Frontier {
        &mut self.frontier
    }

    /// Label buffer
    #[must_use]
    pub const fn labels(&self) -> &DualBuffer<f32> {
        &self.labels
    }

    /// Edge weight buffer
    #[must_use]
    pub const fn weights(&self) -> &DualBuffer<f32> {
        &self.weights
    }

    /// Rank buffer, present iff paths are tracked
    #[must_use]
    pub const fn ranks(&self) -> Option<&DualBuffer<u64>> {
        self.ranks.as_ref()
    }

    /// Predecessor buffer, present iff paths are tracked
    #[must_use]
    pub const fn preds(&self) -> Option<&DualBuffer<u32>> {
        self.preds.as_ref()
    }

    /// Visited marks
    #[must_use]
    pub const fn visited(&self) -> &DualBuffer<u32> {
        &self.visited
    }

    /// Local index → global id
    ///
    /// # Errors
    ///
    /// Returns `BufferMissing` before [`DataSlice::init`]
    pub fn original_vertex(&self) -> Result<DeviceArray<'_, u32>, DeviceError> {
        self.original_vertex.device_array()
    }
}
