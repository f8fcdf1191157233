//! Bulk-synchronous reference enactor
//!
//! Each round:
//! 1. **Advance**: every device relaxes the out-edges of its frontier in
//!    parallel (rayon). Winners that land on owned vertices are queued once
//!    per round through the visited marks.
//! 2. **Filter**: queued vertices pass through the vertex condition.
//! 3. **Exchange**: halo vertices improved this round are staged on the
//!    sender and merged into their owner with atomic minimums. An owner whose
//!    label or rank dropped queues the vertex for the next round.
//! 4. **Bucket**: with delta-stepping enabled, vertices above the current
//!    priority level wait in a far queue until the near queues drain.
//!
//! The run has converged when every frontier and far queue is empty. With
//! path tracking, a last pass then picks each vertex's predecessor from its
//! final rank.

use super::data_slice::{DataSlice, UNVISITED};
use super::functor::{extend_rank, EdgeRef, Functor, SsspFunctor, NO_PREDECESSOR};
use super::priority::PriorityFunctor;
use super::problem::{Problem, ProblemState};
use crate::device::{AssociateKind, AssociateRegistry, DeviceArray, DeviceSet};
use crate::error::{DeviceError, Result, SsspError};
use crate::partition::SubGraph;
use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Counters for one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnactStats {
    /// Rounds executed
    pub rounds: u64,
    /// Edges inspected during advance
    pub edges_visited: u64,
    /// Relaxations that lowered a label or rank
    pub relaxations: u64,
    /// Halo updates that lowered an owner's label or rank
    pub halo_updates: u64,
    /// Frontier or staging buffers that had to grow
    pub queue_growths: u64,
    /// Highest delta-stepping priority level reached
    pub priority_level: u64,
}

/// Frontier entry produced by advance
#[derive(Debug, Clone, Copy)]
struct Hit {
    vertex: u32,
    halo: bool,
}

/// Advance output for one device
#[derive(Debug, Default)]
struct Advance {
    owned: Vec<u32>,
    halo: Vec<u32>,
    edges: usize,
    relaxations: usize,
}

/// Drives a [`Problem`] from its reset state to convergence
pub struct Enactor<'p> {
    problem: &'p mut Problem,
    stats: EnactStats,
    round: u32,
    level: u64,
    far: Vec<Vec<u32>>,
}

impl<'p> Enactor<'p> {
    /// Enactor for a freshly reset problem
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless the problem is [`ProblemState::Ready`]
    pub fn new(problem: &'p mut Problem) -> Result<Self> {
        if problem.state() != ProblemState::Ready {
            return Err(SsspError::InvalidState {
                operation: "enact",
                state: problem.state().as_str(),
            });
        }
        let far = vec![Vec::new(); problem.data_slices().len()];
        Ok(Self {
            problem,
            stats: EnactStats::default(),
            round: 0,
            level: 0,
            far,
        })
    }

    /// Counters so far
    #[must_use]
    pub const fn stats(&self) -> &EnactStats {
        &self.stats
    }

    /// Problem being driven
    #[must_use]
    pub fn problem(&self) -> &Problem {
        self.problem
    }

    /// Whether no work is left
    #[must_use]
    pub fn is_converged(&self) -> bool {
        self.problem
            .data_slices()
            .iter()
            .all(|s| s.frontier().is_empty())
            && self.far.iter().all(Vec::is_empty)
    }

    /// Run until convergence
    ///
    /// # Errors
    ///
    /// Returns the first error raised by a round
    pub fn enact(mut self) -> Result<EnactStats> {
        while self.step()? {}
        tracing::info!(
            rounds = self.stats.rounds,
            edges = self.stats.edges_visited,
            relaxations = self.stats.relaxations,
            halo_updates = self.stats.halo_updates,
            queue_growths = self.stats.queue_growths,
            "SSSP converged"
        );
        Ok(self.stats)
    }

    /// Run one round; `Ok(false)` once converged
    ///
    /// # Errors
    ///
    /// Returns the first `DeviceError` raised by any device, or `InvalidGraph`
    /// if a halo vertex has no recorded owner
    pub fn step(&mut self) -> Result<bool> {
        if self.is_converged() {
            return self.finish();
        }
        self.problem.set_state(ProblemState::Running);

        let marker = self.round;
        if marker == UNVISITED {
            return Err(SsspError::InvalidState {
                operation: "start another round",
                state: "out of visited markers",
            });
        }

        let (devices, subgraphs, slices, registry) = self.problem.parts_mut();

        let mut advances = Vec::with_capacity(slices.len());
        for (slice, subgraph) in slices.iter().zip(subgraphs) {
            let ctx = devices.select(slice.device())?;
            let frontier = slice.frontier().to_vec()?;
            let functor = SsspFunctor::new(slice)?;
            let advance = advance(&functor, subgraph, &frontier, slice, marker)?;
            tracing::trace!(
                device = %ctx.id(),
                frontier = frontier.len(),
                queued = advance.owned.len(),
                halo = advance.halo.len(),
                "Advanced"
            );
            advances.push(advance);
        }

        let mut next: Vec<Vec<u32>> = advances
            .iter_mut()
            .map(|a| std::mem::take(&mut a.owned))
            .collect();
        for advance in &advances {
            self.stats.edges_visited += advance.edges as u64;
            self.stats.relaxations += advance.relaxations as u64;
        }

        if slices.len() > 1 {
            let halo: Vec<Vec<u32>> = advances.into_iter().map(|a| a.halo).collect();
            self.stats.queue_growths += stage_halo(devices, slices, &halo)?;
            self.stats.halo_updates +=
                deliver_halo(subgraphs, slices, registry, &halo, marker, &mut next)?;
        }

        self.level = bucket(slices, &mut next, &mut self.far, self.level)?;
        self.stats.priority_level = self.level;

        for (slice, near) in slices.iter_mut().zip(&next) {
            let ctx = devices.select(slice.device())?;
            if slice.frontier_mut().load(&ctx, near)? {
                self.stats.queue_growths += 1;
                tracing::warn!(
                    device = %ctx.id(),
                    len = near.len(),
                    capacity = slice.frontier().capacity(),
                    "Frontier queue overflowed, grew it"
                );
            }
        }

        self.round += 1;
        self.stats.rounds += 1;
        tracing::trace!(
            round = self.round,
            level = self.level,
            frontier = next.iter().map(Vec::len).sum::<usize>(),
            far = self.far.iter().map(Vec::len).sum::<usize>(),
            "Finished round"
        );

        if self.is_converged() {
            return self.finish();
        }
        Ok(true)
    }

    /// Mark the run converged, settling predecessors on the first call
    fn finish(&mut self) -> Result<bool> {
        if self.problem.state() != ProblemState::Converged {
            let (_, subgraphs, slices, _) = self.problem.parts_mut();
            mark_predecessors(subgraphs, slices)?;
            self.problem.set_state(ProblemState::Converged);
        }
        Ok(false)
    }
}

/// Split `next` into near (kept) and far (deferred) entries
///
/// When every near queue is empty, the level moves up to the lowest waiting
/// bucket and its vertices come back. Returns the new level.
fn bucket(
    slices: &[DataSlice],
    next: &mut [Vec<u32>],
    far: &mut [Vec<u32>],
    level: u64,
) -> std::result::Result<u64, DeviceError> {
    let priorities = slices
        .iter()
        .map(PriorityFunctor::new)
        .collect::<std::result::Result<Vec<_>, _>>()?;

    for ((slice, priority), (near, far)) in slices
        .iter()
        .zip(&priorities)
        .zip(next.iter_mut().zip(far.iter_mut()))
    {
        if slice.delta().is_none() {
            continue;
        }
        let (keep, defer): (Vec<u32>, Vec<u32>) = near
            .iter()
            .partition(|&&v| priority.bucket(v).map_or(true, |b| b <= level));
        *near = keep;
        far.extend(defer);
    }

    if next.iter().any(|n| !n.is_empty()) || far.iter().all(Vec::is_empty) {
        return Ok(level);
    }

    let lowest = far
        .iter()
        .zip(&priorities)
        .flat_map(|(far, priority)| far.iter().filter_map(move |&v| priority.bucket(v)))
        .min();
    let level = lowest.map_or(level, |lowest| level.max(lowest));

    for ((far, priority), near) in far.iter_mut().zip(&priorities).zip(next.iter_mut()) {
        let (ready, waiting): (Vec<u32>, Vec<u32>) = far
            .iter()
            .partition(|&&v| priority.bucket(v).map_or(true, |b| b <= level));
        near.extend(ready);
        near.sort_unstable();
        near.dedup();
        *far = waiting;
    }
    Ok(level)
}

/// Relax every out-edge of `frontier`, then filter the queued vertices
#[allow(clippy::cast_possible_truncation)]
fn advance<F: Functor>(
    functor: &F,
    subgraph: &SubGraph,
    frontier: &[u32],
    slice: &DataSlice,
    marker: u32,
) -> std::result::Result<Advance, DeviceError> {
    let visited: DeviceArray<'_, u32> = slice.visited().device_array()?;
    let graph = subgraph.graph();
    let (_, col_indices, _) = graph.csr_components();
    let num_owned = subgraph.num_owned();
    let relaxations = AtomicUsize::new(0);

    let hits: Vec<Hit> = frontier
        .par_iter()
        .flat_map_iter(|&src| {
            let relaxations = &relaxations;
            graph.edge_range(src).filter_map(move |e| {
                let edge = EdgeRef {
                    src,
                    dst: col_indices[e],
                    edge: e as u32,
                };
                if !functor.relax(edge) {
                    return None;
                }
                functor.on_relaxed(edge);
                relaxations.fetch_add(1, Ordering::Relaxed);
                (visited.swap(edge.dst as usize, marker) != marker).then_some(Hit {
                    vertex: edge.dst,
                    halo: edge.dst as usize >= num_owned,
                })
            })
        })
        .collect();

    let edges = frontier.iter().map(|&v| graph.edge_range(v).len()).sum();
    let (halo, owned): (Vec<Hit>, Vec<Hit>) = hits.into_iter().partition(|h| h.halo);

    let owned = owned
        .into_par_iter()
        .map(|h| h.vertex)
        .filter(|&v| functor.accept_vertex(v))
        .map(|v| {
            functor.on_vertex_accepted(v);
            v
        })
        .collect();

    Ok(Advance {
        owned,
        halo: halo.into_iter().map(|h| h.vertex).collect(),
        edges,
        relaxations: relaxations.into_inner(),
    })
}

/// Copy each improved halo vertex's label and rank into staging
///
/// Returns how many staging buffers had to grow.
fn stage_halo(
    devices: &DeviceSet,
    slices: &mut [DataSlice],
    halo: &[Vec<u32>],
) -> std::result::Result<u64, DeviceError> {
    let mut growths = 0;
    for (slice, touched) in slices.iter_mut().zip(halo) {
        if touched.is_empty() {
            continue;
        }
        let ctx = devices.select(slice.device())?;
        let capacity = slice.halo.capacity();
        if touched.len() > capacity {
            slice.halo.reserve(&ctx, touched.len().max(capacity * 2))?;
            growths += 1;
            tracing::warn!(
                device = %ctx.id(),
                len = touched.len(),
                capacity,
                "Halo staging overflowed, grew it"
            );
        }

        let labels = slice.labels().device_array()?;
        let keys = slice.halo.keys.device_array()?;
        let staged_labels = slice.halo.labels.device_array()?;
        for (i, &local) in touched.iter().enumerate() {
            keys.store(i, local);
            staged_labels.store(i, labels.load(local as usize));
        }
        if let (Some(ranks), Some(staged)) = (slice.ranks(), &slice.halo.ranks) {
            let ranks = ranks.device_array()?;
            let staged = staged.device_array()?;
            for (i, &local) in touched.iter().enumerate() {
                staged.store(i, ranks.load(local as usize));
            }
        }
    }
    Ok(growths)
}

/// Owner slice and owner-local index of halo vertex `local`
fn halo_target<'s>(
    subgraph: &SubGraph,
    slices: &'s [DataSlice],
    sender: &DataSlice,
    local: u32,
) -> Result<(&'s DataSlice, u32)> {
    let target = subgraph.halo_owner(local).ok_or_else(|| {
        SsspError::InvalidGraph(format!(
            "halo vertex {local} on device {} has no owner",
            sender.device()
        ))
    })?;
    let owner = slices
        .get(target.owner.index())
        .ok_or(DeviceError::DeviceSelectFailure {
            device: target.owner,
            reason: "owner has no data slice".to_string(),
        })?;
    Ok((owner, target.remote_index))
}

/// Merge staged halo updates into their owners
///
/// Owners whose label or rank dropped queue the vertex in `next`. Returns the
/// number of such updates.
fn deliver_halo(
    subgraphs: &[SubGraph],
    slices: &[DataSlice],
    registry: &AssociateRegistry,
    halo: &[Vec<u32>],
    marker: u32,
    next: &mut [Vec<u32>],
) -> Result<u64> {
    let mut updates = 0;
    for ((sender, subgraph), touched) in slices.iter().zip(subgraphs).zip(halo) {
        if touched.is_empty() {
            continue;
        }
        let keys = sender.halo.keys.device_array()?;
        let staged_labels = sender.halo.labels.device_array()?;
        let staged_ranks = sender
            .halo
            .ranks
            .as_ref()
            .map(|r| r.device_array())
            .transpose()?;

        for i in 0..touched.len() {
            let (owner, remote_index) = halo_target(subgraph, slices, sender, keys.load(i))?;
            let remote = remote_index as usize;
            let mut dropped = false;

            if registry.contains(owner.device(), AssociateKind::Labels) {
                let label = staged_labels.load(i);
                dropped |= label < owner.labels().device_array()?.fetch_min(remote, label);
            }
            if let (Some(staged), Some(ranks)) = (staged_ranks, owner.ranks()) {
                if registry.contains(owner.device(), AssociateKind::Predecessors) {
                    let rank = staged.load(i);
                    dropped |= rank < ranks.device_array()?.fetch_min(remote, rank);
                }
            }

            if dropped {
                updates += 1;
                let visited = owner.visited().device_array()?;
                if visited.swap(remote, marker) != marker {
                    next[owner.device().index()].push(remote_index);
                }
            }
        }
    }
    Ok(updates)
}

/// Replace provisional predecessors with canonical ones
///
/// A reached vertex gets the smallest global id among the in-neighbours whose
/// rank, extended by the connecting edge, equals its own. Hops drop by one
/// along every predecessor pointer, so each chain ends at the source.
#[allow(clippy::cast_possible_truncation)]
fn mark_predecessors(subgraphs: &[SubGraph], slices: &[DataSlice]) -> Result<()> {
    for slice in slices {
        if let Some(preds) = slice.preds() {
            preds.fill(NO_PREDECESSOR)?;
        }
    }

    for (slice, subgraph) in slices.iter().zip(subgraphs) {
        let (Some(ranks), Some(preds)) = (slice.ranks(), slice.preds()) else {
            continue;
        };
        let ranks = ranks.device_array()?;
        let preds = preds.device_array()?;
        let weights = slice.weights().device_array()?;
        let original = slice.original_vertex()?;
        let graph = subgraph.graph();
        let (_, col_indices, _) = graph.csr_components();
        let num_owned = subgraph.num_owned();

        // Halo destinations are settled against the owner's rank below
        let remote: Vec<(u32, u64, u32)> = (0..num_owned as u32)
            .into_par_iter()
            .flat_map_iter(|src| {
                let rank = ranks.load(src as usize);
                let id = original.load(src as usize);
                graph.edge_range(src).filter_map(move |e| {
                    let candidate = extend_rank(rank, weights.load(e))?;
                    let dst = col_indices[e];
                    if dst as usize >= num_owned {
                        return Some((dst, candidate, id));
                    }
                    if ranks.load(dst as usize) == candidate {
                        preds.fetch_min(dst as usize, id);
                    }
                    None
                })
            })
            .collect();

        for (local, candidate, id) in remote {
            let (owner, remote_index) = halo_target(subgraph, slices, slice, local)?;
            if let (Some(ranks), Some(preds)) = (owner.ranks(), owner.preds()) {
                if ranks.device_array()?.load(remote_index as usize) == candidate {
                    preds.device_array()?.fetch_min(remote_index as usize, id);
                }
            }
        }
    }
    Ok(())
}
