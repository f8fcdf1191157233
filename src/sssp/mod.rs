//! Single-source shortest paths over one or more devices
//!
//! - [`DataSlice`]: per-device labels, weights, predecessors and scratch
//! - [`Problem`]: partitions the graph, resets per source, gathers results
//! - [`SsspFunctor`]: edge relaxation and vertex filter
//! - [`PriorityFunctor`]: delta-stepping bucket score
//! - [`Enactor`]: bulk-synchronous driver running rounds to convergence
//! - [`dijkstra`] / [`validate`]: CPU reference used to check results

mod data_slice;
mod enactor;
mod functor;
mod priority;
mod problem;
mod reference;
mod result;

pub use data_slice::{
    compute_delta, DataSlice, Frontier, FrontierType, INVALID_VERTEX, UNREACHED, UNVISITED,
};
pub use enactor::{EnactStats, Enactor};
pub use functor::{
    extend_rank, pack_rank, rank_distance, rank_hops, EdgeRef, Functor, SsspFunctor,
    NO_PREDECESSOR, NO_RANK, SOURCE_RANK,
};
pub use priority::{bucket_of, priority_score, PriorityFunctor};
pub use problem::{Problem, ProblemState};
pub use reference::{dijkstra, validate};
pub use result::{GatherReport, SsspResult};
