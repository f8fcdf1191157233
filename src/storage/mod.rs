//! Graph storage layer
//!
//! Provides the CSR (Compressed Sparse Row) input graph.

pub mod csr;

pub use csr::{CsrGraph, NodeId};
