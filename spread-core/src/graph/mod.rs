//! Dependency Graph
//!
//! This module implements the dependency-driven computation graph: nodes are
//! computation cells, directed edges say "this cell's value is an input to
//! that one", and an evaluation epoch drives every cell to a cached value in
//! dependency order.
//!
//! # Design Decisions
//!
//! 1. Nodes live in a centralized arena keyed by [`NodeId`], and dependency
//!    lists store ids rather than aliased references. Removal and membership
//!    checks compare identities, and no shared ownership is needed for a
//!    node that many others depend on.
//!
//! 2. Evaluation runs a topological pass (Kahn's algorithm) instead of
//!    repeatedly sweeping for satisfiable nodes. Each node is visited once
//!    per epoch, and cycles or dangling references come out as errors
//!    instead of a scheduler that never terminates.
//!
//! 3. The cached value is an explicit tri-state ([`CacheState`]), never a
//!    sentinel comparison, so any caller-chosen value type works.

mod error;
mod node;
mod scheduler;

pub use error::GraphError;
pub use node::{CacheState, Evaluation, Node, NodeId};
pub use scheduler::Graph;
