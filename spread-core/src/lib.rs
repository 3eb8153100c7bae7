//! Spread Core
//!
//! This crate provides the core engine of Spread: a dependency-driven,
//! memoizing computation graph. It implements:
//!
//! - Computation cells with identity, ordered dependencies, and a
//!   caller-supplied evaluation function
//! - Memoized results behind an explicit cache state (no sentinel values)
//! - A scheduler that evaluates the whole graph in dependency order,
//!   detecting cycles and dangling references instead of hanging
//! - Explicit, optionally cascading cache invalidation
//!
//! This is the pattern underlying spreadsheets, build systems, and
//! incremental-computation engines: the engine is agnostic to what an
//! evaluation function computes, so callers supply anything from constant
//! cells to expensive domain-specific computations.
//!
//! # Example
//!
//! ```rust
//! use spread_core::{Graph, Node};
//!
//! let mut graph = Graph::new();
//!
//! let price = graph.add_node(Node::source("Price", "list price", 100.0));
//! let tax = graph.add_node(Node::new(
//!     "Tax",
//!     "20% of price",
//!     [price],
//!     |inputs: &[f64]| inputs[0] * 0.2,
//! ));
//! let total = graph.add_node(Node::new(
//!     "Total",
//!     "price plus tax",
//!     [price, tax],
//!     |inputs: &[f64]| inputs[0] + inputs[1],
//! ));
//!
//! graph.evaluate().unwrap();
//! assert_eq!(graph.value(total), Some(&120.0));
//! ```

pub mod graph;

pub use graph::{CacheState, Evaluation, Graph, GraphError, Node, NodeId};
