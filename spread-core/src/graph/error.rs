//! Graph error taxonomy.
//!
//! Structural problems are surfaced eagerly as values of [`GraphError`]
//! instead of manifesting as a scheduler that never terminates. Panics from
//! caller-supplied evaluation functions are not part of this taxonomy; they
//! propagate unchanged.

use thiserror::Error;

use super::node::NodeId;

/// Errors reported by graph mutation and evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// An operation referenced a node id that is not in the graph.
    #[error("node {node} is not in the graph")]
    UnknownNode { node: NodeId },

    /// A node depends on a node that is not in the graph, so it can never
    /// become satisfied. Detected by the pre-pass of
    /// [`Graph::evaluate`](super::Graph::evaluate).
    #[error("node {node} depends on node {missing}, which is not in the graph")]
    UnsatisfiableDependency { node: NodeId, missing: NodeId },

    /// The dependency relation contains a cycle. The listed nodes are the
    /// ones left unprocessed by the topological pass; the cycle runs through
    /// some subset of them.
    #[error("dependency cycle among {} node(s): {nodes:?}", nodes.len())]
    CyclicDependency { nodes: Vec<NodeId> },

    /// A node removal was rejected because other nodes still list it as a
    /// dependency; removing it would leave them permanently unsatisfiable.
    #[error("cannot remove node {node}: still a dependency of {dependents:?}")]
    DanglingReference {
        node: NodeId,
        dependents: Vec<NodeId>,
    },
}
