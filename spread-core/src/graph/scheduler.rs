//! Evaluation Scheduler
//!
//! The graph owns the node arena and drives every node to an evaluated state
//! in dependency order.
//!
//! # Algorithm
//!
//! One evaluation epoch runs in two phases:
//!
//! 1. A pre-pass walks every dependency list and rejects references to nodes
//!    that are not in the arena. Such a dependency can never become
//!    satisfied, so it is reported as an error up front instead of wedging
//!    the scheduler.
//! 2. A topological pass (Kahn's algorithm) evaluates nodes in dependency
//!    order, each exactly once. Nodes still unprocessed when the queue
//!    drains lie on a cycle, which is reported as an error.
//!
//! A naive alternative is to repeatedly sweep the arena evaluating whatever
//! currently has all dependencies satisfied. That visits O(n²) nodes in the
//! worst case and spins forever on a cyclic or dangling graph; the
//! topological pass gets a single visit per node and cycle detection as a
//! by-product.

use std::collections::{HashMap, HashSet, VecDeque};

use indexmap::IndexMap;
use tracing::{debug, trace};

use super::error::GraphError;
use super::node::{Node, NodeId};

/// A directed acyclic graph of computation cells.
///
/// Nodes live in an arena keyed by [`NodeId`]; dependency lists hold ids
/// rather than references, so removal and membership checks are unambiguous
/// and need no shared ownership. Insertion order is preserved for iteration
/// and display but carries no meaning for evaluation.
pub struct Graph<T> {
    /// All nodes in the graph, indexed by ID.
    nodes: IndexMap<NodeId, Node<T>>,
}

impl<T> Graph<T> {
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self {
            nodes: IndexMap::new(),
        }
    }

    /// Create a graph from an initial node collection.
    pub fn from_nodes(nodes: impl IntoIterator<Item = Node<T>>) -> Self {
        Self {
            nodes: nodes.into_iter().map(|node| (node.id(), node)).collect(),
        }
    }

    /// Add a node to the graph, returning its id.
    pub fn add_node(&mut self, node: Node<T>) -> NodeId {
        let id = node.id();
        self.nodes.insert(id, node);
        id
    }

    /// Remove a node from the graph.
    ///
    /// Removal is rejected with [`GraphError::DanglingReference`] while any
    /// remaining node still lists the target as a dependency; permitting it
    /// would leave those dependents permanently unsatisfiable. A node that
    /// only depends on itself can always be removed.
    pub fn remove_node(&mut self, id: NodeId) -> Result<Node<T>, GraphError> {
        if !self.nodes.contains_key(&id) {
            return Err(GraphError::UnknownNode { node: id });
        }

        let dependents: Vec<NodeId> = self
            .nodes
            .iter()
            .filter(|(other, node)| **other != id && node.dependencies().contains(&id))
            .map(|(other, _)| *other)
            .collect();

        if !dependents.is_empty() {
            return Err(GraphError::DanglingReference {
                node: id,
                dependents,
            });
        }

        debug!(node = %id, "removing node");
        Ok(self
            .nodes
            .shift_remove(&id)
            .expect("presence checked above"))
    }

    /// Get a reference to a node.
    pub fn node(&self, id: NodeId) -> Option<&Node<T>> {
        self.nodes.get(&id)
    }

    /// Get a mutable reference to a node.
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node<T>> {
        self.nodes.get_mut(&id)
    }

    /// Get a node's cached value, if it has been evaluated.
    pub fn value(&self, id: NodeId) -> Option<&T> {
        self.nodes.get(&id).and_then(Node::value)
    }

    /// Iterate over the nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node<T>> {
        self.nodes.values()
    }

    /// Iterate over the node ids in insertion order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Get the total number of nodes in the graph.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// True when the graph holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// True iff the node exists and every dependency is present in the graph
    /// and evaluated. A node with no dependencies is always satisfied. Pure
    /// query, no side effect.
    pub fn dependencies_satisfied(&self, id: NodeId) -> bool {
        self.nodes.get(&id).is_some_and(|node| {
            node.dependencies()
                .iter()
                .all(|dep| self.nodes.get(dep).is_some_and(Node::is_evaluated))
        })
    }

    /// Invalidate a node and, transitively, every node that depends on it.
    ///
    /// This is the cascading counterpart to
    /// [`Node::update_evaluation`](super::Node::update_evaluation), which
    /// deliberately resets only its own node. Returns the ids visited by the
    /// walk (the target first); nodes that were not yet evaluated are visited
    /// but keep their `Unset` state.
    pub fn invalidate(&mut self, id: NodeId) -> Result<Vec<NodeId>, GraphError> {
        if !self.nodes.contains_key(&id) {
            return Err(GraphError::UnknownNode { node: id });
        }

        let dependents = self.dependents();

        // BFS from the target over reverse edges.
        let mut visited = HashSet::new();
        let mut reset = Vec::new();
        let mut queue = VecDeque::from([id]);

        while let Some(current) = queue.pop_front() {
            if !visited.insert(current) {
                continue;
            }
            let node = self
                .nodes
                .get_mut(&current)
                .expect("walk stays inside the arena");
            node.invalidate();
            reset.push(current);

            if let Some(next) = dependents.get(&current) {
                queue.extend(next.iter().copied());
            }
        }

        debug!(start = %id, count = reset.len(), "cascading invalidation");
        Ok(reset)
    }

    /// Reverse adjacency: for each node, the nodes that list it as a
    /// dependency. Computed on demand; the arena stores forward edges only.
    fn dependents(&self) -> HashMap<NodeId, Vec<NodeId>> {
        let mut dependents: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        for (id, node) in &self.nodes {
            for dep in node.dependencies() {
                dependents.entry(*dep).or_default().push(*id);
            }
        }
        dependents
    }
}

impl<T: Clone> Graph<T> {
    /// Drive every node in the graph to an evaluated state.
    ///
    /// Nodes are visited in topological order, each exactly once per epoch.
    /// Already-evaluated nodes keep their cached values; their evaluation
    /// functions do not run again. On error no partial rollback happens:
    /// nodes evaluated before the problem was found keep their new values.
    ///
    /// # Errors
    ///
    /// - [`GraphError::UnsatisfiableDependency`] when any node depends on an
    ///   id absent from the graph.
    /// - [`GraphError::CyclicDependency`] when the dependency relation
    ///   contains a cycle (a self-dependency included).
    pub fn evaluate(&mut self) -> Result<(), GraphError> {
        debug!(nodes = self.nodes.len(), "starting evaluation epoch");

        // Pre-pass: every dependency must resolve into the arena.
        for (id, node) in &self.nodes {
            for dep in node.dependencies() {
                if !self.nodes.contains_key(dep) {
                    return Err(GraphError::UnsatisfiableDependency {
                        node: *id,
                        missing: *dep,
                    });
                }
            }
        }

        // Kahn's algorithm. Duplicate dependency entries count as parallel
        // edges; each contributes to the in-degree and to the reverse list,
        // so the bookkeeping stays consistent.
        let mut in_degree: IndexMap<NodeId, usize> = self
            .nodes
            .iter()
            .map(|(id, node)| (*id, node.dependencies().len()))
            .collect();
        let dependents = self.dependents();

        let mut queue: VecDeque<NodeId> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(id, _)| *id)
            .collect();
        let mut processed = 0;

        while let Some(id) = queue.pop_front() {
            processed += 1;
            self.evaluate_node(id);

            if let Some(next) = dependents.get(&id) {
                for &dependent in next {
                    let degree = in_degree
                        .get_mut(&dependent)
                        .expect("every node has an in-degree entry");
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(dependent);
                    }
                }
            }
        }

        if processed < self.nodes.len() {
            let nodes = in_degree
                .iter()
                .filter(|(_, degree)| **degree > 0)
                .map(|(id, _)| *id)
                .collect();
            return Err(GraphError::CyclicDependency { nodes });
        }

        Ok(())
    }

    /// Evaluate one node, feeding it its dependencies' values in order.
    ///
    /// Callers must have evaluated every dependency already; the topological
    /// pass guarantees this.
    fn evaluate_node(&mut self, id: NodeId) {
        let node = self.nodes.get(&id).expect("id came from the arena");
        if node.is_evaluated() {
            return;
        }

        trace!(node = %id, name = node.name(), "evaluating node");
        let inputs: Vec<T> = node
            .dependencies()
            .iter()
            .map(|dep| {
                self.nodes
                    .get(dep)
                    .and_then(Node::value)
                    .cloned()
                    .expect("dependencies are evaluated before their dependents")
            })
            .collect();

        let node = self.nodes.get_mut(&id).expect("id came from the arena");
        node.evaluate(&inputs);
    }
}

impl<T> Default for Graph<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_remove_nodes() {
        let mut graph: Graph<i64> = Graph::new();

        let id1 = graph.add_node(Node::source("a", "", 1));
        let id2 = graph.add_node(Node::source("b", "", 2));

        assert_eq!(graph.node_count(), 2);

        graph.remove_node(id1).unwrap();
        assert_eq!(graph.node_count(), 1);
        assert!(graph.node(id1).is_none());
        assert!(graph.node(id2).is_some());
    }

    #[test]
    fn from_nodes_preserves_the_given_order() {
        let a = Node::source("a", "", 1_i64);
        let b = Node::source("b", "", 2_i64);
        let (a_id, b_id) = (a.id(), b.id());

        let graph = Graph::from_nodes([b, a]);

        assert_eq!(graph.node_count(), 2);
        let ids: Vec<NodeId> = graph.node_ids().collect();
        assert_eq!(ids, vec![b_id, a_id]);
    }

    #[test]
    fn removing_unknown_node_fails() {
        let mut graph: Graph<i64> = Graph::new();
        let id = NodeId::new();

        assert_eq!(
            graph.remove_node(id),
            Err(GraphError::UnknownNode { node: id })
        );
    }

    #[test]
    fn removal_with_live_dependents_is_rejected() {
        let mut graph: Graph<i64> = Graph::new();

        let base = graph.add_node(Node::source("base", "", 1));
        let derived = graph.add_node(Node::new("derived", "", [base], |inputs: &[i64]| {
            inputs[0] + 1
        }));

        assert_eq!(
            graph.remove_node(base),
            Err(GraphError::DanglingReference {
                node: base,
                dependents: vec![derived],
            })
        );

        // Dropping the edge makes the removal legal.
        graph.node_mut(derived).unwrap().remove_dependency(base);
        assert!(graph.remove_node(base).is_ok());
    }

    #[test]
    fn evaluate_resolves_a_chain() {
        let mut graph: Graph<i64> = Graph::new();

        let base = graph.add_node(Node::source("base", "", 2));
        let doubled = graph.add_node(Node::new("doubled", "", [base], |inputs: &[i64]| {
            inputs[0] * 2
        }));
        let squared = graph.add_node(Node::new("squared", "", [doubled], |inputs: &[i64]| {
            inputs[0] * inputs[0]
        }));

        graph.evaluate().unwrap();

        assert_eq!(graph.value(base), Some(&2));
        assert_eq!(graph.value(doubled), Some(&4));
        assert_eq!(graph.value(squared), Some(&16));
        assert!(graph.node_ids().all(|id| graph.dependencies_satisfied(id)));
    }

    #[test]
    fn duplicate_dependencies_feed_two_inputs() {
        let mut graph: Graph<i64> = Graph::new();

        let base = graph.add_node(Node::source("base", "", 3));
        let twice = graph.add_node(Node::new("twice", "", [base, base], |inputs: &[i64]| {
            inputs[0] + inputs[1]
        }));

        graph.evaluate().unwrap();
        assert_eq!(graph.value(twice), Some(&6));
    }

    #[test]
    fn dependencies_satisfied_tracks_evaluation() {
        let mut graph: Graph<i64> = Graph::new();

        let base = graph.add_node(Node::source("base", "", 1));
        let derived = graph.add_node(Node::new("derived", "", [base], |inputs: &[i64]| {
            inputs[0]
        }));

        // Leaf is satisfied immediately; the derived node is not until its
        // dependency has been evaluated.
        assert!(graph.dependencies_satisfied(base));
        assert!(!graph.dependencies_satisfied(derived));

        graph.evaluate().unwrap();
        assert!(graph.dependencies_satisfied(derived));

        // Unknown ids are never satisfied.
        assert!(!graph.dependencies_satisfied(NodeId::new()));
    }

    #[test]
    fn cycle_is_detected_not_spun_on() {
        let mut graph: Graph<i64> = Graph::new();

        let x = graph.add_node(Node::new("x", "", [], |inputs: &[i64]| {
            inputs.first().copied().unwrap_or(0)
        }));
        let y = graph.add_node(Node::new("y", "", [x], |inputs: &[i64]| inputs[0]));
        graph.node_mut(x).unwrap().add_dependency(y);

        match graph.evaluate() {
            Err(GraphError::CyclicDependency { nodes }) => {
                assert!(nodes.contains(&x));
                assert!(nodes.contains(&y));
            }
            other => panic!("expected CyclicDependency, got {other:?}"),
        }
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let mut graph: Graph<i64> = Graph::new();

        let id = graph.add_node(Node::new("narcissus", "", [], |_: &[i64]| 0));
        graph.node_mut(id).unwrap().add_dependency(id);

        assert_eq!(
            graph.evaluate(),
            Err(GraphError::CyclicDependency { nodes: vec![id] })
        );
    }

    #[test]
    fn missing_dependency_is_reported() {
        let mut graph: Graph<i64> = Graph::new();

        let ghost = NodeId::new();
        let node = graph.add_node(Node::new("orphan", "", [ghost], |inputs: &[i64]| {
            inputs[0]
        }));

        assert_eq!(
            graph.evaluate(),
            Err(GraphError::UnsatisfiableDependency {
                node,
                missing: ghost,
            })
        );
    }

    #[test]
    fn invalidate_cascades_to_dependents() {
        let mut graph: Graph<i64> = Graph::new();

        let base = graph.add_node(Node::source("base", "", 1));
        let mid = graph.add_node(Node::new("mid", "", [base], |inputs: &[i64]| {
            inputs[0] + 1
        }));
        let top = graph.add_node(Node::new("top", "", [mid], |inputs: &[i64]| {
            inputs[0] + 1
        }));
        let aside = graph.add_node(Node::source("aside", "", 9));

        graph.evaluate().unwrap();

        let reset = graph.invalidate(mid).unwrap();
        assert_eq!(reset, vec![mid, top]);

        assert!(graph.node(base).unwrap().is_evaluated());
        assert!(!graph.node(mid).unwrap().is_evaluated());
        assert!(!graph.node(top).unwrap().is_evaluated());
        assert!(graph.node(aside).unwrap().is_evaluated());

        graph.evaluate().unwrap();
        assert_eq!(graph.value(top), Some(&3));
    }

    #[test]
    fn invalidate_unknown_node_fails() {
        let mut graph: Graph<i64> = Graph::new();
        let id = NodeId::new();

        assert_eq!(
            graph.invalidate(id),
            Err(GraphError::UnknownNode { node: id })
        );
    }

    #[test]
    fn insertion_order_is_preserved_for_iteration() {
        let mut graph: Graph<i64> = Graph::new();

        let first = graph.add_node(Node::source("first", "", 1));
        let second = graph.add_node(Node::source("second", "", 2));
        let third = graph.add_node(Node::source("third", "", 3));

        let ids: Vec<NodeId> = graph.node_ids().collect();
        assert_eq!(ids, vec![first, second, third]);
    }

    #[test]
    fn evaluating_an_empty_graph_is_ok() {
        let mut graph: Graph<i64> = Graph::new();
        assert!(graph.evaluate().is_ok());
        assert!(graph.is_empty());
    }
}
