//! Graph Nodes
//!
//! This module defines the computation cells that live in the dependency
//! graph: a node's identity, its ordered dependency list, its evaluation
//! function, and its memoized result.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use smallvec::SmallVec;

/// Unique identifier for a node in the dependency graph.
///
/// Identifiers are assigned from a process-wide counter at construction and
/// never change. Two nodes are the same node iff their identifiers match;
/// name, description, and value play no part in equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u64);

impl NodeId {
    /// Generate a new unique node ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Cache state of a node's value.
///
/// This is an explicit tri-state rather than an `Option` compared against a
/// sentinel, so a value type whose natural "empty" value is meaningful (an
/// empty string, zero, an empty vec) is cached and returned like any other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheState<T> {
    /// The node has never been evaluated.
    Unset,

    /// The node has been evaluated and holds its result.
    Computed(T),

    /// The node was evaluated once, then explicitly invalidated. The next
    /// evaluation epoch recomputes it.
    Invalidated,
}

impl<T> CacheState<T> {
    /// True only for `Computed`.
    pub fn is_computed(&self) -> bool {
        matches!(self, CacheState::Computed(_))
    }

    /// The cached value, if one is present.
    pub fn value(&self) -> Option<&T> {
        match self {
            CacheState::Computed(value) => Some(value),
            _ => None,
        }
    }
}

/// The evaluation function of a node.
///
/// It receives the current values of the node's dependencies, in the order
/// they appear in the dependency list (duplicates included), and produces the
/// node's value. Panics raised inside it propagate unchanged to the caller of
/// the evaluation — the engine never catches or retries.
pub type Evaluation<T> = Box<dyn Fn(&[T]) -> T + Send + Sync>;

/// A single computation cell in the dependency graph.
///
/// A node does not own its dependencies: the dependency list holds [`NodeId`]s
/// that resolve into the graph's arena. The node itself therefore cannot tell
/// whether its dependencies are evaluated; that query lives on the graph.
pub struct Node<T> {
    /// Unique identifier, assigned at construction.
    id: NodeId,

    /// Human-readable display label.
    name: String,

    /// Free-text description.
    description: String,

    /// Ordered dependency references. Duplicates are permitted; each
    /// occurrence contributes one input value to the evaluation function.
    dependencies: SmallVec<[NodeId; 4]>,

    /// Caller-supplied evaluation function.
    evaluation: Evaluation<T>,

    /// Memoized result.
    cache: CacheState<T>,
}

impl<T> Node<T> {
    /// Create a node with the given dependencies and evaluation function.
    ///
    /// The identifier is assigned here; the node starts unevaluated.
    pub fn new<F>(
        name: impl Into<String>,
        description: impl Into<String>,
        dependencies: impl IntoIterator<Item = NodeId>,
        evaluation: F,
    ) -> Self
    where
        F: Fn(&[T]) -> T + Send + Sync + 'static,
    {
        Self {
            id: NodeId::new(),
            name: name.into(),
            description: description.into(),
            dependencies: dependencies.into_iter().collect(),
            evaluation: Box::new(evaluation),
            cache: CacheState::Unset,
        }
    }

    /// Get the node's ID.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Get the node's display label.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the node's description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Get the ordered dependency list.
    pub fn dependencies(&self) -> &[NodeId] {
        &self.dependencies
    }

    /// Append a dependency to the end of the list.
    ///
    /// Duplicates are allowed. Adding or removing a dependency does not touch
    /// the cached value; callers that need recomputation after a topology
    /// change must invalidate explicitly.
    pub fn add_dependency(&mut self, dependency: NodeId) {
        self.dependencies.push(dependency);
    }

    /// Remove the first occurrence of a dependency.
    ///
    /// Returns `false` (a no-op) when the id is not in the list.
    pub fn remove_dependency(&mut self, dependency: NodeId) -> bool {
        match self.dependencies.iter().position(|&d| d == dependency) {
            Some(index) => {
                self.dependencies.remove(index);
                true
            }
            None => false,
        }
    }

    /// Evaluate the node against the given dependency values, memoizing.
    ///
    /// `inputs` must hold one value per dependency-list entry, in order. The
    /// evaluation function runs only when no cached value exists; otherwise
    /// the cached value is returned untouched, so the function runs at most
    /// once per cache lifetime.
    pub fn evaluate(&mut self, inputs: &[T]) -> &T {
        if !self.cache.is_computed() {
            let value = (self.evaluation)(inputs);
            self.cache = CacheState::Computed(value);
        }
        self.cache.value().expect("node was just evaluated")
    }

    /// The cached value, if the node has been evaluated.
    pub fn value(&self) -> Option<&T> {
        self.cache.value()
    }

    /// True once the node holds a computed value.
    pub fn is_evaluated(&self) -> bool {
        self.cache.is_computed()
    }

    /// Get the current cache state.
    pub fn cache_state(&self) -> &CacheState<T> {
        &self.cache
    }

    /// Replace the evaluation function and discard the cached value.
    ///
    /// The node recomputes on the next evaluation epoch. This does **not**
    /// propagate to dependents: nodes computed from this one keep their stale
    /// caches until they are invalidated themselves (see
    /// [`Graph::invalidate`](crate::graph::Graph::invalidate) for the
    /// cascading variant).
    pub fn update_evaluation<F>(&mut self, evaluation: F)
    where
        F: Fn(&[T]) -> T + Send + Sync + 'static,
    {
        self.evaluation = Box::new(evaluation);
        self.cache = CacheState::Invalidated;
    }

    /// Discard the cached value without replacing the evaluation function.
    pub fn invalidate(&mut self) {
        if self.cache.is_computed() {
            self.cache = CacheState::Invalidated;
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Node<T> {
    /// Create a dependency-free node that always produces `value`.
    ///
    /// Sources are the leaves of the graph; every other node derives from
    /// them.
    pub fn source(name: impl Into<String>, description: impl Into<String>, value: T) -> Self {
        Self::new(name, description, [], move |_| value.clone())
    }
}

/// Nodes compare by identity only. Structurally identical nodes with
/// different ids are not equal; this is what collection membership checks
/// rely on.
impl<T> PartialEq for Node<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for Node<T> {}

impl<T> fmt::Display for Node<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl<T: fmt::Debug> fmt::Debug for Node<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .field("cache", &self.cache)
            .finish()
    }
}
