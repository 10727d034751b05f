//! Graph Nodes
//!
//! This module defines the node trait shared by every vertex of the dataflow
//! graph, together with the state all nodes carry.
//!
//! # Ownership
//!
//! Nodes are heap allocated and shared through [`NodeRef`] handles. Edges come
//! in two flavours:
//!
//! - Dependencies are strong (`Arc`) and fixed at construction. A node keeps
//!   everything it reads from alive.
//! - Dependents are weak back-links. They exist only so that invalidation can
//!   walk from a changed leaf to everything computed from it, and they never
//!   keep a node alive.
//!
//! Because a dependency must exist before a node referencing it can be built,
//! the strong edges can never form a cycle.

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use indexmap::IndexMap;
use parking_lot::Mutex;

use crate::error::GraphResult;
use super::value::ValueTypeInfo;

/// Shared owning handle to a node of any type.
pub type NodeRef = Arc<dyn Node>;

/// Ordered dependency vector.
pub type NodeRefVec = Vec<NodeRef>;

/// Unique identifier for a node in the dataflow graph.
///
/// Identifiers are never reused, so two handles with the same id always point
/// to the same node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
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
        write!(f, "N{}", self.0)
    }
}

/// Runtime type of a concrete node, used as half of a registry key.
///
/// Equality and hashing only look at the `TypeId`; the name is carried for
/// diagnostics.
#[derive(Debug, Clone, Copy)]
pub struct NodeType {
    id: TypeId,
    name: &'static str,
}

impl NodeType {
    /// Node type of `N`.
    pub fn of<N: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<N>(),
            name: std::any::type_name::<N>(),
        }
    }

    /// Fully qualified type name.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for NodeType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for NodeType {}

impl Hash for NodeType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// State shared by every node: identity, dependencies, dependents, validity.
pub struct NodeCore {
    /// Unique identifier for this node.
    id: NodeId,

    /// Nodes this node reads from, in slot order. Never resized.
    dependencies: Box<[NodeRef]>,

    /// Nodes that read from this node. Weak, keyed by id. A dependent
    /// removes its own entry when dropped.
    dependents: Mutex<IndexMap<NodeId, Weak<dyn Node>>>,

    /// Weak handle to the node owning this state, set when it is linked.
    this: OnceLock<Weak<dyn Node>>,

    /// Whether the cached value reflects the current dependency values.
    valid: AtomicBool,

    /// Whether the value can never change.
    constant: bool,
}

impl NodeCore {
    /// State for a computed node: starts invalid, and is constant exactly when
    /// every dependency is constant.
    pub fn computed(dependencies: NodeRefVec) -> Self {
        let constant = dependencies.iter().all(|dep| dep.is_constant());
        Self::new(dependencies, false, constant)
    }

    /// State for a leaf node, which is valid from the start.
    pub fn leaf(constant: bool) -> Self {
        Self::new(Vec::new(), true, constant)
    }

    fn new(dependencies: NodeRefVec, valid: bool, constant: bool) -> Self {
        Self {
            id: NodeId::new(),
            dependencies: dependencies.into_boxed_slice(),
            dependents: Mutex::new(IndexMap::new()),
            this: OnceLock::new(),
            valid: AtomicBool::new(valid),
            constant,
        }
    }

    /// Get the node's ID.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Get the dependencies, in slot order.
    pub fn dependencies(&self) -> &[NodeRef] {
        &self.dependencies
    }

    /// Check whether the cached value is up-to-date.
    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    /// Check whether the value can never change.
    pub fn is_constant(&self) -> bool {
        self.constant
    }

    /// Mark the node as valid.
    pub(crate) fn mark_valid(&self) {
        self.valid.store(true, Ordering::Release);
    }

    /// Mark the node as invalid.
    ///
    /// Returns `false` if it already was, in which case all of its dependents
    /// are invalid too and the caller can stop descending.
    pub(crate) fn mark_invalid(&self) -> bool {
        self.valid.swap(false, Ordering::AcqRel)
    }

    /// Record a node reading from this one.
    pub(crate) fn add_dependent(&self, id: NodeId, dependent: Weak<dyn Node>) {
        self.dependents.lock().entry(id).or_insert(dependent);
    }

    fn remove_dependent(&self, id: NodeId) {
        self.dependents.lock().swap_remove(&id);
    }

    /// Currently alive dependents.
    pub fn dependent_nodes(&self) -> Vec<NodeRef> {
        self.dependents
            .lock()
            .values()
            .filter_map(Weak::upgrade)
            .collect()
    }

    /// Shared handle to the node owning this state.
    ///
    /// `None` before the node has been linked into the graph.
    pub fn handle(&self) -> Option<NodeRef> {
        self.this.get().and_then(Weak::upgrade)
    }
}

impl Drop for NodeCore {
    fn drop(&mut self) {
        for dependency in self.dependencies.iter() {
            dependency.core().remove_dependent(self.id);
        }
    }
}

impl fmt::Debug for NodeCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeCore")
            .field("id", &self.id)
            .field("dependencies", &self.dependencies.iter().map(|d| d.id()).collect::<Vec<_>>())
            .field("valid", &self.is_valid())
            .field("constant", &self.constant)
            .finish()
    }
}

/// A vertex of the dataflow graph.
///
/// Every node produces a value of a single type, held in a value cell that
/// [`super::value::ValueRef`] reads through. Concrete nodes provide the state
/// accessor, their value cell, a `compute` body and a derivative rule; the
/// remaining methods are derived from the shared [`NodeCore`].
pub trait Node: Any + Send + Sync {
    /// Shared node state.
    fn core(&self) -> &NodeCore;

    /// Type of the value this node produces.
    fn value_type(&self) -> ValueTypeInfo;

    /// The `ValueCell<T>` holding this node's value, type-erased.
    fn value_cell(&self) -> &dyn Any;

    /// Short human readable description, used by debug exports.
    fn description(&self) -> String;

    /// Extra detail for debug exports.
    fn debug_info(&self) -> String {
        String::new()
    }

    /// Recompute the cached value from the dependency values.
    ///
    /// Only called by the evaluator, after every dependency is valid.
    fn compute(&self);

    /// Build a node for the partial derivative of this node with respect to
    /// `variable`, identified by node identity.
    fn derive(&self, variable: &dyn Node) -> GraphResult<NodeRef>;

    /// Runtime type of the concrete node.
    fn node_type(&self) -> NodeType {
        NodeType::of::<Self>()
    }

    /// Get the node's ID.
    fn id(&self) -> NodeId {
        self.core().id()
    }

    /// Get the dependencies, in slot order.
    fn dependencies(&self) -> &[NodeRef] {
        self.core().dependencies()
    }

    /// Nodes currently depending on this one.
    fn dependent_nodes(&self) -> Vec<NodeRef> {
        self.core().dependent_nodes()
    }

    /// Check whether the cached value is up-to-date.
    fn is_valid(&self) -> bool {
        self.core().is_valid()
    }

    /// Check whether the value can never change.
    fn is_constant(&self) -> bool {
        self.core().is_constant()
    }
}

impl fmt::Debug for dyn Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id())
            .field("description", &self.description())
            .field("valid", &self.is_valid())
            .finish()
    }
}

/// A node type that can be created from a dependency vector plus extra
/// constructor arguments.
pub trait BuildNode: Node + Sized {
    /// Extra constructor arguments (a leaf's initial value, for instance).
    type Args;

    /// Check `dependencies` against the node's shape and build it.
    fn build(dependencies: NodeRefVec, args: Self::Args) -> GraphResult<Self>;
}

/// Create a node and link it into the graph.
///
/// The node is registered as a dependent of each of its dependencies so that
/// invalidation can reach it.
pub fn create_node<N: BuildNode>(dependencies: NodeRefVec, args: N::Args) -> GraphResult<Arc<N>> {
    N::build(dependencies, args).map(link_node)
}

/// Move a built node to the heap and register its back-links.
pub(crate) fn link_node<N: Node>(node: N) -> Arc<N> {
    let node = Arc::new(node);
    let id = node.id();
    let weak: Weak<N> = Arc::downgrade(&node);
    let weak: Weak<dyn Node> = weak;
    let _ = node.core().this.set(weak.clone());
    for dependency in node.dependencies() {
        dependency.core().add_dependent(id, weak.clone());
    }
    node
}

/// Check whether two handles denote the same node.
pub fn same_node(a: &dyn Node, b: &dyn Node) -> bool {
    a.id() == b.id()
}
