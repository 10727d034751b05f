//! Node Specifications
//!
//! A specification is a recipe for a node: it lists the specifications of
//! its dependencies, and knows how to build the node once those have been
//! turned into real nodes. Specifications are cheap to clone, are only used
//! while a graph is being assembled, and are dropped afterwards.
//!
//! Domain code describes a whole computation as a tree of specifications,
//! possibly with many repeated subtrees. The builders in [`super::build`]
//! turn that tree into a graph, optionally sharing identical subgraphs.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::GraphResult;
use crate::graph::{
    short_type_name, FunctionNode, FunctionOp, NodeRef, NodeRefVec, NodeType, ReductionNode,
    ReductionOp, ValueRef,
};

/// Behaviour shared by every kind of specification.
pub trait NodeSpec: Send + Sync {
    /// Specifications of the dependencies, in slot order.
    ///
    /// A specification returning no dependencies is a leaf.
    fn compute_dependencies(&self) -> Vec<NodeSpecification>;

    /// Build the node from realized dependencies.
    fn build_node(&self, dependencies: NodeRefVec) -> GraphResult<NodeRef>;

    /// Type of the node `build_node` creates. Used as part of the registry key.
    fn node_type(&self) -> NodeType;

    fn description(&self) -> String;
}

/// Type-erased, shareable specification.
#[derive(Clone)]
pub struct NodeSpecification(Arc<dyn NodeSpec>);

impl NodeSpecification {
    pub fn new<S: NodeSpec + 'static>(spec: S) -> Self {
        Self(Arc::new(spec))
    }

    pub fn compute_dependencies(&self) -> Vec<NodeSpecification> {
        self.0.compute_dependencies()
    }

    pub fn build_node(&self, dependencies: NodeRefVec) -> GraphResult<NodeRef> {
        self.0.build_node(dependencies)
    }

    pub fn node_type(&self) -> NodeType {
        self.0.node_type()
    }

    pub fn description(&self) -> String {
        self.0.description()
    }

    /// Identity of this specification instance, shared by its clones.
    pub fn debug_id(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }
}

impl<S: NodeSpec + 'static> From<S> for NodeSpecification {
    fn from(spec: S) -> Self {
        Self::new(spec)
    }
}

impl fmt::Debug for NodeSpecification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NodeSpecification")
            .field(&self.description())
            .finish()
    }
}

/// Specification returning a node that already exists, such as a parameter.
pub struct ExistingNode(pub NodeRef);

impl ExistingNode {
    pub fn new(node: impl Into<NodeRef>) -> Self {
        Self(node.into())
    }
}

impl NodeSpec for ExistingNode {
    fn compute_dependencies(&self) -> Vec<NodeSpecification> {
        Vec::new()
    }

    fn build_node(&self, _dependencies: NodeRefVec) -> GraphResult<NodeRef> {
        Ok(Arc::clone(&self.0))
    }

    fn node_type(&self) -> NodeType {
        self.0.node_type()
    }

    fn description(&self) -> String {
        format!("Existing({})", self.0.description())
    }
}

/// Specification of a [`FunctionNode`] over the given dependency specifications.
pub struct FunctionSpec<Op> {
    dependencies: Vec<NodeSpecification>,
    _op: PhantomData<fn() -> Op>,
}

impl<Op: FunctionOp> FunctionSpec<Op> {
    pub fn new(dependencies: Vec<NodeSpecification>) -> Self {
        Self {
            dependencies,
            _op: PhantomData,
        }
    }
}

impl<Op: FunctionOp> NodeSpec for FunctionSpec<Op> {
    fn compute_dependencies(&self) -> Vec<NodeSpecification> {
        self.dependencies.clone()
    }

    fn build_node(&self, dependencies: NodeRefVec) -> GraphResult<NodeRef> {
        FunctionNode::<Op>::create(dependencies).map(ValueRef::into_node)
    }

    fn node_type(&self) -> NodeType {
        NodeType::of::<FunctionNode<Op>>()
    }

    fn description(&self) -> String {
        format!("FunctionSpec<{}>", short_type_name::<Op>())
    }
}

/// Specification of a [`ReductionNode`] over the given dependency specifications.
pub struct ReductionSpec<Op> {
    dependencies: Vec<NodeSpecification>,
    _op: PhantomData<fn() -> Op>,
}

impl<Op: ReductionOp> ReductionSpec<Op> {
    pub fn new(dependencies: Vec<NodeSpecification>) -> Self {
        Self {
            dependencies,
            _op: PhantomData,
        }
    }
}

impl<Op: ReductionOp> NodeSpec for ReductionSpec<Op> {
    fn compute_dependencies(&self) -> Vec<NodeSpecification> {
        self.dependencies.clone()
    }

    fn build_node(&self, dependencies: NodeRefVec) -> GraphResult<NodeRef> {
        ReductionNode::<Op>::create(dependencies).map(ValueRef::into_node)
    }

    fn node_type(&self) -> NodeType {
        NodeType::of::<ReductionNode<Op>>()
    }

    fn description(&self) -> String {
        format!("ReductionSpec<{}>", short_type_name::<Op>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Node, Parameter};
    use crate::numeric::{Add, AddNode, Neg, NegNode};

    #[test]
    fn clones_share_identity() {
        let spec = NodeSpecification::new(ReductionSpec::<Add>::new(Vec::new()));
        let other = NodeSpecification::new(ReductionSpec::<Add>::new(Vec::new()));
        assert_eq!(spec.debug_id(), spec.clone().debug_id());
        assert_ne!(spec.debug_id(), other.debug_id());
    }

    #[test]
    fn operation_specs_report_their_node_type() {
        assert_eq!(
            FunctionSpec::<Neg>::new(Vec::new()).node_type(),
            NodeType::of::<NegNode>()
        );
        assert_eq!(
            ReductionSpec::<Add>::new(Vec::new()).node_type(),
            NodeType::of::<AddNode>()
        );
        assert_eq!(FunctionSpec::<Neg>::new(Vec::new()).description(), "FunctionSpec<Neg>");
    }

    #[test]
    fn existing_node_returns_the_same_node() {
        let p = Parameter::create(1.0);
        let spec = NodeSpecification::from(ExistingNode::new(p.to_node()));
        assert!(spec.compute_dependencies().is_empty());
        let built = spec.build_node(Vec::new()).unwrap();
        assert_eq!(built.id(), p.id());
        assert_eq!(spec.description(), "Existing(Parameter<f64>)");
    }
}
