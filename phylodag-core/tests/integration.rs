//! Integration tests for phylodag-core.
//!
//! These tests drive the public API only: graphs are built from leaves and
//! operation descriptors, evaluated lazily, invalidated by parameter changes
//! and differentiated.

use std::sync::atomic::{AtomicUsize, Ordering};

use phylodag_core::graph::{
    ArgRefs, Constant, FunctionNode, FunctionOp, Node, NodeRef, Parameter, ReductionNode, ReductionOp,
    ValueRef,
};
use phylodag_core::numeric::{Add, AddNode, Neg, NegNode, Square, SquareNode};
use phylodag_core::spec::{ExistingNode, FunctionSpec, ReductionSpec};
use phylodag_core::{
    instantiate_node_spec, instantiate_node_spec_with_reuse, GraphError, NodeSpecification, Registry,
};

#[derive(Debug, Default)]
struct AddInt;

impl ReductionOp for AddInt {
    type Result = i32;
    type Element = i32;

    fn reset(&self) -> i32 {
        0
    }

    fn reduce(&self, accumulator: &mut i32, value: &i32) {
        *accumulator += value;
    }
}

#[derive(Debug, Default)]
struct NegInt;

impl FunctionOp for NegInt {
    type Result = i32;
    type Args = (i32,);

    fn compute(&self, (x,): ArgRefs<'_, Self>) -> i32 {
        -x
    }
}

/// Square that counts its evaluations. Only used by one test.
#[derive(Debug, Default)]
struct CountedSquare;

static COUNTED_SQUARE_EVALUATIONS: AtomicUsize = AtomicUsize::new(0);

impl FunctionOp for CountedSquare {
    type Result = f64;
    type Args = (f64,);

    fn compute(&self, (x,): ArgRefs<'_, Self>) -> f64 {
        COUNTED_SQUARE_EVALUATIONS.fetch_add(1, Ordering::SeqCst);
        x * x
    }
}

type AddIntNode = ReductionNode<AddInt>;
type NegIntNode = FunctionNode<NegInt>;

/// Test that a parameter change invalidates exactly its transitive dependents.
#[test]
fn parameter_change_invalidates_only_dependents() {
    let p1 = Parameter::create(42);
    let p2 = Parameter::create(1);
    let p3 = Parameter::create(0);
    let p4 = Parameter::create(3);

    let n1 = AddIntNode::create(vec![p1.to_node(), p2.to_node()]).unwrap();
    let n2 = AddIntNode::create(vec![n1.to_node(), p3.to_node()]).unwrap();
    let root = NegIntNode::create(vec![n2.to_node()]).unwrap();
    let n3 = AddIntNode::create(vec![p3.to_node(), p4.to_node()]).unwrap();

    // Evaluate the root; n3 is off the path and stays unread
    assert_eq!(n2.get_value(), 43);
    assert_eq!(root.get_value(), -43);
    assert!(!n3.is_valid());
    assert_eq!(n3.get_value(), 3);

    // p3 feeds both branches, p1 and p2 only the left one
    p3.set_value(10);
    assert!(!root.is_valid());
    assert!(!n2.is_valid());
    assert!(!n3.is_valid());
    assert!(n1.is_valid());
    assert_eq!(n1.cached_value(), Some(43));

    // Recompute from the kept n1
    assert_eq!(root.get_value(), -53);
    assert_eq!(n3.get_value(), 13);
}

/// Test that building does not evaluate and reading evaluates everything below.
#[test]
fn evaluation_is_lazy() {
    let x = Parameter::create(2.0);
    let y = Parameter::create(4.0);

    let sum = AddNode::create(vec![x.to_node(), y.to_node()]).unwrap();
    let square = SquareNode::create(vec![sum.to_node()]).unwrap();
    let root = NegNode::create(vec![square.to_node()]).unwrap();

    // Nothing is computed at construction
    for node in [&sum, &square, &root] {
        assert!(!node.is_valid());
        assert_eq!(node.cached_value(), None);
    }

    // Reading the root validates the chain below it
    assert_eq!(root.get_value(), -36.0);
    for node in [&sum, &square, &root] {
        assert!(node.is_valid());
    }
    assert_eq!(square.cached_value(), Some(36.0));
}

/// Test that a node whose value was never read stays invalid across updates.
#[test]
fn unread_nodes_are_never_computed() {
    let x = Parameter::create(1.0);
    let read = NegNode::create(vec![x.to_node()]).unwrap();
    let unread = SquareNode::create(vec![x.to_node()]).unwrap();

    for step in 0..5 {
        x.set_value(f64::from(step));
        assert_eq!(read.get_value(), -f64::from(step));
    }
    assert!(!unread.is_valid());
    assert_eq!(unread.get_value(), 16.0);
}

fn shifted_square(x: &NodeRef, shift: &NodeRef) -> NodeSpecification {
    let shifted = ReductionSpec::<Add>::new(vec![
        ExistingNode::new(x.clone()).into(),
        ExistingNode::new(shift.clone()).into(),
    ]);
    FunctionSpec::<Square>::new(vec![shifted.into()]).into()
}

/// Test that the registry-backed builder shares identical subgraphs.
#[test]
fn registry_shares_identical_subgraphs() {
    let x = Parameter::create(1.0).to_node();
    let shift = Constant::create(-3.0).to_node();

    let left: NodeSpecification =
        FunctionSpec::<Neg>::new(vec![shifted_square(&x, &shift)]).into();
    let right: NodeSpecification = ReductionSpec::<Add>::new(vec![shifted_square(&x, &shift)]).into();

    // With a registry the shifted square is built once
    let mut registry = Registry::new();
    let left_node = instantiate_node_spec_with_reuse(&left, &mut registry).unwrap();
    let right_node = instantiate_node_spec_with_reuse(&right, &mut registry).unwrap();
    assert!(NodeRef::ptr_eq(&left_node.dependencies()[0], &right_node.dependencies()[0]));
    assert_eq!(registry.len(), 4);

    // Without one every instantiation builds its own tree
    let left_tree = instantiate_node_spec(&left).unwrap();
    let right_tree = instantiate_node_spec(&right).unwrap();
    assert!(!NodeRef::ptr_eq(&left_tree.dependencies()[0], &right_tree.dependencies()[0]));

    assert_eq!(ValueRef::<f64>::from_node(left_node).unwrap().get_value(), -4.0);
    assert_eq!(ValueRef::<f64>::from_node(right_tree).unwrap().get_value(), 4.0);
}

/// Test that a change below a shared node reaches every root, and that the
/// shared node is recomputed once for all of them.
#[test]
fn shared_subgraph_is_recomputed_once_per_change() {
    let x = Parameter::create(2.0);
    let square = || -> NodeSpecification {
        FunctionSpec::<CountedSquare>::new(vec![ExistingNode::new(x.to_node()).into()]).into()
    };
    let left: NodeSpecification = FunctionSpec::<Neg>::new(vec![square()]).into();
    let right: NodeSpecification = ReductionSpec::<Add>::new(vec![square()]).into();

    let mut registry = Registry::new();
    let left = ValueRef::<f64>::from_node(
        instantiate_node_spec_with_reuse(&left, &mut registry).unwrap(),
    )
    .unwrap();
    let right = ValueRef::<f64>::from_node(
        instantiate_node_spec_with_reuse(&right, &mut registry).unwrap(),
    )
    .unwrap();
    assert_eq!(registry.len(), 4);

    // One evaluation serves both roots
    assert_eq!(left.get_value(), -4.0);
    assert_eq!(right.get_value(), 4.0);
    assert_eq!(COUNTED_SQUARE_EVALUATIONS.load(Ordering::SeqCst), 1);

    // Both roots see the change
    x.set_value(3.0);
    assert!(!left.is_valid());
    assert!(!right.is_valid());

    assert_eq!(left.get_value(), -9.0);
    assert_eq!(right.get_value(), 9.0);
    assert_eq!(COUNTED_SQUARE_EVALUATIONS.load(Ordering::SeqCst), 2);
}

/// Test the derivative base cases of the leaves.
#[test]
fn leaf_derivatives() {
    let x = Parameter::create(3.0);
    let y = Parameter::create(7.0);
    let c = Constant::create(11.0);

    assert_eq!(c.as_value().derive(&*x).unwrap().get_value(), 0.0);
    assert_eq!(x.as_value().derive(&*x).unwrap().get_value(), 1.0);
    assert_eq!(x.as_value().derive(&*y).unwrap().get_value(), 0.0);
}

/// Test the chain rule through squares and sums.
#[test]
fn chain_rule() {
    let x = Parameter::create(5.0);
    let f = SquareNode::create(vec![x.to_node()]).unwrap();
    let df = f.derive(&*x).unwrap();
    assert_eq!(df.get_value(), 10.0);

    // g = x² + (y - 3)²
    let x = Parameter::create(2.0).to_node();
    let y = Parameter::create(-3.0);
    let shift = Constant::create(-3.0).to_node();
    let spec: NodeSpecification = ReductionSpec::<Add>::new(vec![
        FunctionSpec::<Square>::new(vec![ExistingNode::new(x.clone()).into()]).into(),
        shifted_square(&y.to_node(), &shift),
    ])
    .into();
    let g = ValueRef::<f64>::from_node(instantiate_node_spec(&spec).unwrap()).unwrap();

    assert_eq!(g.get_value(), 40.0);
    assert_eq!(g.derive(&*x).unwrap().get_value(), 4.0);

    // The derivative graph tracks later parameter changes
    let dg_dy = g.derive(&*y).unwrap();
    assert_eq!(dg_dy.get_value(), -12.0);
    y.set_value(3.0);
    assert_eq!(dg_dy.get_value(), 0.0);
}

/// Test that malformed dependency lists are rejected at construction.
#[test]
fn construction_contracts_are_enforced() {
    let x = Parameter::create(1.0);
    let count = Parameter::create(4i32);

    // Wrong arity
    let err = NegNode::create(vec![x.to_node(), x.to_node()]).unwrap_err();
    assert!(matches!(err, GraphError::ArityMismatch { expected: 1, given: 2, .. }));

    // Unbound slot
    let err = NegNode::create_from_slots(vec![None]).unwrap_err();
    assert!(matches!(err, GraphError::NullDependency { index: 0, .. }));

    // Wrong value type, for functions and reductions
    let err = NegNode::create(vec![count.to_node()]).unwrap_err();
    assert!(matches!(err, GraphError::TypeMismatch { index: 0, .. }));

    let err = AddNode::create(vec![x.to_node(), count.to_node()]).unwrap_err();
    assert!(matches!(err, GraphError::TypeMismatch { index: 1, .. }));

    // Rejected nodes leave no back-links behind
    assert!(x.dependent_nodes().is_empty());
    assert!(count.dependent_nodes().is_empty());
}

/// Test that differentiating an integer graph fails loudly.
#[test]
fn operations_without_derivative_rule_fail() {
    let p = Parameter::create(2);
    let neg = NegIntNode::create(vec![p.to_node()]).unwrap();
    let err = neg.derive(&*p).unwrap_err();
    assert!(matches!(err, GraphError::NotDerivable { .. }));
}

/// Test that dropping the owner of a subgraph releases it.
#[test]
fn dependents_do_not_keep_nodes_alive() {
    let x = Parameter::create(1.0);
    let neg = NegNode::create(vec![x.to_node()]).unwrap();
    assert_eq!(x.dependent_nodes().len(), 1);

    drop(neg);
    assert!(x.dependent_nodes().is_empty());
    // Invalidation must not trip over the dropped dependent
    x.set_value(2.0);
}
