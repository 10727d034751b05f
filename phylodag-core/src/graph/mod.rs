//! Dataflow Graph
//!
//! This module implements the node model of the engine: typed nodes wired
//! into a directed acyclic graph, evaluated lazily and invalidated
//! incrementally.
//!
//! # Overview
//!
//! - Leaves ([`Parameter`], [`Constant`]) hold values supplied from outside.
//! - Computed nodes ([`FunctionNode`], [`ReductionNode`]) are generic
//!   templates parameterized by an operation descriptor.
//! - An edge from A to B means B reads A's value. B owns A; A only keeps a
//!   weak back-link to B.
//!
//! # Evaluation Protocol
//!
//! 1. Every computed node starts invalid.
//!
//! 2. Reading a value through a [`ValueRef`] validates the node and, first,
//!    every dependency it transitively reads.
//!
//! 3. Setting a [`Parameter`] invalidates exactly the nodes reachable from it
//!    through dependent back-links. Everything else keeps its cached value.
//!
//! Differentiation builds new nodes: [`Node::derive`] returns the root of a
//! graph computing the partial derivative, evaluated lazily like any other.

mod function;
mod invalidation;
mod leaf;
mod node;
mod optimize;
mod pattern;
mod reduction;
mod value;

pub use function::{ArgRefs, ArgumentTypes, FunctionNode, FunctionOp};
pub use invalidation::invalidate_dependents;
pub use leaf::{Constant, Parameter};
pub use node::{
    create_node, same_node, BuildNode, Node, NodeCore, NodeId, NodeRef, NodeRefVec, NodeType,
};
pub use optimize::{is_constant_value_matching, is_constant_zero, remove_dependencies_if};
pub use pattern::DependencyPattern;
pub use reduction::{ReductionNode, ReductionOp};
pub use value::{
    make_valid, short_type_name, value_cell_of, ValueCell, ValueRef, ValueType, ValueTypeInfo,
};
