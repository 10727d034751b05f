//! PhyloDAG Core
//!
//! This crate provides the dataflow engine that phylogenetic likelihood
//! computations are built on. It implements:
//!
//! - Typed graph nodes with lazy evaluation and cached values
//! - Incremental invalidation when a parameter changes
//! - Generic function and reduction nodes driven by operation descriptors
//! - Structural sharing of identical subgraphs through a registry
//! - Symbolic differentiation, producing derivative graphs
//!
//! Tree topology, substitution models and optimisation loops live on top of
//! this engine. They supply operations and wire nodes; the engine decides
//! what to recompute and when.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `graph`: Node model, typed values, leaves, generic node templates
//! - `spec`: Node specifications, the registry and the build protocols
//! - `numeric`: Scalar and per-site vector operations with derivative rules
//! - `debug`: Graphviz and JSON export of built graphs
//! - `error`: Construction-time contract violations
//!
//! # Example
//!
//! ```rust,ignore
//! use phylodag_core::graph::Parameter;
//! use phylodag_core::numeric::{AddNode, SquareNode};
//!
//! let x = Parameter::create(5.0);
//! let square = SquareNode::create(vec![x.to_node()])?;
//!
//! // Evaluated on first read.
//! assert_eq!(square.get_value(), 25.0);
//!
//! // A derivative is a graph too.
//! let slope = square.derive(&*x)?;
//! assert_eq!(slope.get_value(), 10.0);
//!
//! // Only the affected nodes are recomputed.
//! x.set_value(3.0);
//! assert_eq!(slope.get_value(), 6.0);
//! ```

pub mod debug;
pub mod error;
pub mod graph;
pub mod numeric;
pub mod spec;

pub use error::{GraphError, GraphResult};
pub use graph::{Constant, Node, NodeRef, Parameter, ValueRef};
pub use spec::{
    instantiate_node_spec, instantiate_node_spec_with_reuse, NodeSpecification, Registry,
};
