//! Graph Construction from Specifications
//!
//! Domain code rarely wires nodes by hand. It describes what to compute as a
//! tree of [`NodeSpecification`]s and lets a builder create the nodes,
//! sharing identical subgraphs through a [`Registry`] when asked to.

mod build;
mod registry;
mod specification;

pub use build::{instantiate_node_spec, instantiate_node_spec_with_reuse};
pub use registry::{Registry, RegistryKey};
pub use specification::{ExistingNode, FunctionSpec, NodeSpec, NodeSpecification, ReductionSpec};
