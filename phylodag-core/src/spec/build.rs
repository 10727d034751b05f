//! Build Protocols
//!
//! Two ways to turn a [`NodeSpecification`] tree into a graph:
//!
//! - [`instantiate_node_spec`] realizes every specification separately. The
//!   result is a tree even when the specification repeats itself.
//!
//! - [`instantiate_node_spec_with_reuse`] looks every non-leaf node up in a
//!   [`Registry`] before building it, so structurally identical subtrees
//!   become one shared node.
//!
//! Leaf specifications (those with no dependency specifications) are never
//! registered: they already name the node they return.

use tracing::debug;

use crate::error::GraphResult;
use crate::graph::{NodeRef, NodeRefVec};
use super::registry::{Registry, RegistryKey};
use super::specification::NodeSpecification;

/// Build the graph described by `spec`, without sharing.
pub fn instantiate_node_spec(spec: &NodeSpecification) -> GraphResult<NodeRef> {
    let dependencies = spec
        .compute_dependencies()
        .iter()
        .map(instantiate_node_spec)
        .collect::<GraphResult<NodeRefVec>>()?;
    spec.build_node(dependencies)
}

/// Build the graph described by `spec`, sharing nodes through `registry`.
///
/// Every node built is added to the registry, so later builds through the
/// same registry reuse them too.
pub fn instantiate_node_spec_with_reuse(
    spec: &NodeSpecification,
    registry: &mut Registry,
) -> GraphResult<NodeRef> {
    let dependency_specs = spec.compute_dependencies();
    if dependency_specs.is_empty() {
        return spec.build_node(Vec::new());
    }

    let dependencies = dependency_specs
        .iter()
        .map(|dependency| instantiate_node_spec_with_reuse(dependency, registry))
        .collect::<GraphResult<NodeRefVec>>()?;

    let key = RegistryKey::new(spec.node_type(), &dependencies);
    if let Some(existing) = registry.get(&key) {
        debug!(node = %existing.id(), "reusing node for {}", spec.description());
        return Ok(existing);
    }

    debug!("building node for {}", spec.description());
    let node = spec.build_node(dependencies)?;
    registry.insert(key, NodeRef::clone(&node))?;
    Ok(node)
}
