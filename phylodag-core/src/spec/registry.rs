//! Node Registry
//!
//! The registry deduplicates nodes structurally. A node is identified by the
//! type of node it is and by the exact identity of its dependencies, in
//! order. Two specifications that resolve to the same type over the same
//! dependency nodes therefore map to one shared node.
//!
//! Comparing dependencies by identity rather than by value is enough:
//! dependencies are resolved bottom-up through the same registry, so equal
//! subtrees have already been collapsed into identical nodes by the time
//! their parents are looked up.
//!
//! A registry belongs to one build session. It keeps every node it holds
//! alive until it is dropped.

use std::fmt;

use indexmap::IndexMap;
use smallvec::SmallVec;
use tracing::debug;

use crate::error::{GraphError, GraphResult};
use crate::graph::{NodeId, NodeRef, NodeType};

/// Registry key: node type plus dependency identities.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct RegistryKey {
    node_type: NodeType,
    dependencies: SmallVec<[NodeId; 4]>,
}

impl RegistryKey {
    pub fn new(node_type: NodeType, dependencies: &[NodeRef]) -> Self {
        Self {
            node_type,
            dependencies: dependencies.iter().map(|dependency| dependency.id()).collect(),
        }
    }

    pub fn node_type(&self) -> NodeType {
        self.node_type
    }

    pub fn dependencies(&self) -> &[NodeId] {
        &self.dependencies
    }
}

impl fmt::Debug for RegistryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryKey")
            .field("node_type", &self.node_type.name())
            .field("dependencies", &self.dependencies)
            .finish()
    }
}

/// Structural cache of built nodes.
///
/// Iteration follows insertion order.
#[derive(Default)]
pub struct Registry {
    nodes: IndexMap<RegistryKey, NodeRef>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Node registered under `key`, if any.
    pub fn get(&self, key: &RegistryKey) -> Option<NodeRef> {
        self.nodes.get(key).cloned()
    }

    /// Register `node` under `key`.
    ///
    /// Fails if the key is already taken; the existing entry is kept.
    pub fn insert(&mut self, key: RegistryKey, node: NodeRef) -> GraphResult<()> {
        if self.nodes.contains_key(&key) {
            return Err(GraphError::DuplicateRegistryKey {
                node_type: key.node_type.name(),
            });
        }
        debug!(node = %node.id(), "registered {}", node.description());
        self.nodes.insert(key, node);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All entries, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&RegistryKey, &NodeRef)> {
        self.nodes.iter()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("len", &self.nodes.len())
            .finish()
    }
}
