//! Invalidation Propagation
//!
//! When a leaf changes, every node computed from it holds a stale value.
//! Invalidation walks the dependent back-links breadth first and marks each
//! reached node invalid.
//!
//! # Stopping Rule
//!
//! A node that is already invalid is not descended into. Evaluating a node
//! validates all of its dependencies first, so an invalid node can never
//! have a valid dependent. The walk therefore only touches the part of the
//! graph that was valid and is now affected, and repeated updates of the
//! same leaf without evaluation in between cost nothing beyond the first.

use std::collections::VecDeque;

use tracing::trace;

use super::node::Node;

/// Mark every transitive dependent of `source` invalid.
///
/// `source` itself is left untouched. Returns the number of nodes whose
/// state changed.
pub fn invalidate_dependents(source: &dyn Node) -> usize {
    let mut queue: VecDeque<_> = source.dependent_nodes().into();
    let mut invalidated = 0;

    while let Some(node) = queue.pop_front() {
        if node.core().mark_invalid() {
            invalidated += 1;
            queue.extend(node.dependent_nodes());
        }
    }

    trace!(node = %source.id(), invalidated, "invalidation walk finished");
    invalidated
}
