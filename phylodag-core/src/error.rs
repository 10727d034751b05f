//! Graph Errors
//!
//! Every error in this module is a contract violation made by the code that
//! assembles a graph: a node wired to the wrong number or kind of
//! dependencies, a registry fed twice with the same key, a derivative asked
//! of an operation that has none.
//!
//! The engine never catches or retries these. They abort construction at the
//! point of detection and are returned to the caller with enough context
//! (node type, slot index, expected and actual types) to find the faulty
//! wiring. A malformed graph never reaches evaluation.

use thiserror::Error;

/// Result alias used by every fallible graph operation.
pub type GraphResult<T> = Result<T, GraphError>;

/// A construction-time contract violation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// The number of dependencies does not match the node's declared shape.
    #[error("{node_type}: expected {expected} dependencies, got {given}")]
    ArityMismatch {
        /// Runtime type of the node being built.
        node_type: &'static str,
        /// Arity declared by the node's shape.
        expected: usize,
        /// Number of dependencies supplied.
        given: usize,
    },

    /// A dependency slot was never bound.
    #[error("{node_type}: dependency {index} is not bound")]
    NullDependency {
        /// Runtime type of the node being built.
        node_type: &'static str,
        /// Index of the unbound slot.
        index: usize,
    },

    /// A dependency produces a value of the wrong type for its slot.
    #[error("{node_type}: dependency {index} should produce `{expected}`, but produces `{given}`")]
    TypeMismatch {
        /// Runtime type of the node being built.
        node_type: &'static str,
        /// Index of the offending slot.
        index: usize,
        /// Value type declared for the slot.
        expected: &'static str,
        /// Value type produced by the dependency.
        given: &'static str,
    },

    /// A node with the same type and dependencies is already registered.
    #[error("registry already holds a `{node_type}` node with identical dependencies")]
    DuplicateRegistryKey {
        /// Runtime type of the node being inserted.
        node_type: &'static str,
    },

    /// A specification replayed against a registry was never built into it.
    #[error("no registry entry for specification `{description}`")]
    MissingRegistryEntry {
        /// Description of the specification that was looked up.
        description: String,
    },

    /// The node's operation defines no derivative rule.
    #[error("`{node_type}` has no derivative rule")]
    NotDerivable {
        /// Runtime type of the node asked for a derivative.
        node_type: &'static str,
    },

    /// An untyped node handle was converted to a typed value handle of another type.
    #[error("expected a node producing `{expected}`, got one producing `{given}`")]
    ValueTypeMismatch {
        /// Requested value type.
        expected: &'static str,
        /// Value type actually produced by the node.
        given: &'static str,
    },

    /// A debug export could not write its output.
    #[error("failed to write debug output")]
    DebugOutput(#[from] std::fmt::Error),
}
